//! `/api/import-site`: JSON or multipart sitemap import.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};
use tracing::{error, info};

use faqbot_core::AppContext;
use faqbot_core::import::{ImportRequest, SilentProgress, resolve_site_source, run_import};
use faqbot_discovery::SitemapSource;
use faqbot_shared::Result;

use crate::error::ApiError;

/// Largest accepted import request (uploaded sitemaps included).
pub const MAX_IMPORT_BODY: usize = 10 * 1024 * 1024;

/// Import parameters, from either request encoding.
///
/// Every field is read leniently: a value of the wrong JSON type is
/// treated as absent instead of rejecting the whole body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportForm {
    #[serde(default, deserialize_with = "lenient_string")]
    pub tenant_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sitemap_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub site_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_page_count")]
    pub max_pages: Option<u32>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub force: bool,
    #[serde(skip)]
    pub uploaded_xml: Option<String>,
}

pub async fn import_site(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
) -> std::result::Result<Json<Value>, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    let form = if content_type.contains("application/json") {
        let body = axum::body::to_bytes(request.into_body(), MAX_IMPORT_BODY)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read body: {e}")))?;
        // An unreadable JSON body behaves like an empty one.
        serde_json::from_slice::<ImportForm>(&body).unwrap_or_default()
    } else if content_type.contains("multipart/form-data") {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(multipart).await?
    } else {
        return Err(ApiError::bad_request("Use JSON or multipart/form-data"));
    };

    let tenant_id = form.tenant_id.clone().unwrap_or_default().trim().to_string();
    if tenant_id.is_empty() {
        return Err(ApiError::bad_request("tenantId is required"));
    }

    let outcome = async {
        let source = source_for(&ctx, &form).await?;
        let req = ImportRequest {
            tenant_id,
            source,
            max_pages: form.max_pages,
            force: form.force,
        };
        run_import(&ctx, &req, &SilentProgress).await
    }
    .await;

    match outcome {
        Ok(result) => {
            info!(pages = result.pages, chunks = result.chunks, "import request finished");
            Ok(Json(json!({
                "ok": true,
                "pages": result.pages,
                "chunks": result.chunks,
                "unchanged": result.unchanged,
            })))
        }
        Err(e) if e.is_validation() => Err(ApiError::bad_request(e.to_string())),
        Err(e) => {
            error!(error = %e, "import failed");
            Err(ApiError::internal("Import failed"))
        }
    }
}

/// A sitemap URL or upload is used directly; a bare site URL is searched for one.
async fn source_for(ctx: &AppContext, form: &ImportForm) -> Result<SitemapSource> {
    let has_sitemap = form
        .sitemap_url
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty())
        || form
            .uploaded_xml
            .as_deref()
            .is_some_and(|x| !x.trim().is_empty());

    match form.site_url.as_deref().map(str::trim) {
        Some(site) if !has_sitemap && !site.is_empty() => resolve_site_source(ctx, site).await,
        _ => SitemapSource::from_parts(form.sitemap_url.as_deref(), form.uploaded_xml.clone()),
    }
}

async fn read_multipart(mut multipart: Multipart) -> std::result::Result<ImportForm, ApiError> {
    let mut form = ImportForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        match name.as_str() {
            "file" => form.uploaded_xml = Some(value),
            "tenantId" => form.tenant_id = Some(value),
            "sitemapUrl" => form.sitemap_url = Some(value),
            "siteUrl" => form.site_url = Some(value),
            "maxPages" => form.max_pages = page_count(&Value::String(value)),
            "force" => form.force = flag(&Value::String(value)),
            _ => {}
        }
    }

    Ok(form)
}

// ---------------------------------------------------------------------------
// Lenient field parsing
// ---------------------------------------------------------------------------

/// Page cap from a number or numeric string.
///
/// Zero, blanks and non-numbers mean "use the default"; negative and
/// fractional values are floored to at least one page.
fn page_count(value: &Value) -> Option<u32> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() || n == 0.0 {
        return None;
    }
    Some(n.floor().clamp(1.0, f64::from(u32::MAX)) as u32)
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes"),
        _ => false,
    }
}

fn lenient_page_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u32>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(page_count))
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().is_some_and(flag))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form(body: Value) -> ImportForm {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn max_pages_is_coerced() {
        assert_eq!(form(json!({ "maxPages": 10 })).max_pages, Some(10));
        assert_eq!(form(json!({ "maxPages": "10" })).max_pages, Some(10));
        assert_eq!(form(json!({ "maxPages": -1 })).max_pages, Some(1));
        assert_eq!(form(json!({ "maxPages": 2.5 })).max_pages, Some(2));
        assert_eq!(form(json!({ "maxPages": 0 })).max_pages, None);
        assert_eq!(form(json!({ "maxPages": "lots" })).max_pages, None);
        assert_eq!(form(json!({ "maxPages": null })).max_pages, None);
    }

    #[test]
    fn odd_field_types_keep_the_rest_of_the_body() {
        let parsed = form(json!({
            "tenantId": "t1",
            "sitemapUrl": "https://shop.example/sitemap.xml",
            "maxPages": [3],
            "force": "true",
        }));
        assert_eq!(parsed.tenant_id.as_deref(), Some("t1"));
        assert_eq!(parsed.sitemap_url.as_deref(), Some("https://shop.example/sitemap.xml"));
        assert_eq!(parsed.max_pages, None);
        assert!(parsed.force);

        assert!(!form(json!({ "force": 0 })).force);
        assert!(form(json!({ "force": true })).force);
        assert_eq!(form(json!({ "tenantId": 42 })).tenant_id.as_deref(), Some("42"));
    }
}

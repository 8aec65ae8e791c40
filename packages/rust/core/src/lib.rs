//! Core flows and domain logic for FAQBot.
//!
//! This crate ties together sitemap discovery, page fetching, chunking,
//! embeddings and storage into the import pipeline, and answers visitor
//! questions from a tenant's FAQs and indexed website.

pub mod billing;
pub mod chat;
pub mod chunk;
pub mod context;
pub mod import;
pub mod openai;
pub mod prompt;

pub use context::AppContext;

#[cfg(test)]
pub(crate) mod test_support {
    use faqbot_shared::{AppConfig, EMBEDDING_DIMENSIONS};
    use faqbot_storage::Storage;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use crate::context::AppContext;
    use crate::openai::OpenAiClient;

    /// Context backed by a temp database, with the API pointed at `server`.
    pub async fn test_context(server: &MockServer) -> AppContext {
        let mut config = AppConfig::default();
        config.openai.base_url = format!("{}/v1", server.uri());
        config.import.allow_private_hosts = true;

        let db = std::env::temp_dir().join(format!("faqbot_core_{}.db", uuid::Uuid::now_v7()));
        let storage = Storage::open(&db).await.expect("open test db");
        let openai = OpenAiClient::new(&config.openai, "sk-test").expect("client");
        AppContext::new(config, storage, Some(openai), None)
    }

    /// A full-size embedding pointing along `axis`.
    pub fn axis_embedding(axis: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIMENSIONS];
        v[axis] = 1.0;
        v
    }

    /// Answer every embeddings call with one `axis` vector per input.
    pub async fn mock_embeddings(server: &MockServer, axis: usize) {
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(move |req: &Request| {
                let body: serde_json::Value =
                    serde_json::from_slice(&req.body).unwrap_or_default();
                let count = body["input"].as_array().map_or(1, |a| a.len());
                let data: Vec<_> = (0..count)
                    .map(|i| json!({"index": i, "embedding": axis_embedding(axis)}))
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
            })
            .mount(server)
            .await;
    }
}

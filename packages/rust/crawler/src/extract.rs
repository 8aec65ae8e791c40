//! Plain-text extraction from HTML pages.

use std::sync::LazyLock;

use scraper::{Html, Selector};

/// Elements whose contents never count as page text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "svg", "canvas"];

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("body selector"));

static TITLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("title selector"));

/// Flatten an HTML document to plain text.
///
/// Text inside script-like elements is dropped, the `<body>` (or the whole
/// document when there is none) is flattened, and every whitespace run is
/// collapsed to a single space.
pub fn extract_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let root = doc
        .select(&BODY_SEL)
        .next()
        .unwrap_or_else(|| doc.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let inside_skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if !inside_skipped {
            parts.push(text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

/// The document `<title>`, if present and non-blank.
pub fn extract_title(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&TITLE_SEL)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_like_elements() {
        let html = r#"<html><head><style>body { color: red }</style></head>
            <body>
              <h1>Shipping</h1>
              <script>var tracking = "secret";</script>
              <p>We ship   worldwide.</p>
              <noscript>Enable JavaScript</noscript>
              <svg><text>logo</text></svg>
              <iframe src="https://ads.example.com"></iframe>
            </body></html>"#;
        assert_eq!(extract_text(html), "Shipping We ship worldwide.");
    }

    #[test]
    fn ignores_head_content() {
        let html = "<html><head><title>Title</title></head><body><p>Body only</p></body></html>";
        assert_eq!(extract_text(html), "Body only");
    }

    #[test]
    fn empty_body_gives_empty_text() {
        let html = "<html><body><script>x()</script>  \n </body></html>";
        assert_eq!(extract_text(html), "");
    }

    #[test]
    fn title_is_trimmed() {
        let html = "<html><head><title>\n  Returns | Shop </title></head><body></body></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Returns | Shop"));
        assert_eq!(extract_title("<p>no title</p>"), None);
    }
}

//! Client for an OpenAI-compatible embeddings and chat completions API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use faqbot_shared::{FaqBotError, OpenAiConfig, Result, resolve_secret};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Embeddings and chat completions over HTTP.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
}

impl OpenAiClient {
    /// Create a client with an explicit API key.
    pub fn new(config: &OpenAiConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FaqBotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            temperature: config.temperature,
        })
    }

    /// Create a client reading the API key from the configured env var.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = resolve_secret(&config.api_key_env)?;
        Self::new(config, api_key)
    }

    /// Embed a batch of texts; the result is in input order.
    #[instrument(skip_all, fields(count = texts.len(), model = %self.embedding_model))]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let raw = self.post("embeddings", &body, "Embedding failed").await?;

        let mut parsed: EmbeddingResponse = serde_json::from_str(&raw)
            .map_err(|e| FaqBotError::Llm(format!("invalid embeddings response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(FaqBotError::Llm(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Embed a single text.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| FaqBotError::Llm("no embedding returned".into()))
    }

    /// Run a chat completion and return the first choice's text, trimmed.
    #[instrument(skip_all, fields(messages = messages.len(), model = %self.chat_model))]
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = CompletionRequest {
            model: &self.chat_model,
            messages,
            temperature: self.temperature,
        };
        let raw = self.post("chat/completions", &body, "OpenAI failed").await?;

        let parsed: CompletionResponse = serde_json::from_str(&raw)
            .map_err(|e| FaqBotError::Llm(format!("invalid completion response: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default())
    }

    /// POST a JSON body and return the raw response text of a 2xx answer.
    async fn post<T: Serialize>(&self, endpoint: &str, body: &T, fallback: &str) -> Result<String> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, "calling language model API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| FaqBotError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FaqBotError::Network(format!("{url}: failed to read body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| fallback.to_string());
            return Err(FaqBotError::Llm(message));
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        let config = OpenAiConfig {
            base_url: format!("{}/v1", server.uri()),
            ..OpenAiConfig::default()
        };
        OpenAiClient::new(&config, "sk-test").unwrap()
    }

    #[tokio::test]
    async fn embed_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "text-embedding-3-small",
                "input": ["first", "second"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"index": 1, "embedding": [0.0, 1.0]},
                    {"index": 0, "embedding": [1.0, 0.0]}
                ]
            })))
            .mount(&server)
            .await;

        let vectors = client_for(&server)
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn embed_error_uses_api_message_or_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"input": ["quota"]})))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "You exceeded your current quota"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(body_partial_json(json!({"input": ["opaque"]})))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.embed_one("quota").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "language model error: You exceeded your current quota"
        );

        let err = client.embed_one("opaque").await.unwrap_err();
        assert_eq!(err.to_string(), "language model error: Embedding failed");
    }

    #[tokio::test]
    async fn embed_count_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = client_for(&server).embed_one("hello").await.unwrap_err();
        assert!(err.to_string().contains("expected 1 embeddings"));
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        assert!(client_for(&server).embed(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn complete_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hours?"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "  9 to 5.\n"}}]
            })))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&[ChatMessage::system("be brief"), ChatMessage::user("hours?")])
            .await
            .unwrap();
        assert_eq!(reply, "9 to 5.");
    }

    #[tokio::test]
    async fn complete_without_choices_is_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap();
        assert_eq!(reply, "");
    }

    #[tokio::test]
    async fn complete_error_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .complete(&[ChatMessage::user("hi")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "language model error: OpenAI failed");
    }
}

//! Chat-model client used for profile extraction, match analysis and
//! message writing.
//!
//! All model traffic goes through the [`ChatModel`] trait. The production
//! implementation is [`OpenRouterClient`], which talks to the OpenRouter
//! chat-completions API; tests substitute in-process fakes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use outreach_shared::{AppConfig, OutreachError, Result, RetryPolicy, read_api_key};

pub mod prompts;

/// Default OpenRouter endpoint.
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

const MAX_TOKENS: u32 = 2048;

const USER_AGENT: &str = concat!("outreach/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// ChatModel
// ---------------------------------------------------------------------------

/// A language model that turns a system + user prompt into text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Identifier recorded in generation metadata.
    fn model_id(&self) -> &str;

    /// Send one prompt and return the raw text of the reply.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Call `model` and deserialize its reply as JSON.
///
/// Code fences around the JSON are tolerated. A reply that does not parse
/// is reported as [`OutreachError::MalformedOutput`].
pub async fn complete_json<T: DeserializeOwned>(
    model: &dyn ChatModel,
    system: &str,
    prompt: &str,
) -> Result<T> {
    let text = model.complete(system, prompt).await?;
    let body = strip_json_fences(&text);
    serde_json::from_str(body).map_err(|e| {
        OutreachError::malformed(format!(
            "{} returned invalid JSON: {e}",
            model.model_id()
        ))
    })
}

/// Strip ```json ... ``` or ``` ... ``` fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(rest) => {
            let rest = rest.trim_start();
            rest.strip_suffix("```").map(str::trim).unwrap_or(rest)
        }
        None => text,
    }
}

// ---------------------------------------------------------------------------
// OpenRouter wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ---------------------------------------------------------------------------
// OpenRouterClient
// ---------------------------------------------------------------------------

/// OpenRouter chat-completions client with bounded retries.
///
/// Rate limits (429) and server errors are retried under the configured
/// [`RetryPolicy`]; any other non-success status fails immediately.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| OutreachError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENROUTER_BASE_URL.into(),
            temperature: 0.3,
            retry: RetryPolicy::default(),
        })
    }

    /// Build a client from the `[openrouter]` and `[retry]` config sections.
    ///
    /// Fails with a config error when the API key env var is unset.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let var = &config.openrouter.api_key_env;
        let key = read_api_key(var).ok_or_else(|| {
            OutreachError::config(format!("OpenRouter API key not found in ${var}"))
        })?;
        Ok(Self::new(key, &config.openrouter.default_model)?
            .with_temperature(config.openrouter.temperature)
            .with_retry(RetryPolicy::from(&config.retry)))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, system: &str, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: MAX_TOKENS,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OutreachError::Network(format!("openrouter: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            let retryable = status.as_u16() == 429 || status.is_server_error();
            return Err(OutreachError::llm(
                format!("openrouter returned {status}: {message}"),
                retryable,
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OutreachError::malformed(format!("openrouter response: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "model call succeeded"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| OutreachError::malformed("model returned empty content"))
    }
}

#[async_trait]
impl ChatModel for OpenRouterClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.retry
            .call("openrouter", || self.send_once(system, prompt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reply(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 12, "completion_tokens": 7 }
        })
    }

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new("test-key", "test/model")
            .expect("client")
            .with_base_url(server.uri())
            .with_retry(RetryPolicy::immediate(3))
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Keywords {
        keywords: Vec<String>,
    }

    #[test]
    fn strip_fences_with_json_tag() {
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fences_without_tag() {
        assert_eq!(strip_json_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[test]
    fn strip_fences_passthrough() {
        assert_eq!(strip_json_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn sends_bearer_token_and_parses_json_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(reply("```json\n{\"keywords\": [\"vision\"]}\n```")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let parsed: Keywords = complete_json(&client, "sys", "prompt").await.expect("call");
        assert_eq!(parsed.keywords, vec!["vision"]);
    }

    #[tokio::test]
    async fn retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("{\"keywords\": []}")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client.complete("sys", "prompt").await.expect("eventually succeeds");
        assert_eq!(text, "{\"keywords\": []}");
    }

    #[tokio::test]
    async fn auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_string(r#"{"error": {"message": "No auth credentials found"}}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.complete("sys", "prompt").await.unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("No auth credentials found"));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("I cannot help with that")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = complete_json::<Keywords>(&client, "sys", "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, OutreachError::MalformedOutput { .. }));
    }

    #[tokio::test]
    async fn empty_choice_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.complete("sys", "prompt").await.unwrap_err();
        assert!(matches!(err, OutreachError::MalformedOutput { .. }));
    }

    #[test]
    fn from_config_requires_key() {
        let mut config = AppConfig::default();
        config.openrouter.api_key_env = "OUTREACH_TEST_MISSING_OPENROUTER_KEY".into();
        let err = OpenRouterClient::from_config(&config).unwrap_err();
        assert!(matches!(err, OutreachError::Config { .. }));
    }
}

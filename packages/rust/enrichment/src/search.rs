//! Serper-compatible web search client.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use outreach_shared::{OutreachError, Result, SearchConfig, read_api_key};

const USER_AGENT: &str = concat!("outreach/", env!("CARGO_PKG_VERSION"));

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "link")]
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
}

/// POSTs `{"q", "num"}` with an `X-API-KEY` header and reads `organic` hits.
#[derive(Clone)]
pub struct SerperClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for SerperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperClient")
            .field("endpoint", &self.endpoint)
            .field("has_key", &self.api_key.is_some())
            .finish()
    }
}

impl SerperClient {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OutreachError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// Build from the `[search]` config section; the key is read from the
    /// configured environment variable and may be absent.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        Self::new(&config.endpoint, read_api_key(&config.api_key_env))
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Run one query and return up to `num` organic hits.
    pub async fn search(&self, query: &str, num: u32) -> Result<Vec<SearchHit>> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| OutreachError::unavailable("search API key not configured"))?;

        debug!(query, num, "searching");
        let response = self
            .client
            .post(&self.endpoint)
            .header("X-API-KEY", key)
            .json(&SearchRequest { q: query, num })
            .send()
            .await
            .map_err(|e| OutreachError::Network(format!("search: {e}")))?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(OutreachError::config(format!(
                "search API rejected the key (HTTP {status})"
            )));
        }
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(OutreachError::unavailable(format!("search API returned {status}")));
        }
        if !status.is_success() {
            return Err(OutreachError::Network(format!("search API returned {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| OutreachError::malformed(format!("search response: {e}")))?;

        let mut hits = body.organic;
        hits.truncate(num as usize);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_key_and_reads_organic_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("X-API-KEY", "k"))
            .and(body_json(serde_json::json!({ "q": "Ada Lovelace", "num": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "organic": [
                    { "title": "A", "link": "https://a.example", "snippet": "first" },
                    { "title": "B", "link": "https://b.example", "snippet": "second" },
                    { "title": "C", "link": "https://c.example", "snippet": "third" }
                ]
            })))
            .mount(&server)
            .await;

        let client = SerperClient::new(server.uri(), Some("k".into())).unwrap();
        let hits = client.search("Ada Lovelace", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.example");
        assert_eq!(hits[1].snippet, "second");
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let client = SerperClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.search("q", 1).await.unwrap_err();
        assert!(matches!(err, OutreachError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn status_codes_map_to_error_kinds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = SerperClient::new(server.uri(), Some("k".into())).unwrap();
        assert!(client.search("q", 1).await.unwrap_err().is_transient());
        assert!(matches!(
            client.search("q", 1).await.unwrap_err(),
            OutreachError::Config { .. }
        ));
    }
}

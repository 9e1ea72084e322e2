//! Local function-calling model served over HTTP.
//!
//! Talks to an on-device inference server (a small function-calling model
//! such as FunctionGemma behind a local runtime) that accepts chat messages
//! plus tool schemas and replies with
//! `{function_calls, total_time_ms, confidence, cloud_handoff}`.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::{Generation, LocalModel, Message, SYSTEM_PROMPT};
use crate::error::{Error, Result};
use crate::tools::ToolSpec;

/// Tokens the local model may generate by default.
pub const DEFAULT_MAX_TOKENS: u32 = 256;

const STOP_SEQUENCES: [&str; 2] = ["<|im_end|>", "<end_of_turn>"];

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: Vec<Message>,
    tools: Vec<ToolEnvelope<'a>>,
    force_tools: bool,
    max_tokens: u32,
    stop_sequences: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct ToolEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

/// A local model reached through an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct EndpointModel {
    client: reqwest::Client,
    url: String,
    max_tokens: u32,
}

impl EndpointModel {
    /// Create a client for the server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, max_tokens: u32, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            max_tokens,
        })
    }

    /// The endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the server accepts TCP connections within `timeout`.
    pub async fn is_reachable(&self, timeout: Duration) -> bool {
        let Ok(url) = reqwest::Url::parse(&self.url) else {
            return false;
        };
        let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
            return false;
        };
        matches!(
            tokio::time::timeout(timeout, tokio::net::TcpStream::connect((host, port))).await,
            Ok(Ok(_))
        )
    }

    fn request<'a>(&self, messages: &[Message], tools: &'a [ToolSpec]) -> CompletionRequest<'a> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(Message::system(SYSTEM_PROMPT));
        all.extend(messages.iter().cloned());

        CompletionRequest {
            messages: all,
            tools: tools
                .iter()
                .map(|function| ToolEnvelope {
                    kind: "function",
                    function,
                })
                .collect(),
            force_tools: true,
            max_tokens: self.max_tokens,
            stop_sequences: STOP_SEQUENCES,
        }
    }
}

/// Parse a server reply. Anything unparsable means "no calls, no confidence".
fn parse_reply(body: &str) -> Generation {
    match serde_json::from_str::<Generation>(body) {
        Ok(generation) => generation,
        Err(e) => {
            warn!(error = %e, "Local model returned unparsable output");
            Generation::empty()
        }
    }
}

#[async_trait::async_trait]
impl LocalModel for EndpointModel {
    fn name(&self) -> &str {
        "endpoint"
    }

    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Generation> {
        debug!(url = %self.url, "Calling local model endpoint");
        let body = self
            .client
            .post(&self.url)
            .json(&self.request(messages, tools))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::local_model(format!("{} unreachable: {e}", self.url)))?
            .text()
            .await
            .map_err(|e| Error::local_model(format!("{} reply unreadable: {e}", self.url)))?;
        Ok(parse_reply(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;

    #[test]
    fn test_parse_reply_full() {
        let g = parse_reply(
            r#"{"function_calls":[{"name":"get_clause_info","arguments":{"clause_type":"term"}}],
                "total_time_ms":412.5,"confidence":0.87,"cloud_handoff":false}"#,
        );
        assert_eq!(g.function_calls.len(), 1);
        assert_eq!(g.function_calls[0].arg("clause_type"), Some("term"));
        assert!((g.total_time_ms - 412.5).abs() < f64::EPSILON);
        assert!((g.confidence - 0.87).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_reply_missing_fields_default() {
        let g = parse_reply(r#"{"cloud_handoff":true}"#);
        assert!(g.function_calls.is_empty());
        assert!(g.cloud_handoff);
    }

    #[test]
    fn test_parse_reply_garbage() {
        assert_eq!(parse_reply("<end_of_turn> not json"), Generation::empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_local_model_error() {
        let model =
            EndpointModel::new("http://127.0.0.1:1/complete", 16, Duration::from_secs(2)).unwrap();
        let err = model
            .generate(&[Message::user("Who are the parties?")], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LocalModel(_)), "{err:?}");
        assert!(err.is_model_error());
    }

    #[tokio::test]
    async fn test_is_reachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/complete", listener.local_addr().unwrap());
        let model = EndpointModel::new(url, 16, Duration::from_secs(2)).unwrap();
        assert!(model.is_reachable(Duration::from_secs(1)).await);

        let model = EndpointModel::new("not a url", 16, Duration::from_secs(2)).unwrap();
        assert!(!model.is_reachable(Duration::from_secs(1)).await);
    }

    #[test]
    fn test_request_shape() {
        let model =
            EndpointModel::new("http://127.0.0.1:8080/complete", 128, Duration::from_secs(5))
                .unwrap();
        assert_eq!(model.url(), "http://127.0.0.1:8080/complete");

        let tools = Tool::specs();
        let request = model.request(&[Message::user("Who are the parties?")], &tools);
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(value["messages"][1]["content"], "Who are the parties?");
        assert_eq!(value["tools"][0]["type"], "function");
        assert_eq!(value["tools"][0]["function"]["name"], "extract_parties");
        assert_eq!(value["max_tokens"], 128);
        assert_eq!(value["force_tools"], true);
        assert_eq!(value["stop_sequences"][1], "<end_of_turn>");
    }
}

//! Gemini `generateContent` client.
//!
//! Used twice per escalated query at most: once to choose tool calls when the
//! router escalates, and once to elaborate on an anonymized clause summary
//! for the legal-knowledge tools.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{CloudModel, FunctionCall, Generation, Message};
use crate::error::{Error, Result};
use crate::tools::ToolSpec;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Public Gemini API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Output budget for elaborations.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 512;

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolDeclarations<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<PartCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PartCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolDeclarations<'a> {
    function_declarations: Vec<FunctionDeclaration<'a>>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration<'a> {
    name: &'a str,
    description: &'a str,
    parameters: Schema<'a>,
}

#[derive(Debug, Serialize)]
struct Schema<'a> {
    #[serde(rename = "type")]
    kind: String,
    properties: BTreeMap<&'a str, PropertySchema<'a>>,
    required: &'a [&'static str],
}

#[derive(Debug, Serialize)]
struct PropertySchema<'a> {
    #[serde(rename = "type")]
    kind: String,
    description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

/// Cloud model backed by the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        max_output_tokens: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_output_tokens,
        })
    }

    /// The model name requests are sent to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    async fn send(&self, request: &GenerateRequest<'_>) -> Result<GenerateResponse> {
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::cloud_model(format!(
                "{} returned HTTP {status}: {}",
                self.model,
                body.trim()
            )));
        }
        Ok(response.json().await?)
    }
}

/// Only user turns are sent; system prompts stay on the device.
fn user_contents(messages: &[Message]) -> Vec<Content> {
    messages
        .iter()
        .filter(|m| m.is_user())
        .map(|m| text_content(&m.content))
        .collect()
}

fn text_content(text: &str) -> Content {
    Content {
        role: Some("user".to_string()),
        parts: vec![Part {
            text: Some(text.to_string()),
            function_call: None,
        }],
    }
}

fn declarations(tools: &[ToolSpec]) -> Vec<ToolDeclarations<'_>> {
    if tools.is_empty() {
        return Vec::new();
    }
    let function_declarations = tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name,
            description: tool.description,
            parameters: Schema {
                kind: tool.parameters.kind.to_uppercase(),
                properties: tool
                    .parameters
                    .properties
                    .iter()
                    .map(|(name, prop)| {
                        (
                            *name,
                            PropertySchema {
                                kind: prop.kind.to_uppercase(),
                                description: prop.description,
                            },
                        )
                    })
                    .collect(),
                required: &tool.parameters.required,
            },
        })
        .collect();
    vec![ToolDeclarations {
        function_declarations,
    }]
}

fn function_calls(response: GenerateResponse) -> Vec<FunctionCall> {
    response
        .candidates
        .into_iter()
        .flat_map(|c| c.content.parts)
        .filter_map(|p| p.function_call)
        .map(|call| FunctionCall {
            name: call.name,
            arguments: call.args,
        })
        .collect()
}

fn response_text(response: &GenerateResponse) -> String {
    response
        .candidates
        .iter()
        .flat_map(|c| &c.content.parts)
        .filter_map(|p| p.text.as_deref())
        .collect::<String>()
        .trim()
        .to_string()
}

#[async_trait::async_trait]
impl CloudModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Generation> {
        let request = GenerateRequest {
            contents: user_contents(messages),
            tools: declarations(tools),
            generation_config: None,
        };

        let started = Instant::now();
        let response = self.send(&request).await?;
        let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        let calls = function_calls(response);
        debug!(model = %self.model, calls = calls.len(), total_time_ms, "Cloud function calling finished");
        Ok(Generation {
            function_calls: calls,
            total_time_ms,
            confidence: 0.0,
            cloud_handoff: false,
        })
    }

    async fn elaborate(&self, task: &str, context: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![text_content(&format!("{task}\n\n{context}"))],
            tools: Vec::new(),
            generation_config: Some(GenerationConfig {
                max_output_tokens: self.max_output_tokens,
            }),
        };

        let text = response_text(&self.send(&request).await?);
        if text.is_empty() {
            return Err(Error::cloud_model(format!(
                "{} returned an empty elaboration",
                self.model
            )));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;

    fn parse(body: &str) -> GenerateResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_declarations_upper_case_types() {
        let specs = Tool::specs();
        let value = serde_json::to_value(declarations(&specs)).unwrap();
        let decls = &value[0]["functionDeclarations"];

        assert_eq!(decls.as_array().unwrap().len(), 5);
        assert_eq!(decls[1]["name"], "get_clause_info");
        assert_eq!(decls[1]["parameters"]["type"], "OBJECT");
        assert_eq!(
            decls[1]["parameters"]["properties"]["clause_type"]["type"],
            "STRING"
        );
        assert_eq!(decls[1]["parameters"]["required"][0], "clause_type");
    }

    #[test]
    fn test_no_tools_no_declarations() {
        assert!(declarations(&[]).is_empty());
    }

    #[test]
    fn test_only_user_messages_sent() {
        let contents = user_contents(&[
            Message::system("You are a helpful assistant that can use tools."),
            Message::user("Is this enforceable in Texas?"),
        ]);
        assert_eq!(contents.len(), 1);
        assert_eq!(
            contents[0].parts[0].text.as_deref(),
            Some("Is this enforceable in Texas?")
        );
    }

    #[test]
    fn test_elaboration_request_shape() {
        let request = GenerateRequest {
            contents: vec![text_content("task\n\ncontext")],
            tools: Vec::new(),
            generation_config: Some(GenerationConfig {
                max_output_tokens: 512,
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "task\n\ncontext");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 512);
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_function_calls_parsed() {
        let response = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[
                {"functionCall":{"name":"check_enforceability",
                  "args":{"clause_type":"non_compete","jurisdiction":"California"}}}
            ]}}]}"#,
        );
        let calls = function_calls(response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "check_enforceability");
        assert_eq!(calls[0].arg("jurisdiction"), Some("California"));
    }

    #[test]
    fn test_text_reply_has_no_calls() {
        let response = parse(r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#);
        assert!(function_calls(response).is_empty());
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"  Likely void "},{"text":"in California.\n"}]}}]}"#,
        );
        assert_eq!(response_text(&response), "Likely void in California.");
    }

    #[test]
    fn test_empty_response() {
        let response = parse("{}");
        assert_eq!(response_text(&response), "");
    }

    #[test]
    fn test_endpoint_and_debug_hide_key() {
        let client = GeminiClient::new(
            "secret-key",
            DEFAULT_MODEL,
            "https://example.test/v1beta/",
            Duration::from_secs(5),
            DEFAULT_MAX_OUTPUT_TOKENS,
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
        assert_eq!(client.model(), "gemini-2.0-flash");
        assert!(!format!("{client:?}").contains("secret-key"));
    }
}

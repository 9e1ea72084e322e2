//! Hybrid on-device / cloud routing of questions to tool calls.
//!
//! Every question goes to the local function-calling model first. The result
//! is escalated to the cloud model when:
//!
//! 1. the local runtime asks for a handoff,
//! 2. the chosen tool needs legal or market knowledge the device lacks, or
//! 3. the local model's confidence falls below the threshold.
//!
//! Otherwise the local calls are used as-is.

mod cloud;
mod endpoint;
mod keyword;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::tools::{Tool, ToolSpec};

pub use cloud::{
    GeminiClient, DEFAULT_BASE_URL as DEFAULT_CLOUD_BASE_URL, DEFAULT_MAX_OUTPUT_TOKENS,
    DEFAULT_MODEL as DEFAULT_CLOUD_MODEL,
};
pub use endpoint::{EndpointModel, DEFAULT_MAX_TOKENS};
pub use keyword::KeywordModel;

/// Confidence below which a local result is escalated.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.72;

/// System prompt given to function-calling models.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that can use tools.";

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl Message {
    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Whether this message came from the user.
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }
}

/// A tool invocation chosen by a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// Arguments keyed by parameter name.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl FunctionCall {
    /// A call with no arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Map::new(),
        }
    }

    /// Add a string argument.
    #[must_use]
    pub fn with_arg(mut self, key: &str, value: impl Into<String>) -> Self {
        self.arguments
            .insert(key.to_string(), Value::String(value.into()));
        self
    }

    /// A string argument, if present and non-empty.
    #[must_use]
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// The tool this call names, if it is one we know.
    #[must_use]
    pub fn tool(&self) -> Option<Tool> {
        Tool::from_name(&self.name)
    }
}

/// Raw output of a function-calling model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Generation {
    /// Calls the model chose, in order.
    pub function_calls: Vec<FunctionCall>,
    /// Wall-clock time spent in the model.
    pub total_time_ms: f64,
    /// Model confidence in `[0, 1]`.
    pub confidence: f64,
    /// Set by the local runtime when it wants the cloud to take over.
    pub cloud_handoff: bool,
}

impl Generation {
    /// An empty generation, used when a model produced nothing usable.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any call targets a tool that needs cloud knowledge.
    #[must_use]
    pub fn requires_cloud(&self) -> bool {
        self.function_calls
            .iter()
            .any(|c| c.tool().is_some_and(Tool::requires_cloud))
    }
}

/// Where a routed result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteSource {
    /// The local model answered.
    OnDevice,
    /// The local runtime handed off to the cloud.
    CloudHandoff,
    /// A chosen tool needs external legal knowledge.
    CloudLegalKnowledge,
    /// The local model was not confident enough.
    CloudLowConfidence,
    /// Escalation was wanted but the cloud could not be reached.
    CloudUnavailable,
}

impl RouteSource {
    /// Every source, for parsing.
    pub const ALL: [RouteSource; 5] = [
        Self::OnDevice,
        Self::CloudHandoff,
        Self::CloudLegalKnowledge,
        Self::CloudLowConfidence,
        Self::CloudUnavailable,
    ];

    /// Display label used in responses and the audit log.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnDevice => "on-device",
            Self::CloudHandoff => "cloud (cactus handoff)",
            Self::CloudLegalKnowledge => "cloud (legal knowledge required)",
            Self::CloudLowConfidence => "cloud (low confidence)",
            Self::CloudUnavailable => "on-device (cloud unavailable)",
        }
    }

    /// Parse a display label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }

    /// Whether the tool calls were produced on the device.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::OnDevice | Self::CloudUnavailable)
    }
}

impl std::fmt::Display for RouteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RouteSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The outcome of routing one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingResult {
    /// Calls to execute.
    pub function_calls: Vec<FunctionCall>,
    /// Time spent routing, local and cloud combined.
    pub total_time_ms: f64,
    /// Time the local model took.
    pub device_time_ms: f64,
    /// Confidence of the model whose calls are used, when it reports one.
    pub confidence: Option<f64>,
    /// The local model's confidence, when the result was escalated.
    pub local_confidence: Option<f64>,
    /// Where the calls came from.
    pub source: RouteSource,
}

impl RoutingResult {
    /// The best confidence figure available.
    #[must_use]
    pub fn effective_confidence(&self) -> Option<f64> {
        self.confidence.or(self.local_confidence)
    }
}

/// A small function-calling model that runs on the device.
#[async_trait::async_trait]
pub trait LocalModel: Send + Sync + std::fmt::Debug {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Choose tool calls for the conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be reached at all. A model that
    /// answers with garbage should return [`Generation::empty`] instead.
    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Generation>;
}

/// A hosted model used for escalation and legal elaboration.
#[async_trait::async_trait]
pub trait CloudModel: Send + Sync + std::fmt::Debug {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Choose tool calls for the conversation. Only user messages are sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Generation>;

    /// Answer a free-text task about an anonymized context.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the reply is empty.
    async fn elaborate(&self, task: &str, context: &str) -> Result<String>;
}

/// Routes questions between a local and an optional cloud model.
#[derive(Debug, Clone)]
pub struct HybridRouter {
    local: Arc<dyn LocalModel>,
    cloud: Option<Arc<dyn CloudModel>>,
    confidence_threshold: f64,
    tools: Vec<ToolSpec>,
}

impl HybridRouter {
    /// Create a router over the full tool set.
    #[must_use]
    pub fn new(local: Arc<dyn LocalModel>, cloud: Option<Arc<dyn CloudModel>>) -> Self {
        Self {
            local,
            cloud,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            tools: Tool::specs(),
        }
    }

    /// Set the escalation threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// The escalation threshold.
    #[must_use]
    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// The local model.
    #[must_use]
    pub fn local(&self) -> &Arc<dyn LocalModel> {
        &self.local
    }

    /// The cloud model, if one is configured.
    #[must_use]
    pub fn cloud(&self) -> Option<&Arc<dyn CloudModel>> {
        self.cloud.as_ref()
    }

    /// Tools offered to the models.
    #[must_use]
    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    /// Decide which model's tool calls to use for `messages`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the local model fails. Cloud failures fall
    /// back to the local calls with [`RouteSource::CloudUnavailable`].
    pub async fn route(&self, messages: &[Message]) -> Result<RoutingResult> {
        let local = self.local.generate(messages, &self.tools).await?;
        debug!(
            model = self.local.name(),
            calls = local.function_calls.len(),
            confidence = local.confidence,
            handoff = local.cloud_handoff,
            "Local model finished"
        );

        let escalation = if local.cloud_handoff {
            Some(RouteSource::CloudHandoff)
        } else if local.requires_cloud() {
            Some(RouteSource::CloudLegalKnowledge)
        } else if local.confidence < self.confidence_threshold {
            Some(RouteSource::CloudLowConfidence)
        } else {
            None
        };

        let Some(source) = escalation else {
            return Ok(RoutingResult {
                function_calls: local.function_calls,
                total_time_ms: local.total_time_ms,
                device_time_ms: local.total_time_ms,
                confidence: Some(local.confidence),
                local_confidence: None,
                source: RouteSource::OnDevice,
            });
        };

        info!(reason = %source, "Escalating to cloud model");
        match self.escalate(messages).await {
            Ok(cloud) => Ok(RoutingResult {
                function_calls: cloud.function_calls,
                total_time_ms: cloud.total_time_ms + local.total_time_ms,
                device_time_ms: local.total_time_ms,
                confidence: None,
                local_confidence: Some(local.confidence),
                source,
            }),
            Err(e) => {
                warn!(error = %e, reason = %source, "Cloud model unavailable, keeping local result");
                Ok(RoutingResult {
                    function_calls: local.function_calls,
                    total_time_ms: local.total_time_ms,
                    device_time_ms: local.total_time_ms,
                    confidence: Some(local.confidence),
                    local_confidence: None,
                    source: RouteSource::CloudUnavailable,
                })
            }
        }
    }

    async fn escalate(&self, messages: &[Message]) -> Result<Generation> {
        let cloud = self
            .cloud
            .as_ref()
            .ok_or(crate::error::Error::CloudUnavailable)?;
        cloud.generate(messages, &self.tools).await
    }
}

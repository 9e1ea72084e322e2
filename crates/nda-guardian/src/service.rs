//! Query orchestration.
//!
//! [`QueryService`] ties the pieces together for one session: it parses the
//! uploaded agreement, routes each question, runs the chosen tool on the
//! device, asks the cloud model to elaborate on anonymized context when the
//! tool needs legal knowledge, and keeps statistics and the audit log.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::{Config, LocalModelKind};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::privacy::{Anonymizer, PrivacyFilter};
use crate::routing::{
    CloudModel, EndpointModel, FunctionCall, GeminiClient, HybridRouter, KeywordModel,
    LocalModel, Message,
};
use crate::session::{round_to, Session, SessionStats};
use crate::storage::{QueryRecord, Storage};
use crate::tools::{self, Tool, ToolOutput};

/// Answer given when no model produced a tool call.
pub const NO_TOOL_ANSWER: &str =
    "No tool call was generated for this query. Please rephrase your question.";

const NO_TOOL_NOTE: &str = "No data sent to cloud.";
const ON_DEVICE_NOTE: &str = "All processing done on-device. No data sent to cloud.";

/// Reply to a document upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResponse {
    /// Always `true`; failures are errors.
    pub success: bool,
    /// Clause keys recognized, in document order.
    pub clauses_found: Vec<String>,
    /// Human-readable summary.
    pub message: String,
}

/// Reply to a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    /// The question as asked.
    pub query: String,
    /// Formatted answer.
    pub answer: String,
    /// Tool that produced the answer, or `none`.
    pub tool_called: String,
    /// Arguments the tool was called with.
    pub tool_arguments: Map<String, Value>,
    /// Routing decision.
    pub source: crate::routing::RouteSource,
    /// Confidence, four decimals.
    pub confidence: Option<f64>,
    /// End-to-end latency, one decimal.
    pub latency_ms: f64,
    /// Part of the latency spent in the local model, one decimal.
    pub device_latency_ms: f64,
    /// Words of anonymized text sent to the cloud.
    pub words_sent_to_cloud: usize,
    /// What left the device, in plain words.
    pub privacy_note: String,
}

/// One analysis session over one router.
#[derive(Debug)]
pub struct QueryService {
    router: HybridRouter,
    anonymizer: Anonymizer,
    session: tokio::sync::Mutex<Session>,
    storage: Option<Mutex<Storage>>,
}

impl QueryService {
    /// Create a service without an audit log.
    #[must_use]
    pub fn new(router: HybridRouter, anonymizer: Anonymizer, session: Session) -> Self {
        Self {
            router,
            anonymizer,
            session: tokio::sync::Mutex::new(session),
            storage: None,
        }
    }

    /// Record documents and queries in `storage`.
    #[must_use]
    pub fn with_storage(mut self, storage: Storage) -> Self {
        self.storage = Some(Mutex::new(storage));
        self
    }

    /// Build the service described by `config`.
    ///
    /// Opens the audit database when auditing is enabled and prunes entries
    /// past the configured age.
    ///
    /// # Errors
    ///
    /// Returns an error if a model client or the audit database cannot be
    /// set up.
    pub fn from_config(config: &Config) -> Result<Self> {
        let router = router_from_config(config)?;
        let anonymizer = Anonymizer::new(
            PrivacyFilter::with_config(config.privacy.filter_config()),
            config.privacy.summary_max_words,
        );
        let service = Self::new(router, anonymizer, Session::new(config.cloud.cost_per_word_usd));

        if !config.storage.audit_enabled {
            return Ok(service);
        }
        let storage = Storage::open(config.database_path())?;
        if let Some(max_age) = config.max_age() {
            storage.prune_older_than(max_age)?;
        }
        Ok(service.with_storage(storage))
    }

    /// The router queries go through.
    #[must_use]
    pub fn router(&self) -> &HybridRouter {
        &self.router
    }

    /// Parse `text` and make it the session's document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDocument`] if `text` is blank.
    pub async fn load(&self, text: &str) -> Result<LoadResponse> {
        let document = Document::parse(text)?;
        let clauses_found: Vec<String> = document
            .keys()
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        info!(
            clauses = clauses_found.len(),
            words = document.word_count(),
            "Document loaded"
        );

        self.audit(|storage| storage.record_document(&document).map(|_| ()));
        self.session.lock().await.set_document(document);

        Ok(LoadResponse {
            success: true,
            message: format!(
                "Document loaded successfully. Found {} clause(s).",
                clauses_found.len()
            ),
            clauses_found,
        })
    }

    /// Answer a question about the loaded document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoDocument`] if nothing is loaded, a model error if
    /// the local model fails or a needed cloud elaboration fails.
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        let started = Instant::now();
        let document = self
            .session
            .lock()
            .await
            .document()
            .cloned()
            .ok_or(Error::NoDocument)?;

        let routing = self.router.route(&[Message::user(query)]).await?;
        let confidence = routing.effective_confidence().map(|c| round_to(c, 4));

        let Some(call) = routing.function_calls.first() else {
            debug!(source = %routing.source, "No tool call generated");
            let response = QueryResponse {
                query: query.to_string(),
                answer: NO_TOOL_ANSWER.to_string(),
                tool_called: "none".to_string(),
                tool_arguments: Map::new(),
                source: routing.source,
                confidence,
                latency_ms: elapsed_ms(started),
                device_latency_ms: round_to(routing.device_time_ms, 1),
                words_sent_to_cloud: 0,
                privacy_note: NO_TOOL_NOTE.to_string(),
            };
            self.finish(&document, &response).await;
            return Ok(response);
        };

        let (raw, words_sent, privacy_note) =
            match tools::execute(call, &document, &self.anonymizer) {
                ToolOutput::Answer(text) => (text, 0, ON_DEVICE_NOTE.to_string()),
                ToolOutput::CloudContext(context) => {
                    let words = tools::word_count(&context);
                    let cloud = self.router.cloud().ok_or(Error::CloudUnavailable)?;
                    info!(tool = %call.name, words, "Sending anonymized clause summary to cloud");
                    let text = cloud.elaborate(&elaboration_task(call), &context).await?;
                    (
                        text,
                        words,
                        format!(
                            "Anonymized clause summary ({words} words) sent to cloud. \
                             Raw document never left your device."
                        ),
                    )
                }
            };

        let response = QueryResponse {
            query: query.to_string(),
            answer: tools::format_answer(call, &raw),
            tool_called: call.name.clone(),
            tool_arguments: call.arguments.clone(),
            source: routing.source,
            confidence,
            latency_ms: elapsed_ms(started),
            device_latency_ms: round_to(routing.device_time_ms, 1),
            words_sent_to_cloud: words_sent,
            privacy_note,
        };
        self.finish(&document, &response).await;
        Ok(response)
    }

    async fn finish(&self, document: &Document, response: &QueryResponse) {
        self.session.lock().await.record_query(
            response.source,
            response.latency_ms,
            response.words_sent_to_cloud,
        );

        let record = QueryRecord {
            document_hash: Some(document.content_hash().to_string()),
            confidence: response.confidence,
            latency_ms: response.latency_ms,
            words_sent: response.words_sent_to_cloud as u64,
            ..QueryRecord::new(&response.query, &response.tool_called, response.source)
        };
        self.audit(|storage| storage.record_query(&record).map(|_| ()));
    }

    /// Current session statistics.
    pub async fn stats(&self) -> SessionStats {
        self.session.lock().await.stats()
    }

    /// Forget the document and the statistics. The audit log is kept.
    pub async fn reset(&self) {
        self.session.lock().await.reset();
        info!("Session reset");
    }

    /// The most recent audit entries, newest first. Empty without an audit log.
    ///
    /// # Errors
    ///
    /// Returns an error if the audit database cannot be read.
    pub fn recent_queries(&self, limit: usize) -> Result<Vec<QueryRecord>> {
        let Some(storage) = &self.storage else {
            return Ok(Vec::new());
        };
        let storage = storage
            .lock()
            .map_err(|_| Error::internal("audit storage lock poisoned"))?;
        storage.recent_queries(limit)
    }

    /// Audit failures are logged, never surfaced to the caller.
    fn audit(&self, write: impl FnOnce(&Storage) -> Result<()>) {
        let Some(storage) = &self.storage else {
            return;
        };
        let result = match storage.lock() {
            Ok(storage) => write(&storage),
            Err(_) => Err(Error::internal("audit storage lock poisoned")),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to write audit entry");
        }
    }
}

/// Build the router `config` describes.
///
/// The cloud model is only configured when an API key is available.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built.
pub fn router_from_config(config: &Config) -> Result<HybridRouter> {
    let local: Arc<dyn LocalModel> = match config.routing.local_model {
        LocalModelKind::Keyword => Arc::new(KeywordModel::new()),
        LocalModelKind::Endpoint => Arc::new(EndpointModel::new(
            config.routing.endpoint_url.clone(),
            config.routing.max_tokens,
            config.routing.timeout(),
        )?),
    };

    let cloud: Option<Arc<dyn CloudModel>> = match &config.cloud.api_key {
        Some(key) if config.cloud.has_api_key() => Some(Arc::new(GeminiClient::new(
            key.clone(),
            config.cloud.model.clone(),
            config.cloud.base_url.clone(),
            config.cloud.timeout(),
            config.cloud.max_output_tokens,
        )?)),
        _ => {
            info!("No cloud API key configured, escalations will stay on-device");
            None
        }
    };

    Ok(HybridRouter::new(local, cloud).with_threshold(config.routing.confidence_threshold))
}

/// The instruction sent along with an anonymized clause summary.
#[must_use]
pub fn elaboration_task(call: &FunctionCall) -> String {
    let clause = call.arg("clause_type").unwrap_or_default().replace('_', " ");
    match call.tool() {
        Some(Tool::CheckEnforceability) => {
            let jurisdiction = call
                .arg("jurisdiction")
                .unwrap_or("the specified jurisdiction");
            format!(
                "As a legal expert, assess whether the following {clause} clause is legally \
                 enforceable in {jurisdiction}. Cite relevant laws or precedents if applicable. \
                 Be concise (3-4 sentences)."
            )
        }
        _ => format!(
            "As a legal expert, assess whether the following {clause} clause is standard, \
             unusually broad, or unusually narrow compared to typical NDAs. \
             Be concise (3-4 sentences)."
        ),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    round_to(started.elapsed().as_secs_f64() * 1000.0, 1)
}

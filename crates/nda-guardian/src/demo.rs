//! Scripted five-question walkthrough of the bundled sample agreement.
//!
//! Mock mode routes with the keyword model so the demo runs anywhere. Live
//! mode uses the configured local model. Auto mode picks live when the
//! configured endpoint model accepts connections. Without a cloud API key,
//! cloud escalations still happen (so the routing is visible) but
//! elaboration is skipped.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{Config, LocalModelKind};
use crate::document::SAMPLE_NDA;
use crate::error::Result;
use crate::privacy::{Anonymizer, PrivacyFilter};
use crate::routing::{
    CloudModel, EndpointModel, Generation, HybridRouter, KeywordModel, LocalModel, Message,
};
use crate::service::{router_from_config, QueryResponse, QueryService};
use crate::session::{Session, SessionStats};
use crate::tools::ToolSpec;

/// The questions asked, in order.
pub const DEMO_QUERIES: [&str; 5] = [
    "Who are the parties to this agreement?",
    "What is the non-compete duration?",
    "Summarize the IP assignment clause.",
    "Is this non-compete enforceable in California?",
    "Is this IP clause unusually broad?",
];

/// Printed in place of an elaboration when no API key is set.
pub const SKIPPED_ELABORATION: &str = "[cloud API key not set, skipping cloud elaboration]";

const RULE_WIDTH: usize = 65;

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(1);

/// How tool calls are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DemoMode {
    /// Live if the configured model server is up, otherwise mock.
    #[default]
    Auto,
    /// Keyword model, no model server needed.
    Mock,
    /// The local model from the configuration.
    Live,
}

/// What the demo produced.
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// One response per question that succeeded.
    pub responses: Vec<QueryResponse>,
    /// Session statistics after the last question.
    pub stats: SessionStats,
}

/// Stands in for the cloud model when no API key is configured.
///
/// Tool selection is answered by the keyword model so escalated questions
/// still get calls.
#[derive(Debug, Default)]
struct OfflineCloud {
    keywords: KeywordModel,
}

#[async_trait::async_trait]
impl CloudModel for OfflineCloud {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<Generation> {
        self.keywords.generate(messages, tools).await
    }

    async fn elaborate(&self, _task: &str, _context: &str) -> Result<String> {
        Ok(SKIPPED_ELABORATION.to_string())
    }
}

/// Run the demo, writing the transcript to `out`.
///
/// # Errors
///
/// Returns an error if the router cannot be built or `out` cannot be
/// written. Failed questions are reported in the transcript instead.
pub async fn run(config: &Config, mode: DemoMode, out: &mut impl Write) -> Result<DemoReport> {
    let mode = resolve_mode(config, mode).await;
    let service = demo_service(config, mode)?;
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);

    writeln!(out, "{rule}")?;
    writeln!(out, "  NDA GUARDIAN: Hybrid Routing Demo ({mode:?} mode)")?;
    writeln!(out, "{rule}")?;

    let loaded = service.load(SAMPLE_NDA).await?;
    writeln!(
        out,
        "\nDocument loaded: {} clauses detected",
        loaded.clauses_found.len()
    )?;
    writeln!(out, "Clauses: {}", loaded.clauses_found.join(", "))?;

    let mut responses = Vec::with_capacity(DEMO_QUERIES.len());
    for (i, query) in DEMO_QUERIES.iter().enumerate() {
        writeln!(out, "\n{thin}")?;
        writeln!(out, "Query {}: \"{query}\"", i + 1)?;
        writeln!(out, "{thin}")?;

        match service.query(query).await {
            Ok(response) => {
                write_response(out, &response)?;
                responses.push(response);
            }
            Err(e) => {
                warn!(error = %e, query, "Demo question failed");
                writeln!(out, "  Error         : {e}")?;
            }
        }
    }

    let stats = service.stats().await;
    write_scorecard(out, &stats)?;
    Ok(DemoReport { responses, stats })
}

/// Settle [`DemoMode::Auto`]: live only when the configured local model is an
/// endpoint that accepts connections.
pub async fn resolve_mode(config: &Config, mode: DemoMode) -> DemoMode {
    if mode != DemoMode::Auto {
        return mode;
    }
    if config.routing.local_model != LocalModelKind::Endpoint {
        return DemoMode::Mock;
    }

    let url = &config.routing.endpoint_url;
    let reachable = match EndpointModel::new(
        url.clone(),
        config.routing.max_tokens,
        config.routing.timeout(),
    ) {
        Ok(model) => model.is_reachable(REACHABILITY_TIMEOUT).await,
        Err(e) => {
            warn!(error = %e, "Could not build local model client");
            false
        }
    };
    if reachable {
        DemoMode::Live
    } else {
        info!(url = %url, "Local model not reachable, running in mock mode");
        DemoMode::Mock
    }
}

fn demo_service(config: &Config, mode: DemoMode) -> Result<QueryService> {
    let configured = router_from_config(config)?;
    let local: Arc<dyn LocalModel> = match mode {
        DemoMode::Auto | DemoMode::Mock => Arc::new(KeywordModel::new()),
        DemoMode::Live => configured.local().clone(),
    };
    let cloud = configured
        .cloud()
        .cloned()
        .unwrap_or_else(|| Arc::new(OfflineCloud::default()) as Arc<dyn CloudModel>);

    let router = HybridRouter::new(local, Some(cloud))
        .with_threshold(config.routing.confidence_threshold);
    let anonymizer = Anonymizer::new(
        PrivacyFilter::with_config(config.privacy.filter_config()),
        config.privacy.summary_max_words,
    );
    Ok(QueryService::new(
        router,
        anonymizer,
        Session::new(config.cloud.cost_per_word_usd),
    ))
}

fn write_response(out: &mut impl Write, response: &QueryResponse) -> std::io::Result<()> {
    let args = response
        .tool_arguments
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(out, "  Tool selected : {}({args})", response.tool_called)?;
    writeln!(out, "  Route         : {}", response.source)?;
    if let Some(confidence) = response.confidence {
        writeln!(out, "  Confidence    : {confidence:.2}")?;
    }
    writeln!(out, "\n  Answer        : {}", response.answer)?;
    let cloud_ms = response.latency_ms - response.device_latency_ms;
    if (!response.source.is_local() || response.words_sent_to_cloud > 0) && cloud_ms > 0.0 {
        writeln!(
            out,
            "\n  Latency       : {:.0}ms total ({:.0}ms device + {cloud_ms:.0}ms cloud)",
            response.latency_ms, response.device_latency_ms
        )?;
    } else {
        writeln!(out, "\n  Latency       : {:.0}ms", response.latency_ms)?;
    }
    if response.words_sent_to_cloud > 0 {
        writeln!(
            out,
            "  Words sent    : {} (anonymized clause summary only)",
            response.words_sent_to_cloud
        )
    } else {
        writeln!(out, "  Words sent    : 0 (fully private)")
    }
}

fn write_scorecard(out: &mut impl Write, stats: &SessionStats) -> std::io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "\n{rule}")?;
    writeln!(out, "  SESSION SCORECARD")?;
    writeln!(out, "{rule}")?;
    writeln!(
        out,
        "  Queries   : {} total | {} local ({}%) | {} cloud ({}%)",
        stats.query_count, stats.local_count, stats.local_pct, stats.cloud_count, stats.cloud_pct
    )?;
    writeln!(
        out,
        "  Privacy   : {} words sent to cloud | 0 raw document bytes",
        stats.total_words_sent_to_cloud
    )?;
    writeln!(out, "  Latency   : {:.1}ms average", stats.avg_latency_ms)?;
    writeln!(out, "  Est. cost : ~${:.4}", stats.total_cost_usd)?;
    writeln!(out, "{rule}")
}

//! Per-session state: the loaded document and query statistics.

use serde::Serialize;

use crate::document::Document;
use crate::routing::RouteSource;

/// Approximate cloud cost per word sent, in USD.
pub const DEFAULT_COST_PER_WORD_USD: f64 = 0.000_01;

/// Running totals for one session.
#[derive(Debug, Clone, Default, PartialEq)]
struct Totals {
    query_count: u64,
    local_count: u64,
    cloud_count: u64,
    total_latency_ms: f64,
    total_words_sent_to_cloud: u64,
    total_cost_usd: f64,
}

/// A snapshot of session statistics, as served by `/api/stats`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    /// Queries answered.
    pub query_count: u64,
    /// Queries whose tool calls came from the device.
    pub local_count: u64,
    /// Queries escalated to the cloud.
    pub cloud_count: u64,
    /// Share of local queries, rounded to a whole percent.
    pub local_pct: u64,
    /// Share of cloud queries, rounded to a whole percent.
    pub cloud_pct: u64,
    /// Mean latency, one decimal.
    pub avg_latency_ms: f64,
    /// Words of anonymized text sent to the cloud.
    pub total_words_sent_to_cloud: u64,
    /// Estimated cloud spend, six decimals.
    pub total_cost_usd: f64,
}

/// The document under analysis and what has been asked about it.
#[derive(Debug)]
pub struct Session {
    document: Option<Document>,
    totals: Totals,
    cost_per_word_usd: f64,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new(cost_per_word_usd: f64) -> Self {
        Self {
            document: None,
            totals: Totals::default(),
            cost_per_word_usd,
        }
    }

    /// The loaded document, if any.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    /// Replace the loaded document. Statistics are kept.
    pub fn set_document(&mut self, document: Document) {
        self.document = Some(document);
    }

    /// Count a finished query.
    ///
    /// A query that sent words to the cloud counts as cloud whatever its
    /// route, since elaboration can follow a failed cloud tool selection.
    pub fn record_query(&mut self, source: RouteSource, latency_ms: f64, words_sent: usize) {
        let t = &mut self.totals;
        t.query_count += 1;
        t.total_latency_ms += latency_ms;

        if source.is_local() && words_sent == 0 {
            t.local_count += 1;
            return;
        }

        let words = words_sent as u64;
        t.cloud_count += 1;
        t.total_words_sent_to_cloud += words;
        #[allow(clippy::cast_precision_loss)]
        {
            t.total_cost_usd += words as f64 * self.cost_per_word_usd;
        }
    }

    /// A snapshot of the statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn stats(&self) -> SessionStats {
        let t = &self.totals;
        let (local_pct, cloud_pct, avg_latency_ms) = if t.query_count == 0 {
            (0, 0, 0.0)
        } else {
            let n = t.query_count as f64;
            (
                (100.0 * t.local_count as f64 / n).round() as u64,
                (100.0 * t.cloud_count as f64 / n).round() as u64,
                round_to(t.total_latency_ms / n, 1),
            )
        };

        SessionStats {
            query_count: t.query_count,
            local_count: t.local_count,
            cloud_count: t.cloud_count,
            local_pct,
            cloud_pct,
            avg_latency_ms,
            total_words_sent_to_cloud: t.total_words_sent_to_cloud,
            total_cost_usd: round_to(t.total_cost_usd, 6),
        }
    }

    /// Drop the document and zero the statistics.
    pub fn reset(&mut self) {
        self.document = None;
        self.totals = Totals::default();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_COST_PER_WORD_USD)
    }
}

/// Round to `places` decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

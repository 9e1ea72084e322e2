//! Deterministic offline tool selection.
//!
//! Picks a tool from keywords in the question. Used for demos, tests and
//! machines without a local model server; confidences are fixed per tool so
//! routing behaves the same on every run.

use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use tracing::trace;

use super::{FunctionCall, Generation, LocalModel, Message};
use crate::clause::ClauseKey;
use crate::error::Result;
use crate::tools::{Tool, ToolSpec};

const PARTIES_CONFIDENCE: f64 = 0.91;
const CLAUSE_INFO_CONFIDENCE: f64 = 0.87;
const SUMMARY_CONFIDENCE: f64 = 0.83;
const ENFORCEABILITY_CONFIDENCE: f64 = 0.79;
const BENCHMARK_CONFIDENCE: f64 = 0.76;
/// A tool was recognized but not the clause it should look at.
const NO_CLAUSE_CONFIDENCE: f64 = 0.55;
const UNRECOGNIZED_CONFIDENCE: f64 = 0.30;

/// Clause mentions, most specific first.
const CLAUSE_MENTIONS: &[(&str, ClauseKey)] = &[
    (r"non[\s-]?compete|restrictive covenant", ClauseKey::NonCompete),
    (
        r"intellectual property|\bip\b|work product|invention",
        ClauseKey::IpAssignment,
    ),
    (r"indemni", ClauseKey::Indemnification),
    (r"liabilit", ClauseKey::LiabilityCap),
    (r"governing law|jurisdiction|dispute|arbitration", ClauseKey::GoverningLaw),
    (r"confidential|\bnda\b|disclos", ClauseKey::Confidentiality),
    (r"\bterm\b|terminat|how long does (?:the|this) agreement", ClauseKey::Term),
];

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("Invalid regex pattern"))
        }
    };
}

cached_regex!(
    enforce_regex,
    r"(?i)\benforce|\bvalid\b|\blegally binding\b|\bholds? up\b"
);
cached_regex!(
    benchmark_regex,
    r"(?i)\bunusual|\bbroad\b|\bnarrow\b|\bstandard\b|\btypical\b|\bmarket\b|\bbenchmark|\bcompare"
);
cached_regex!(
    summary_regex,
    r"(?i)\bsummar|\boverview\b|\bexplain\b|\bin plain (?:english|terms)\b|\bbreak down\b"
);
cached_regex!(
    who_regex,
    r"(?i)\bparties\b|\bwho (?:signed|is involved|are the)\b|\bsignator"
);
cached_regex!(
    parties_regex,
    r"(?i)\bpart(?:y|ies)\b|\bwho (?:signed|is involved|are the)\b|\bsignator"
);
cached_regex!(
    duration_regex,
    r"(?i)\bduration\b|\bhow long\b|\bperiod\b|\blength\b|\blast\b"
);
cached_regex!(
    scope_regex,
    r"(?i)\bscope\b|\bwhere\b|\bradius\b|\bgeograph|\bterritor|\barea\b"
);
cached_regex!(
    amount_regex,
    r"(?i)\bamount\b|\bhow much\b|\bcap\b|\bmaximum\b|\bdollars?\b|\$"
);
cached_regex!(
    jurisdiction_regex,
    r"\b(?:in|under)\s+((?:the State of\s+)?[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)"
);

fn clause_regexes() -> &'static [(Regex, ClauseKey)] {
    static RES: OnceLock<Vec<(Regex, ClauseKey)>> = OnceLock::new();
    RES.get_or_init(|| {
        CLAUSE_MENTIONS
            .iter()
            .map(|(pattern, key)| {
                (
                    Regex::new(&format!("(?i){pattern}")).expect("Invalid regex pattern"),
                    key.clone(),
                )
            })
            .collect()
    })
}

/// Keyword-driven stand-in for an on-device function-calling model.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordModel;

impl KeywordModel {
    /// Create the model.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Choose a call for a single question.
    #[must_use]
    pub fn classify(&self, question: &str) -> Generation {
        let started = Instant::now();
        let clause = mentioned_clause(question);

        let (call, confidence) = if enforce_regex().is_match(question) {
            let mut call = FunctionCall::new(Tool::CheckEnforceability.name());
            if let Some(jurisdiction) = mentioned_jurisdiction(question) {
                call = call.with_arg("jurisdiction", jurisdiction);
            }
            with_clause(call, clause.as_ref(), ENFORCEABILITY_CONFIDENCE)
        } else if benchmark_regex().is_match(question) {
            with_clause(
                FunctionCall::new(Tool::BenchmarkClause.name()),
                clause.as_ref(),
                BENCHMARK_CONFIDENCE,
            )
        } else if summary_regex().is_match(question) {
            with_clause(
                FunctionCall::new(Tool::SummarizeClause.name()),
                clause.as_ref(),
                SUMMARY_CONFIDENCE,
            )
        } else if who_regex().is_match(question) {
            (
                Some(FunctionCall::new(Tool::ExtractParties.name())),
                PARTIES_CONFIDENCE,
            )
        } else if clause.is_some() {
            let mut call = FunctionCall::new(Tool::GetClauseInfo.name());
            if let Some(field) = mentioned_field(question) {
                call = call.with_arg("field", field);
            }
            with_clause(call, clause.as_ref(), CLAUSE_INFO_CONFIDENCE)
        } else if parties_regex().is_match(question) {
            (
                Some(FunctionCall::new(Tool::ExtractParties.name())),
                PARTIES_CONFIDENCE,
            )
        } else {
            (None, UNRECOGNIZED_CONFIDENCE)
        };

        trace!(question, ?call, confidence, "Keyword classification");
        Generation {
            function_calls: call.into_iter().collect(),
            total_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            confidence,
            cloud_handoff: false,
        }
    }
}

fn with_clause(
    call: FunctionCall,
    clause: Option<&ClauseKey>,
    confidence: f64,
) -> (Option<FunctionCall>, f64) {
    match clause {
        Some(key) => (Some(call.with_arg("clause_type", key.as_str())), confidence),
        None => (Some(call), NO_CLAUSE_CONFIDENCE),
    }
}

fn mentioned_clause(question: &str) -> Option<ClauseKey> {
    clause_regexes()
        .iter()
        .find(|(regex, _)| regex.is_match(question))
        .map(|(_, key)| key.clone())
}

fn mentioned_field(question: &str) -> Option<&'static str> {
    if duration_regex().is_match(question) {
        Some("duration")
    } else if scope_regex().is_match(question) {
        Some("scope")
    } else if amount_regex().is_match(question) {
        Some("amount")
    } else {
        None
    }
}

fn mentioned_jurisdiction(question: &str) -> Option<String> {
    jurisdiction_regex()
        .captures(question)
        .map(|c| c[1].trim_start_matches("the State of").trim().to_string())
}

#[async_trait::async_trait]
impl LocalModel for KeywordModel {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn generate(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<Generation> {
        let question = messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map_or("", |m| m.content.as_str());
        Ok(self.classify(question))
    }
}

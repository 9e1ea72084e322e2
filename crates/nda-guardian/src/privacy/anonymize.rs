//! Anonymized clause summaries.
//!
//! A clause summary is the only document-derived text that may leave the
//! device. Party names are replaced with `Party A` / `Party B`, role labels
//! are generalized, and the sensitive-data filter runs last.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::filter::{FilterResult, PrivacyFilter};
use crate::clause::ClauseKey;
use crate::document::{strip_headers, Document, Parties};

/// Placeholder for the corporate party.
pub const PARTY_A: &str = "Party A";

/// Placeholder for the individual party.
pub const PARTY_B: &str = "Party B";

/// Words kept in a clause summary unless configured otherwise.
pub const DEFAULT_SUMMARY_WORDS: usize = 80;

fn company_role_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[Tt]he Company\b").expect("Invalid regex pattern"))
}

fn employee_role_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[Tt]he Employee\b").expect("Invalid regex pattern"))
}

/// Outcome of summarizing a clause for the cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseSummary {
    /// Anonymized text that may be sent.
    Ready(String),
    /// The document has no such clause.
    Missing,
    /// The filter refused to let the summary leave the device.
    Blocked {
        /// Pattern that triggered the block.
        pattern_name: String,
    },
}

/// Builds anonymized text from a loaded document.
#[derive(Debug)]
pub struct Anonymizer {
    filter: PrivacyFilter,
    summary_max_words: usize,
}

impl Anonymizer {
    /// Create an anonymizer around a configured filter.
    #[must_use]
    pub fn new(filter: PrivacyFilter, summary_max_words: usize) -> Self {
        Self {
            filter,
            summary_max_words,
        }
    }

    /// Replace party names and role labels, then run the sensitive-data
    /// filter. Returns the filter's verdict on the substituted text.
    #[must_use]
    pub fn anonymize(&self, document: &Document, text: &str) -> FilterResult {
        let substituted = replace_parties(document, text);
        match self.filter.filter(&substituted) {
            FilterResult::Passed => FilterResult::Redacted {
                content: substituted,
                redacted_patterns: Vec::new(),
            },
            other => other,
        }
    }

    /// An anonymized summary of `clause`, at most the configured number of
    /// words.
    #[must_use]
    pub fn clause_summary(&self, document: &Document, clause: &str) -> ClauseSummary {
        self.clause_summary_with_limit(document, clause, self.summary_max_words)
    }

    /// An anonymized summary of `clause`, at most `max_words` words.
    ///
    /// Numbered header lines and all-caps titles are dropped first. The result
    /// is cut at the last sentence end inside the word budget when one exists
    /// past the first quarter of the text; otherwise `...` marks the cut.
    #[must_use]
    pub fn clause_summary_with_limit(
        &self,
        document: &Document,
        clause: &str,
        max_words: usize,
    ) -> ClauseSummary {
        let key = ClauseKey::normalize(clause);
        let Some(text) = document.get(&key).filter(|t| !t.trim().is_empty()) else {
            return ClauseSummary::Missing;
        };
        if !key.is_shareable() {
            debug!(clause = %key, "Refusing to summarize the parties clause");
            return ClauseSummary::Blocked {
                pattern_name: "party_names".to_string(),
            };
        }

        let body = strip_headers(text);
        let body = if body.is_empty() { text } else { body.as_str() };

        match self.anonymize(document, body) {
            FilterResult::Blocked { pattern_name } => ClauseSummary::Blocked { pattern_name },
            FilterResult::Redacted { content, .. } => {
                ClauseSummary::Ready(truncate_words(&content, max_words))
            }
            FilterResult::Passed => ClauseSummary::Ready(truncate_words(body, max_words)),
        }
    }
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new(PrivacyFilter::new(), DEFAULT_SUMMARY_WORDS)
    }
}

fn replace_parties(document: &Document, text: &str) -> String {
    let parties = document
        .get(&ClauseKey::Parties)
        .map(Parties::find)
        .unwrap_or_default();

    let mut out = text.to_string();
    if let Some(company) = &parties.company {
        out = out.replace(company.as_str(), PARTY_A);
    }
    if let Some(individual) = &parties.individual {
        out = out.replace(individual.as_str(), PARTY_B);
    }

    let out = company_role_regex().replace_all(&out, PARTY_A);
    employee_role_regex().replace_all(&out, PARTY_B).into_owned()
}

fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.trim().to_string();
    }

    let truncated = words[..max_words].join(" ");
    let sentence_end = [". ", "! ", "? "]
        .iter()
        .filter_map(|end| truncated.rfind(end))
        .max()
        .filter(|&end| end > truncated.len() / 4);

    match sentence_end {
        Some(end) => truncated[..=end].trim().to_string(),
        None => format!("{}...", truncated.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privacy::{FilterConfig, FilterMode};

    fn summary_text(summary: ClauseSummary) -> String {
        match summary {
            ClauseSummary::Ready(text) => text,
            other => panic!("Expected Ready summary, got {other:?}"),
        }
    }

    #[test]
    fn test_anonymize_replaces_party_names() {
        let doc = Document::sample();
        let anonymizer = Anonymizer::default();

        let out = anonymizer
            .anonymize(&doc, "Jordan Avery works for Northwind Corp. under the Employee terms.")
            .into_text("unused")
            .unwrap();
        assert_eq!(out, "Party B works for Party A. under Party B terms.");
    }

    #[test]
    fn test_anonymize_generalizes_roles() {
        let doc = Document::from_clauses([(ClauseKey::Term, "One year.")]);
        let out = Anonymizer::default()
            .anonymize(&doc, "The Employee shall notify the Company.")
            .into_text("unused")
            .unwrap();
        assert_eq!(out, "Party B shall notify Party A.");
    }

    #[test]
    fn test_anonymize_redacts_sensitive_data() {
        let doc = Document::from_clauses([(ClauseKey::Term, "One year.")]);
        let out = Anonymizer::default()
            .anonymize(&doc, "Notices go to legal@northwind.example.com.")
            .into_text("unused")
            .unwrap();
        assert_eq!(out, "Notices go to [REDACTED].");
    }

    #[test]
    fn test_anonymize_block_mode() {
        let doc = Document::from_clauses([(ClauseKey::Term, "One year.")]);
        let anonymizer = Anonymizer::new(
            PrivacyFilter::with_config(FilterConfig {
                mode: FilterMode::Block,
                ..Default::default()
            }),
            DEFAULT_SUMMARY_WORDS,
        );
        let result = anonymizer.anonymize(&doc, "SSN 123-45-6789");
        assert!(matches!(result, FilterResult::Blocked { .. }));
    }

    #[test]
    fn test_clause_summary_strips_header_and_names() {
        let doc = Document::sample();
        let summary = summary_text(Anonymizer::default().clause_summary(&doc, "non_compete"));

        assert!(!summary.contains("NON-COMPETE COVENANT"));
        assert!(!summary.contains("Northwind"));
        assert!(!summary.contains("Employee"));
        assert!(summary.starts_with("During the engagement"));
        assert!(summary.contains("Party B shall not"));
        assert!(summary.split_whitespace().count() <= DEFAULT_SUMMARY_WORDS);
    }

    #[test]
    fn test_clause_summary_missing() {
        let doc = Document::from_clauses([(ClauseKey::Term, "One year.")]);
        assert_eq!(
            Anonymizer::default().clause_summary(&doc, "indemnification"),
            ClauseSummary::Missing
        );
    }

    #[test]
    fn test_clause_summary_never_shares_parties() {
        let doc = Document::sample();
        assert!(matches!(
            Anonymizer::default().clause_summary(&doc, "parties"),
            ClauseSummary::Blocked { .. }
        ));
    }

    #[test]
    fn test_clause_summary_header_only_falls_back() {
        let doc = Document::from_clauses([(ClauseKey::Term, "6. TERM AND TERMINATION")]);
        let summary = summary_text(Anonymizer::default().clause_summary(&doc, "term"));
        assert_eq!(summary, "6. TERM AND TERMINATION");
    }

    #[test]
    fn test_truncate_at_sentence_boundary() {
        let text = "One two three four five six. Seven eight nine ten eleven twelve";
        assert_eq!(truncate_words(text, 8), "One two three four five six.");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        let text = "One. Two three four five six seven eight nine ten";
        assert_eq!(
            truncate_words(text, 6),
            "One. Two three four five six..."
        );
    }

    #[test]
    fn test_truncate_boundary_at_first_quarter_is_ignored() {
        // "Abcde. fghij klmno p" is 20 bytes and its sentence end sits at 5.
        let text = "Abcde. fghij klmno p qrstu";
        assert_eq!(truncate_words(text, 4), "Abcde. fghij klmno p...");

        // One byte later it counts.
        let text = "Abcdef. ghij klmno p qrstu";
        assert_eq!(truncate_words(text, 4), "Abcdef.");
    }

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_words("  short text ", 80), "short text");
    }
}

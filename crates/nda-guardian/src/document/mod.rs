//! Plain-text NDA segmentation.
//!
//! Documents arrive as plain text. Sections are separated by horizontal rules
//! (`---` or `===`) and open with a numbered, upper-case title such as
//! `2. NON-COMPETE COVENANT`. Each section is filed under a [`ClauseKey`];
//! un-numbered prose that talks about the parties (the preamble, the
//! signature block) is collected under [`ClauseKey::Parties`].
//!
//! # Example
//!
//! ```
//! use nda_guardian::{ClauseKey, Document};
//!
//! let doc = Document::parse(
//!     "Agreement between Acme Corp. and Sam Lee, an individual.\n---\n\
//!      1. CONFIDENTIAL INFORMATION\nAll business data is confidential.",
//! )
//! .unwrap();
//!
//! assert_eq!(doc.keys(), vec![ClauseKey::Parties, ClauseKey::Confidentiality]);
//! assert!(doc.clause("nda").is_some());
//! ```

mod extract;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::clause::ClauseKey;
use crate::error::{Error, Result};

pub use extract::{excerpt, sentences, strip_headers, Field, Parties};

/// The sample agreement bundled for demos and tests.
pub const SAMPLE_NDA: &str = include_str!("../../data/sample_nda.txt");

/// A single segmented section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clause {
    /// Canonical key the section was filed under.
    pub key: ClauseKey,
    /// Full section text, including its numbered header.
    pub text: String,
}

/// A parsed NDA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    clauses: Vec<Clause>,
    content_hash: String,
    word_count: usize,
}

fn rule_regex() -> &'static Regex {
    static RULE: OnceLock<Regex> = OnceLock::new();
    RULE.get_or_init(|| Regex::new(r"\n\s*[-=]{3,}\s*\n").expect("Invalid regex pattern"))
}

fn numbered_header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^(\d+(?:\.\d+)*)\.\s+([A-Z][A-Z\s,()&/'-]{3,})").expect("Invalid regex pattern")
    })
}

fn party_mention_regex() -> &'static Regex {
    static MENTION: OnceLock<Regex> = OnceLock::new();
    MENTION.get_or_init(|| {
        Regex::new(r"(?i)(between|party|parties|corporation|individual|agreement)")
            .expect("Invalid regex pattern")
    })
}

impl Document {
    /// Parse plain NDA text into clauses.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDocument`] if `text` is blank.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(Error::EmptyDocument);
        }

        let mut doc = Self {
            clauses: Vec::new(),
            content_hash: blake3::hash(text.as_bytes()).to_hex().to_string(),
            word_count: text.split_whitespace().count(),
        };

        for section in rule_regex().split(text) {
            let section = section.trim();
            if section.is_empty() {
                continue;
            }

            if let Some(caps) = numbered_header_regex().captures(section) {
                let header = caps.get(2).map_or("", |m| m.as_str().trim());
                let key = ClauseKey::identify(header);
                debug!(number = &caps[1], clause = %key, "Segmented numbered section");
                doc.append(key, section);
            } else if party_mention_regex().is_match(section) {
                doc.append(ClauseKey::Parties, section);
            } else {
                debug!(
                    chars = section.len(),
                    "Dropping un-numbered section with no party mention"
                );
            }
        }

        Ok(doc)
    }

    /// Parse the bundled sample agreement.
    #[must_use]
    pub fn sample() -> Self {
        Self::parse(SAMPLE_NDA).expect("bundled sample NDA is not empty")
    }

    /// Build a document from already-segmented clauses.
    ///
    /// Clauses sharing a key are joined the same way [`Document::parse`]
    /// joins repeated sections.
    pub fn from_clauses<I, T>(clauses: I) -> Self
    where
        I: IntoIterator<Item = (ClauseKey, T)>,
        T: Into<String>,
    {
        let mut doc = Self {
            clauses: Vec::new(),
            content_hash: String::new(),
            word_count: 0,
        };
        for (key, text) in clauses {
            let text = text.into();
            doc.word_count += text.split_whitespace().count();
            doc.append(key, &text);
        }
        let joined = doc.full_text();
        doc.content_hash = blake3::hash(joined.as_bytes()).to_hex().to_string();
        doc
    }

    fn append(&mut self, key: ClauseKey, text: &str) {
        if let Some(existing) = self.clauses.iter_mut().find(|c| c.key == key) {
            existing.text.push_str("\n\n");
            existing.text.push_str(text);
        } else {
            self.clauses.push(Clause {
                key,
                text: text.to_string(),
            });
        }
    }

    /// Look up a clause by any accepted name or alias.
    #[must_use]
    pub fn clause(&self, name: &str) -> Option<&str> {
        self.get(&ClauseKey::normalize(name))
    }

    /// Look up a clause by canonical key.
    #[must_use]
    pub fn get(&self, key: &ClauseKey) -> Option<&str> {
        self.clauses
            .iter()
            .find(|c| &c.key == key)
            .map(|c| c.text.as_str())
    }

    /// Clause keys in the order they were first seen.
    #[must_use]
    pub fn keys(&self) -> Vec<ClauseKey> {
        self.clauses.iter().map(|c| c.key.clone()).collect()
    }

    /// All clauses in document order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Number of distinct clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether no clause was recognized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// BLAKE3 hash of the source text, used as the document's identity.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Word count of the source text.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.word_count
    }

    /// Every clause joined with newlines, in document order.
    #[must_use]
    pub fn full_text(&self) -> String {
        self.clauses
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT_NDA: &str = "\
CONFIDENTIALITY AGREEMENT

This agreement is made between Acme Corp., a Texas corporation, and Sam Lee, an individual.

---

1. CONFIDENTIAL INFORMATION

Sam Lee shall keep all business data of Acme Corp. confidential.

---

2. NON-COMPETE

No competing work for six months.

===

2.1. NON-COMPETE EXCEPTIONS

Teaching and academic research are excluded.

---

Page 3 of 3
";

    #[test]
    fn test_parse_rejects_blank() {
        assert!(matches!(Document::parse(""), Err(Error::EmptyDocument)));
        assert!(matches!(
            Document::parse("  \n\t "),
            Err(Error::EmptyDocument)
        ));
    }

    #[test]
    fn test_parse_segments_sections() {
        let doc = Document::parse(SHORT_NDA).unwrap();
        assert_eq!(
            doc.keys(),
            vec![
                ClauseKey::Parties,
                ClauseKey::Confidentiality,
                ClauseKey::NonCompete
            ]
        );
    }

    #[test]
    fn test_parse_joins_repeated_keys() {
        let doc = Document::parse(SHORT_NDA).unwrap();
        let non_compete = doc.get(&ClauseKey::NonCompete).unwrap();
        assert!(non_compete.starts_with("2. NON-COMPETE"));
        assert!(non_compete.contains("\n\n2.1. NON-COMPETE EXCEPTIONS"));
    }

    #[test]
    fn test_parse_drops_unrelated_prose() {
        let doc = Document::parse(SHORT_NDA).unwrap();
        assert!(!doc.full_text().contains("Page 3 of 3"));
    }

    #[test]
    fn test_parse_without_rules_is_single_section() {
        let doc = Document::parse("1. TERM\nThis agreement lasts two years.").unwrap();
        assert_eq!(doc.keys(), vec![ClauseKey::Term]);
    }

    #[test]
    fn test_parse_unnumbered_text_without_parties_is_empty() {
        let doc = Document::parse("Just some notes.").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.len(), 0);
    }

    #[test]
    fn test_clause_lookup_by_alias() {
        let doc = Document::parse(SHORT_NDA).unwrap();
        assert!(doc.clause("confidential").is_some());
        assert!(doc.clause("Restrictive Covenant").is_some());
        assert!(doc.clause("ip").is_none());
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = Document::parse(SHORT_NDA).unwrap();
        let b = Document::parse(SHORT_NDA).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);

        let c = Document::parse("1. TERM\nOne year.").unwrap();
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn test_word_count() {
        let doc = Document::parse("1. TERM\nOne year only.").unwrap();
        assert_eq!(doc.word_count(), 5);
    }

    #[test]
    fn test_from_clauses() {
        let doc = Document::from_clauses([
            (ClauseKey::Term, "Two years."),
            (ClauseKey::Term, "Renews yearly."),
            (ClauseKey::GoverningLaw, "New York law."),
        ]);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get(&ClauseKey::Term), Some("Two years.\n\nRenews yearly."));
        assert!(!doc.content_hash().is_empty());

        let clauses = doc.clauses();
        assert_eq!(clauses[0].key, ClauseKey::Term);
        assert_eq!(clauses[1].key, ClauseKey::GoverningLaw);
        assert_eq!(clauses[1].text, "New York law.");
    }

    #[test]
    fn test_sample_document_has_every_queryable_clause() {
        let doc = Document::sample();
        for key in ClauseKey::QUERYABLE {
            assert!(doc.get(&key).is_some(), "sample is missing {key}");
        }
        assert_eq!(doc.keys().first(), Some(&ClauseKey::Parties));
        assert!(doc.get(&ClauseKey::General).is_some());
    }

    #[test]
    fn test_sample_signature_block_joins_parties() {
        let doc = Document::sample();
        let parties = doc.get(&ClauseKey::Parties).unwrap();
        assert!(parties.contains("IN WITNESS WHEREOF"));
    }
}

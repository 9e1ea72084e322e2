//! Privacy protection for text that leaves the device.
//!
//! Nothing from a loaded document is sent to a cloud model except an
//! anonymized clause summary:
//!
//! - **Party substitution**: company and individual names found in the
//!   preamble become `Party A` and `Party B`.
//!
//! - **Pattern-based filtering**: emails, phone numbers, SSNs, addresses,
//!   card and bank numbers, plus configurable custom patterns.
//!
//! - **Multiple modes**: block, redact, or warn-only.
//!
//! # Example
//!
//! ```
//! use nda_guardian::privacy::{Anonymizer, ClauseSummary};
//! use nda_guardian::Document;
//!
//! let doc = Document::sample();
//! let anonymizer = Anonymizer::default();
//!
//! match anonymizer.clause_summary(&doc, "non_compete") {
//!     ClauseSummary::Ready(summary) => assert!(!summary.contains("Jordan Avery")),
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

mod anonymize;
mod filter;
mod patterns;

pub use anonymize::{Anonymizer, ClauseSummary, DEFAULT_SUMMARY_WORDS, PARTY_A, PARTY_B};
pub use filter::{FilterConfig, FilterMode, FilterResult, PrivacyFilter};
pub use patterns::{builtin_patterns, FilterPattern};

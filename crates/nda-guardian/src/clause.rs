//! Canonical clause names.
//!
//! NDAs name the same section many ways ("Restrictive Covenant",
//! "Non-Compete", "NONCOMPETE"). Everything downstream of segmentation works
//! on a [`ClauseKey`] so that a question about "the IP clause" finds the
//! section titled "INTELLECTUAL PROPERTY ASSIGNMENT".

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical key of an NDA section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClauseKey {
    /// The preamble naming the parties, plus any other un-numbered prose.
    Parties,
    /// Definition and handling of confidential information.
    Confidentiality,
    /// Non-compete or other restrictive covenant.
    NonCompete,
    /// Assignment of intellectual property and work product.
    IpAssignment,
    /// Indemnification obligations.
    Indemnification,
    /// Limitation of liability.
    LiabilityCap,
    /// Term and termination.
    Term,
    /// Governing law, jurisdiction and dispute resolution.
    GoverningLaw,
    /// General provisions / miscellaneous.
    General,
    /// Any section without a canonical mapping, keyed by its slug.
    Other(String),
}

/// Alias table used when a *caller* names a clause.
const ALIASES: &[(&str, ClauseKey)] = &[
    ("confidentiality", ClauseKey::Confidentiality),
    ("confidential", ClauseKey::Confidentiality),
    ("nda", ClauseKey::Confidentiality),
    ("non_compete", ClauseKey::NonCompete),
    ("non-compete", ClauseKey::NonCompete),
    ("noncompete", ClauseKey::NonCompete),
    ("non compete", ClauseKey::NonCompete),
    ("restrictive covenant", ClauseKey::NonCompete),
    ("ip_assignment", ClauseKey::IpAssignment),
    ("ip assignment", ClauseKey::IpAssignment),
    ("intellectual property", ClauseKey::IpAssignment),
    ("ip", ClauseKey::IpAssignment),
    ("work product", ClauseKey::IpAssignment),
    ("indemnification", ClauseKey::Indemnification),
    ("indemnity", ClauseKey::Indemnification),
    ("liability_cap", ClauseKey::LiabilityCap),
    ("liability cap", ClauseKey::LiabilityCap),
    ("limitation of liability", ClauseKey::LiabilityCap),
    ("liability", ClauseKey::LiabilityCap),
    ("term", ClauseKey::Term),
    ("term and termination", ClauseKey::Term),
    ("termination", ClauseKey::Term),
    ("duration", ClauseKey::Term),
    ("governing_law", ClauseKey::GoverningLaw),
    ("governing law", ClauseKey::GoverningLaw),
    ("jurisdiction", ClauseKey::GoverningLaw),
    ("dispute resolution", ClauseKey::GoverningLaw),
];

/// Section header patterns, tried in order.
const HEADER_PATTERNS: &[(&str, ClauseKey)] = &[
    (r"(?i)confidential", ClauseKey::Confidentiality),
    (r"(?i)non.?compete|restrictive covenant", ClauseKey::NonCompete),
    (
        r"(?i)intellectual property|ip assignment|work product",
        ClauseKey::IpAssignment,
    ),
    (r"(?i)indemnif", ClauseKey::Indemnification),
    (
        r"(?i)limitation of liability|liability cap",
        ClauseKey::LiabilityCap,
    ),
    (r"(?i)^term\b|term and termination|termination", ClauseKey::Term),
    (
        r"(?i)governing law|dispute resolution|jurisdiction",
        ClauseKey::GoverningLaw,
    ),
    (r"(?i)general provisions|miscellaneous", ClauseKey::General),
];

fn header_regexes() -> &'static [(Regex, ClauseKey)] {
    static COMPILED: OnceLock<Vec<(Regex, ClauseKey)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        HEADER_PATTERNS
            .iter()
            .filter_map(|(pattern, key)| Regex::new(pattern).ok().map(|re| (re, key.clone())))
            .collect()
    })
}

fn slug_regex() -> &'static Regex {
    static SLUG: OnceLock<Regex> = OnceLock::new();
    SLUG.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex pattern"))
}

impl ClauseKey {
    /// All canonical keys a tool may ask about, in document order.
    pub const QUERYABLE: [ClauseKey; 7] = [
        ClauseKey::Confidentiality,
        ClauseKey::NonCompete,
        ClauseKey::IpAssignment,
        ClauseKey::Indemnification,
        ClauseKey::LiabilityCap,
        ClauseKey::Term,
        ClauseKey::GoverningLaw,
    ];

    /// Normalize a caller-supplied clause name.
    ///
    /// Known aliases map to their canonical key. Anything else is lowercased
    /// with dashes and spaces turned into underscores, then parsed again so
    /// that `"Non Compete"` and `"non_compete"` agree.
    #[must_use]
    pub fn normalize(name: &str) -> Self {
        let lowered = name.trim().to_lowercase();
        if let Some((_, key)) = ALIASES.iter().find(|(alias, _)| *alias == lowered) {
            return key.clone();
        }
        Self::from_slug(&lowered.replace(['-', ' '], "_"))
    }

    /// Identify the clause a section header introduces.
    #[must_use]
    pub fn identify(header: &str) -> Self {
        for (regex, key) in header_regexes() {
            if regex.is_match(header) {
                return key.clone();
            }
        }
        let lowered = header.trim().to_lowercase();
        let slug = slug_regex().replace_all(&lowered, "_");
        Self::from_slug(slug.trim_matches('_'))
    }

    fn from_slug(slug: &str) -> Self {
        match slug {
            "parties" => Self::Parties,
            "confidentiality" => Self::Confidentiality,
            "non_compete" => Self::NonCompete,
            "ip_assignment" => Self::IpAssignment,
            "indemnification" => Self::Indemnification,
            "liability_cap" => Self::LiabilityCap,
            "term" => Self::Term,
            "governing_law" => Self::GoverningLaw,
            "general" => Self::General,
            other => Self::Other(other.to_string()),
        }
    }

    /// The canonical snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Parties => "parties",
            Self::Confidentiality => "confidentiality",
            Self::NonCompete => "non_compete",
            Self::IpAssignment => "ip_assignment",
            Self::Indemnification => "indemnification",
            Self::LiabilityCap => "liability_cap",
            Self::Term => "term",
            Self::GoverningLaw => "governing_law",
            Self::General => "general",
            Self::Other(slug) => slug,
        }
    }

    /// Human-readable name: `Non Compete`, `Ip Assignment`.
    #[must_use]
    pub fn label(&self) -> String {
        title_case(self.as_str())
    }

    /// Whether a cloud model can be given an anonymized summary of this
    /// clause. The preamble is made of party names and never qualifies.
    #[must_use]
    pub fn is_shareable(&self) -> bool {
        !matches!(self, Self::Parties)
    }
}

/// Title-case a snake_case name: `ip_assignment` becomes `Ip Assignment`.
#[must_use]
pub fn title_case(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl std::fmt::Display for ClauseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ClauseKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ClauseKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::normalize(&name))
    }
}

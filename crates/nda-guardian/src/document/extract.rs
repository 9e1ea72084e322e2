//! Field extraction from segmented clauses.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::Document;

/// Characters returned when a clause has no better answer than its opening.
const EXCERPT_CHARS: usize = 300;

/// A sentence needs more than this many words to count as a definition.
const DEFINITION_MIN_WORDS: usize = 10;

/// Named parties found in a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Parties {
    /// The corporate party (`Acme Corp`, `Initech LLC`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// The natural person (`Jordan Avery, an individual`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub individual: Option<String>,
}

/// A piece of information that can be pulled out of a clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// A time period such as "twenty-four (24) months".
    Duration,
    /// Geographic or subject-matter scope.
    Scope,
    /// A monetary amount.
    Amount,
    /// The parties to the agreement.
    Parties,
    /// The first substantive sentence of the clause.
    Definition,
    /// Anything else; answered with the opening of the clause.
    Other(String),
}

impl Field {
    /// Parse a caller-supplied field name. Blank names mean `Definition`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "duration" => Self::Duration,
            "scope" => Self::Scope,
            "amount" => Self::Amount,
            "parties" => Self::Parties,
            "definition" | "" => Self::Definition,
            other => Self::Other(other.to_string()),
        }
    }

    /// The field's name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Duration => "duration",
            Self::Scope => "scope",
            Self::Amount => "amount",
            Self::Parties => "parties",
            Self::Definition => "definition",
            Self::Other(name) => name,
        }
    }
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("Invalid regex pattern"))
        }
    };
}

// Company names are capitalized words on one line ending in a corporate
// suffix, so "This Agreement is made between Acme Corp" yields "Acme Corp".
cached_regex!(
    company_regex,
    r"\b((?:[A-Z][A-Za-z&]*[ \t]+)+(?:Corporation|Corp|Inc|LLC|Ltd|Limited))\b"
);
cached_regex!(
    individual_regex,
    r"([A-Z][a-z]+ [A-Z][a-z]+),? an individual"
);
cached_regex!(
    word_duration_regex,
    r"(?i)\b(twenty-four|twenty four|thirty-six|thirty six|eighteen|twelve|eleven|sixty|ninety|thirty|one|two|three|four|five|six|seven|eight|nine|ten)\s*(?:\(\d+\)\s*)?(months?|years?|days?)\b"
);
cached_regex!(numeric_duration_regex, r"(?i)(\d+)\s*(months?|years?|days?)\b");
cached_regex!(radius_regex, r"(?i)(\d+)\s*mile\s*radius[^.]+\.");
cached_regex!(
    state_regex,
    r"(?:State of|in)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)"
);
cached_regex!(amount_regex, r"\$[\d,]+(?:\.\d{2})?(?:\s*USD)?");
cached_regex!(header_line_regex, r"^\s*\d+(?:\.\d+)*\.?\s+[A-Z]");
cached_regex!(caps_title_regex, r"^\s*[A-Z][A-Z\s,()&/'-]{6,}\s*$");

impl Parties {
    /// Find party names in free text.
    #[must_use]
    pub fn find(text: &str) -> Self {
        Self {
            company: company_regex()
                .captures(text)
                .map(|c| c[1].trim().to_string()),
            individual: individual_regex()
                .captures(text)
                .map(|c| c[1].trim().to_string()),
        }
    }

    /// Whether neither party was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.company.is_none() && self.individual.is_none()
    }
}

impl std::fmt::Display for Parties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(company) = &self.company {
            parts.push(format!("Company: {company}"));
        }
        if let Some(individual) = &self.individual {
            parts.push(format!("Individual: {individual}"));
        }
        f.write_str(&parts.join("; "))
    }
}

/// Split text into sentences after `.`, `!` or `?` followed by whitespace.
#[must_use]
pub fn sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next, n)) = chars.peek() {
            if n.is_whitespace() {
                out.push(&text[start..next]);
                while chars.peek().is_some_and(|&(_, w)| w.is_whitespace()) {
                    chars.next();
                }
                start = chars.peek().map_or(text.len(), |&(j, _)| j);
            }
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// Clause text without its numbered header and all-caps title lines.
///
/// Returns an empty string when the clause is nothing but headers.
#[must_use]
pub fn strip_headers(text: &str) -> String {
    text.lines()
        .filter(|line| !header_line_regex().is_match(line) && !caps_title_regex().is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// The first [`EXCERPT_CHARS`] characters of `text`, trimmed.
#[must_use]
pub fn excerpt(text: &str) -> String {
    let end = text
        .char_indices()
        .nth(EXCERPT_CHARS)
        .map_or(text.len(), |(i, _)| i);
    text[..end].trim().to_string()
}

impl Document {
    /// Party names, searched across the whole document.
    #[must_use]
    pub fn parties(&self) -> Parties {
        Parties::find(&self.full_text())
    }

    /// Extract `field` from the clause named `clause`.
    ///
    /// Always returns a human-readable answer; a missing clause or value is
    /// reported in the text rather than as an error.
    #[must_use]
    pub fn field(&self, clause: &str, field: &Field) -> String {
        let Some(text) = self.clause(clause) else {
            return format!("Clause '{clause}' not found in document.");
        };

        match field {
            Field::Duration => word_duration_regex()
                .find(text)
                .or_else(|| numeric_duration_regex().find(text))
                .map_or_else(
                    || "Duration not explicitly stated.".to_string(),
                    |m| m.as_str().trim().to_string(),
                ),
            Field::Scope => {
                if let Some(m) = radius_regex().find(text) {
                    m.as_str().trim().to_string()
                } else if let Some(m) = state_regex().find(text) {
                    format!("Geographic scope: {}", m.as_str().trim())
                } else {
                    "Scope details not found.".to_string()
                }
            }
            Field::Amount => amount_regex().find(text).map_or_else(
                || "No monetary amount found.".to_string(),
                |m| m.as_str().trim().to_string(),
            ),
            Field::Parties => {
                let parties = self.parties();
                if parties.is_empty() {
                    "Parties not found.".to_string()
                } else {
                    parties.to_string()
                }
            }
            Field::Definition => sentences(text)
                .into_iter()
                .find(|s| s.split_whitespace().count() > DEFINITION_MIN_WORDS)
                .map_or_else(|| excerpt(text), |s| s.trim().to_string()),
            Field::Other(_) => excerpt(text),
        }
    }
}

//! Built-in sensitive-data patterns.
//!
//! These catch personal and financial details that party-name substitution
//! alone would leave in a clause summary.

use regex::Regex;

/// A compiled privacy filter pattern.
#[derive(Debug)]
pub struct FilterPattern {
    /// Name of the pattern for identification.
    pub name: &'static str,

    /// Description of what this pattern matches.
    pub description: &'static str,

    /// The compiled regex.
    regex: Regex,
}

impl FilterPattern {
    /// Create a new filter pattern.
    ///
    /// # Panics
    ///
    /// Panics if the regex pattern is invalid.
    #[must_use]
    pub fn new(name: &'static str, description: &'static str, pattern: &str) -> Self {
        Self {
            name,
            description,
            regex: Regex::new(pattern).expect("Invalid regex pattern"),
        }
    }

    /// Check if the content matches this pattern.
    #[must_use]
    pub fn matches(&self, content: &str) -> bool {
        self.regex.is_match(content)
    }

    /// Redact matches in the content, replacing them with a placeholder.
    #[must_use]
    pub fn redact(&self, content: &str, placeholder: &str) -> String {
        self.regex
            .replace_all(content, regex::NoExpand(placeholder))
            .to_string()
    }
}

/// Get all built-in filter patterns.
#[must_use]
pub fn builtin_patterns() -> Vec<FilterPattern> {
    vec![
        FilterPattern::new(
            "email",
            "Email addresses",
            r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b",
        ),
        FilterPattern::new(
            "phone_number",
            "North American phone numbers",
            r"(?:\+1[\s.-]?)?\(?\b\d{3}\)?[\s.-]\d{3}[\s.-]\d{4}\b",
        ),
        FilterPattern::new("ssn", "US Social Security Numbers", r"\b\d{3}-\d{2}-\d{4}\b"),
        FilterPattern::new(
            "ein",
            "US Employer Identification Numbers",
            r"\b\d{2}-\d{7}\b",
        ),
        FilterPattern::new(
            "street_address",
            "Street addresses (number, name, street suffix)",
            r"\b\d{1,6}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Court|Ct|Place|Pl)\b\.?",
        ),
        FilterPattern::new(
            "credit_card",
            "Credit card numbers (Visa, MasterCard, Amex, Discover)",
            r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b",
        ),
        FilterPattern::new(
            "iban",
            "International bank account numbers",
            r"\b[A-Z]{2}\d{2}(?:\s?[A-Z0-9]{4}){3,7}\b",
        ),
        FilterPattern::new(
            "bank_account",
            "Labelled bank account or routing numbers",
            r"(?i)(account|routing)\s*(number|no\.?|#)?\s*[:#]?\s*\d{6,17}",
        ),
    ]
}

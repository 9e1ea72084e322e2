//! Sensitive-data filter applied to text bound for the cloud.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::patterns::{builtin_patterns, FilterPattern};

/// Result of filtering content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterResult {
    /// Content passed all filters unchanged.
    Passed,

    /// Content must not leave the device at all.
    Blocked {
        /// Name of the pattern that caused the block.
        pattern_name: String,
    },

    /// Content was redacted (sensitive parts replaced).
    Redacted {
        /// The redacted content.
        content: String,

        /// Patterns that were redacted.
        redacted_patterns: Vec<String>,
    },
}

impl FilterResult {
    /// The text that may be sent on, given the original `content`.
    ///
    /// Returns `None` when the content was blocked.
    #[must_use]
    pub fn into_text(self, content: &str) -> Option<String> {
        match self {
            Self::Passed => Some(content.to_string()),
            Self::Redacted { content, .. } => Some(content),
            Self::Blocked { .. } => None,
        }
    }
}

/// Mode of operation for the privacy filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Block content that contains sensitive data.
    Block,

    /// Redact sensitive data from content.
    #[default]
    Redact,

    /// Only log warnings, don't filter.
    WarnOnly,
}

/// Configuration for the privacy filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Whether filtering is enabled.
    pub enabled: bool,

    /// Filter mode.
    pub mode: FilterMode,

    /// Whether to use built-in patterns.
    pub use_builtin_patterns: bool,

    /// Custom regex patterns to filter.
    pub custom_patterns: Vec<String>,

    /// Placeholder text for redacted content.
    pub redaction_placeholder: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: FilterMode::Redact,
            use_builtin_patterns: true,
            custom_patterns: Vec::new(),
            redaction_placeholder: "[REDACTED]".to_string(),
        }
    }
}

/// Privacy filter for outbound text.
#[derive(Debug)]
pub struct PrivacyFilter {
    config: FilterConfig,
    patterns: Vec<FilterPattern>,
    custom_regexes: Vec<Regex>,
}

impl PrivacyFilter {
    /// Create a new privacy filter with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(FilterConfig::default())
    }

    /// Create a new privacy filter with custom configuration.
    ///
    /// Invalid custom patterns are logged and skipped.
    #[must_use]
    pub fn with_config(config: FilterConfig) -> Self {
        let patterns = if config.use_builtin_patterns {
            builtin_patterns()
        } else {
            Vec::new()
        };

        let custom_regexes = config
            .custom_patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(r) => Some(r),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "Invalid custom regex pattern");
                    None
                }
            })
            .collect();

        Self {
            config,
            patterns,
            custom_regexes,
        }
    }

    /// Check if filtering is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The configured mode.
    #[must_use]
    pub fn mode(&self) -> FilterMode {
        self.config.mode
    }

    /// Filter content and return the result.
    #[must_use]
    pub fn filter(&self, content: &str) -> FilterResult {
        if !self.config.enabled {
            return FilterResult::Passed;
        }

        match self.config.mode {
            FilterMode::Block => self.filter_block(content),
            FilterMode::Redact => self.filter_redact(content),
            FilterMode::WarnOnly => self.filter_warn(content),
        }
    }

    /// Block mode: return Blocked if any pattern matches.
    fn filter_block(&self, content: &str) -> FilterResult {
        for pattern in &self.patterns {
            if pattern.matches(content) {
                debug!(pattern = %pattern.name, "Outbound text blocked by pattern");
                return FilterResult::Blocked {
                    pattern_name: pattern.name.to_string(),
                };
            }
        }

        for (i, regex) in self.custom_regexes.iter().enumerate() {
            if regex.is_match(content) {
                debug!(pattern_index = %i, "Outbound text blocked by custom pattern");
                return FilterResult::Blocked {
                    pattern_name: format!("custom_{i}"),
                };
            }
        }

        FilterResult::Passed
    }

    /// Redact mode: replace matches with placeholder.
    fn filter_redact(&self, content: &str) -> FilterResult {
        let placeholder = self.config.redaction_placeholder.as_str();
        let mut result = content.to_string();
        let mut redacted_patterns = Vec::new();

        for pattern in &self.patterns {
            if pattern.matches(&result) {
                result = pattern.redact(&result, placeholder);
                redacted_patterns.push(pattern.name.to_string());
                trace!(pattern = %pattern.name, "Outbound text redacted by pattern");
            }
        }

        for (i, regex) in self.custom_regexes.iter().enumerate() {
            if regex.is_match(&result) {
                result = regex
                    .replace_all(&result, regex::NoExpand(placeholder))
                    .to_string();
                redacted_patterns.push(format!("custom_{i}"));
                trace!(pattern_index = %i, "Outbound text redacted by custom pattern");
            }
        }

        if redacted_patterns.is_empty() {
            FilterResult::Passed
        } else {
            FilterResult::Redacted {
                content: result,
                redacted_patterns,
            }
        }
    }

    /// Warn mode: log warnings but pass content through.
    fn filter_warn(&self, content: &str) -> FilterResult {
        for pattern in &self.patterns {
            if pattern.matches(content) {
                warn!(
                    pattern = %pattern.name,
                    description = %pattern.description,
                    "Sensitive data in outbound text (warn mode)"
                );
            }
        }

        for (i, regex) in self.custom_regexes.iter().enumerate() {
            if regex.is_match(content) {
                warn!(
                    pattern_index = %i,
                    "Sensitive data in outbound text matched custom pattern (warn mode)"
                );
            }
        }

        FilterResult::Passed
    }
}

impl Default for PrivacyFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_config_default() {
        let config = FilterConfig::default();
        assert!(config.enabled);
        assert_eq!(config.mode, FilterMode::Redact);
        assert!(config.use_builtin_patterns);
        assert!(config.custom_patterns.is_empty());
        assert_eq!(config.redaction_placeholder, "[REDACTED]");
    }

    #[test]
    fn test_filter_disabled() {
        let filter = PrivacyFilter::with_config(FilterConfig {
            enabled: false,
            ..Default::default()
        });

        assert!(!filter.is_enabled());
        assert_eq!(filter.filter("SSN 123-45-6789"), FilterResult::Passed);
    }

    #[test]
    fn test_redact_mode_redacts() {
        let filter = PrivacyFilter::new();

        let result = filter.filter("Write to legal@example.com or call 415-555-0134.");
        let FilterResult::Redacted {
            content,
            redacted_patterns,
        } = result
        else {
            panic!("Expected Redacted result");
        };
        assert_eq!(content, "Write to [REDACTED] or call [REDACTED].");
        assert_eq!(redacted_patterns, vec!["email", "phone_number"]);
    }

    #[test]
    fn test_redact_mode_passes_clean_text() {
        let filter = PrivacyFilter::new();
        assert_eq!(
            filter.filter("Party B shall not compete for 24 months."),
            FilterResult::Passed
        );
    }

    #[test]
    fn test_block_mode() {
        let filter = PrivacyFilter::with_config(FilterConfig {
            mode: FilterMode::Block,
            ..Default::default()
        });

        let result = filter.filter("SSN: 123-45-6789");
        assert_eq!(
            result,
            FilterResult::Blocked {
                pattern_name: "ssn".to_string()
            }
        );
    }

    #[test]
    fn test_warn_mode_passes() {
        let filter = PrivacyFilter::with_config(FilterConfig {
            mode: FilterMode::WarnOnly,
            ..Default::default()
        });

        assert_eq!(filter.filter("SSN: 123-45-6789"), FilterResult::Passed);
    }

    #[test]
    fn test_custom_patterns() {
        let filter = PrivacyFilter::with_config(FilterConfig {
            custom_patterns: vec![r"\bProject Falcon\b".to_string()],
            ..Default::default()
        });

        let result = filter.filter("All details of Project Falcon are confidential.");
        assert_eq!(
            result.into_text("unused"),
            Some("All details of [REDACTED] are confidential.".to_string())
        );
    }

    #[test]
    fn test_custom_patterns_invalid_regex() {
        let filter = PrivacyFilter::with_config(FilterConfig {
            custom_patterns: vec![r"\bvalid\b".to_string(), r"[invalid".to_string()],
            ..Default::default()
        });

        assert_eq!(filter.custom_regexes.len(), 1);
    }

    #[test]
    fn test_without_builtin_patterns() {
        let filter = PrivacyFilter::with_config(FilterConfig {
            use_builtin_patterns: false,
            ..Default::default()
        });

        assert_eq!(filter.filter("SSN: 123-45-6789"), FilterResult::Passed);
    }

    #[test]
    fn test_into_text() {
        assert_eq!(
            FilterResult::Passed.into_text("same"),
            Some("same".to_string())
        );
        assert_eq!(
            FilterResult::Blocked {
                pattern_name: "ssn".to_string()
            }
            .into_text("secret"),
            None
        );
    }
}

//! NDA tool schemas and their on-device execution.
//!
//! Device tools are answered entirely from the loaded document. Cloud tools
//! only prepare an anonymized context for the cloud model to elaborate on.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::clause::{title_case, ClauseKey};
use crate::document::{excerpt, sentences, strip_headers, Document, Field};
use crate::privacy::{Anonymizer, ClauseSummary};
use crate::routing::FunctionCall;

/// A summary sentence needs more than this many words.
const SUMMARY_MIN_WORDS: usize = 8;

/// Sentences kept by `summarize_clause`.
const SUMMARY_SENTENCES: usize = 2;

/// The tools a model may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// Names of the parties.
    ExtractParties,
    /// A single field from a clause.
    GetClauseInfo,
    /// A short summary of a clause.
    SummarizeClause,
    /// Legal enforceability in a jurisdiction.
    CheckEnforceability,
    /// Comparison against market norms.
    BenchmarkClause,
}

impl Tool {
    /// Every tool, in the order offered to models.
    pub const ALL: [Tool; 5] = [
        Self::ExtractParties,
        Self::GetClauseInfo,
        Self::SummarizeClause,
        Self::CheckEnforceability,
        Self::BenchmarkClause,
    ];

    /// The tool's function name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ExtractParties => "extract_parties",
            Self::GetClauseInfo => "get_clause_info",
            Self::SummarizeClause => "summarize_clause",
            Self::CheckEnforceability => "check_enforceability",
            Self::BenchmarkClause => "benchmark_clause",
        }
    }

    /// Look up a tool by function name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Whether answering needs external legal or market knowledge.
    #[must_use]
    pub fn requires_cloud(self) -> bool {
        matches!(self, Self::CheckEnforceability | Self::BenchmarkClause)
    }

    /// The JSON-schema description handed to models.
    #[must_use]
    pub fn spec(self) -> ToolSpec {
        let clause_names = "Clause name: non_compete | confidentiality | ip_assignment | \
                            indemnification | liability_cap | term | governing_law";
        match self {
            Self::ExtractParties => ToolSpec::new(
                self,
                "Extract the full legal names of all parties to this NDA",
                &[],
            ),
            Self::GetClauseInfo => ToolSpec::new(
                self,
                "Retrieve specific information from a named clause (duration, scope, amount, etc.)",
                &[
                    ("clause_type", clause_names, true),
                    (
                        "field",
                        "Field to extract: duration | scope | amount | parties | definition",
                        false,
                    ),
                ],
            ),
            Self::SummarizeClause => ToolSpec::new(
                self,
                "Produce a brief summary of a named clause",
                &[("clause_type", "Clause name to summarize", true)],
            ),
            Self::CheckEnforceability => ToolSpec::new(
                self,
                "Assess whether a clause is legally enforceable in a jurisdiction; \
                 requires external legal knowledge",
                &[
                    ("clause_type", "Clause to assess enforceability for", true),
                    ("jurisdiction", "e.g. California, New York, Texas", true),
                ],
            ),
            Self::BenchmarkClause => ToolSpec::new(
                self,
                "Compare a clause to market standards: is it unusually broad, narrow, or standard?",
                &[("clause_type", "Clause to benchmark against market norms", true)],
            ),
        }
    }

    /// Specs for every tool.
    #[must_use]
    pub fn specs() -> Vec<ToolSpec> {
        Self::ALL.into_iter().map(Self::spec).collect()
    }
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// JSON-schema description of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    /// Function name.
    pub name: &'static str,
    /// What the tool does.
    pub description: &'static str,
    /// Parameter schema.
    pub parameters: ParameterSchema,
}

/// The `parameters` object of a tool schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterSchema {
    /// Always `object`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// Parameters by name.
    pub properties: BTreeMap<&'static str, Property>,
    /// Names of required parameters.
    pub required: Vec<&'static str>,
}

/// One tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    /// JSON type, always `string` for NDA tools.
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// What the parameter means.
    pub description: &'static str,
}

impl ToolSpec {
    fn new(
        tool: Tool,
        description: &'static str,
        params: &[(&'static str, &'static str, bool)],
    ) -> Self {
        Self {
            name: tool.name(),
            description,
            parameters: ParameterSchema {
                kind: "object",
                properties: params
                    .iter()
                    .map(|&(name, description, _)| {
                        (
                            name,
                            Property {
                                kind: "string",
                                description,
                            },
                        )
                    })
                    .collect(),
                required: params
                    .iter()
                    .filter(|(_, _, required)| *required)
                    .map(|&(name, _, _)| name)
                    .collect(),
            },
        }
    }
}

/// Result of executing a tool on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// A finished answer.
    Answer(String),
    /// Anonymized context for the cloud model to elaborate on.
    CloudContext(String),
}

impl ToolOutput {
    /// The text, whichever kind it is.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::CloudContext(text) => text,
        }
    }
}

/// Execute `call` against `document`.
///
/// Never fails: unknown tools and bad arguments come back as answers that
/// describe the problem.
#[must_use]
pub fn execute(call: &FunctionCall, document: &Document, anonymizer: &Anonymizer) -> ToolOutput {
    let Some(tool) = call.tool() else {
        return ToolOutput::Answer(format!("Unknown tool: {}", call.name));
    };
    debug!(tool = %tool, args = ?call.arguments, "Executing tool");

    match tool {
        Tool::ExtractParties => ToolOutput::Answer(extract_parties(document)),
        Tool::GetClauseInfo => ToolOutput::Answer(match call.arg("clause_type") {
            Some(clause) => {
                document.field(clause, &Field::parse(call.arg("field").unwrap_or_default()))
            }
            None => clause_type_required(),
        }),
        Tool::SummarizeClause => ToolOutput::Answer(match call.arg("clause_type") {
            Some(clause) => summarize(document, clause),
            None => clause_type_required(),
        }),
        Tool::CheckEnforceability | Tool::BenchmarkClause => {
            let Some(clause) = call.arg("clause_type") else {
                return ToolOutput::Answer(clause_type_required());
            };
            let jurisdiction = match tool {
                Tool::CheckEnforceability => call.arg("jurisdiction"),
                _ => None,
            };
            cloud_context(document, anonymizer, clause, jurisdiction)
        }
    }
}

/// Count whitespace-separated words.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn clause_type_required() -> String {
    "Error: clause_type is required.".to_string()
}

fn extract_parties(document: &Document) -> String {
    let parties = document.parties();
    if parties.is_empty() {
        "Could not extract party names from document.".to_string()
    } else {
        parties.to_string()
    }
}

fn summarize(document: &Document, clause: &str) -> String {
    let Some(text) = document.clause(clause) else {
        return format!("Clause '{clause}' not found in document.");
    };

    let body = strip_headers(text);
    let picked: Vec<String> = sentences(&body)
        .into_iter()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| word_count(s) > SUMMARY_MIN_WORDS)
        .take(SUMMARY_SENTENCES)
        .collect();

    if picked.is_empty() {
        excerpt(text)
    } else {
        picked.join(" ")
    }
}

fn cloud_context(
    document: &Document,
    anonymizer: &Anonymizer,
    clause: &str,
    jurisdiction: Option<&str>,
) -> ToolOutput {
    match anonymizer.clause_summary(document, clause) {
        ClauseSummary::Missing => ToolOutput::Answer(format!("Clause '{clause}' not found.")),
        ClauseSummary::Blocked { pattern_name } => ToolOutput::Answer(format!(
            "Clause '{clause}' was kept on this device: it matched the '{pattern_name}' privacy pattern."
        )),
        ClauseSummary::Ready(summary) => {
            let mut context = format!("Clause type: {clause}\n");
            if let Some(jurisdiction) = jurisdiction {
                context.push_str(&format!("Jurisdiction: {jurisdiction}\n"));
            }
            context.push_str(&format!("Clause summary (anonymized): {summary}"));
            ToolOutput::CloudContext(context)
        }
    }
}

fn clause_label(call: &FunctionCall) -> String {
    ClauseKey::normalize(call.arg("clause_type").unwrap_or_default()).label()
}

/// Turn a raw tool result into the answer shown to the user.
#[must_use]
pub fn format_answer(call: &FunctionCall, raw: &str) -> String {
    match call.tool() {
        Some(Tool::GetClauseInfo) => {
            let clause = clause_label(call);
            match call.arg("field") {
                Some(field) => format!("{} of {clause} clause: {raw}", title_case(field)),
                None => format!("{clause} clause: {raw}"),
            }
        }
        Some(Tool::SummarizeClause) => {
            let clause = clause_label(call);
            format!("{clause} Clause Summary: {raw}")
        }
        _ => raw.to_string(),
    }
}

//! Report serialization.
//!
//! Supports three output formats:
//! - JSON: the full [`ProjectReport`], pretty-printed
//! - CSV: one row per function for spreadsheets
//! - SARIF: complexity hot spots and unparseable files for IDE/CI integration
//!
//! Rendering is a pure function of the report: the same report and options
//! always produce the same bytes.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::{FileMetric, FileStatus, ProjectReport};
use crate::error::{Error, Result};

/// Cognitive complexity above which a function is reported in SARIF output.
pub const DEFAULT_SARIF_THRESHOLD: u32 = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Csv,
    Sarif,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Csv => "csv",
            Format::Sarif => "sarif",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "sarif" => Ok(Format::Sarif),
            other => Err(Error::config(format!(
                "invalid format {:?}, must be 'json', 'csv', or 'sarif'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub sarif_threshold: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sarif_threshold: DEFAULT_SARIF_THRESHOLD,
        }
    }
}

pub fn render(report: &ProjectReport, format: Format, options: &ExportOptions) -> Result<String> {
    match format {
        Format::Json => render_json(report),
        Format::Csv => Ok(render_csv(report)),
        Format::Sarif => render_sarif(report, options),
    }
}

pub fn write(
    report: &ProjectReport,
    format: Format,
    options: &ExportOptions,
    out: &mut impl Write,
) -> Result<()> {
    let text = render(report, format, options)?;
    out.write_all(text.as_bytes())
        .and_then(|_| out.flush())
        .map_err(|e| Error::Export(format!("failed to write {} report: {}", format, e)))
}

// =============================================================================
// JSON
// =============================================================================

fn render_json(report: &ProjectReport) -> Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}

// =============================================================================
// CSV
// =============================================================================

const CSV_HEADER: &[&str] = &[
    "path",
    "language",
    "status",
    "function",
    "kind",
    "start_line",
    "end_line",
    "cyclomatic",
    "cognitive",
    "nesting_depth",
    "logical_lines",
    "physical_lines",
    "exits",
    "parameters",
    "halstead_volume",
    "maintainability_index",
    "abc_magnitude",
];

fn render_csv(report: &ProjectReport) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));

    for file in &report.files {
        let prefix = [file.path.clone(), file.language.clone(), file.status.as_str().to_string()];
        if file.functions.is_empty() {
            let blanks = std::iter::repeat(String::new()).take(CSV_HEADER.len() - prefix.len());
            push_row(&mut out, prefix.into_iter().chain(blanks));
            continue;
        }
        for f in &file.functions {
            let cells = [
                f.name.clone(),
                f.kind.as_str().to_string(),
                f.start_line.to_string(),
                f.end_line.to_string(),
                f.cyclomatic.to_string(),
                f.cognitive.to_string(),
                f.nesting_depth.to_string(),
                f.logical_lines.to_string(),
                f.physical_lines.to_string(),
                f.exits.to_string(),
                f.parameters.to_string(),
                format!("{:.2}", f.halstead.volume),
                format!("{:.2}", f.maintainability_index.visual_studio),
                format!("{:.2}", f.abc.magnitude),
            ];
            push_row(&mut out, prefix.iter().cloned().chain(cells));
        }
    }
    out
}

fn push_row(out: &mut String, cells: impl Iterator<Item = String>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_field(&cell));
    }
    out.push('\n');
}

fn csv_field(value: &str) -> String {
    if value.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// SARIF
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "mehen";
const INFO_URI: &str = "https://github.com/mehen-rs/mehen";

const RULE_COMPLEXITY: &str = "high-cognitive-complexity";
const RULE_PARSE_FAILURE: &str = "parse-failure";
const RULE_SYNTAX_ERROR: &str = "syntax-error";

#[derive(Serialize, Deserialize)]
struct SarifReport {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize, Deserialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize, Deserialize)]
struct SarifDriver {
    name: String,
    version: String,
    #[serde(rename = "informationUri")]
    information_uri: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize, Deserialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "fullDescription", skip_serializing_if = "Option::is_none")]
    full_description: Option<SarifMessage>,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
}

#[derive(Serialize, Deserialize)]
struct SarifRuleConfig {
    level: String,
}

#[derive(Serialize, Deserialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize, Deserialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize, Deserialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize, Deserialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize, Deserialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
    #[serde(rename = "startColumn", skip_serializing_if = "Option::is_none")]
    start_column: Option<usize>,
    #[serde(rename = "endLine", skip_serializing_if = "Option::is_none")]
    end_line: Option<usize>,
}

struct RuleInfo {
    id: &'static str,
    name: &'static str,
    short_description: &'static str,
    full_description: &'static str,
    default_level: &'static str,
}

/// Sorted by id.
const RULES: &[RuleInfo] = &[
    RuleInfo {
        id: RULE_COMPLEXITY,
        name: "HighCognitiveComplexity",
        short_description: "Function is hard to understand",
        full_description: "The function's cognitive complexity exceeds the configured threshold. Deeply nested branches, long boolean chains and early exits all add to it.",
        default_level: "warning",
    },
    RuleInfo {
        id: RULE_PARSE_FAILURE,
        name: "ParseFailure",
        short_description: "File could not be analyzed",
        full_description: "The file was not measured: its language is unknown, it is not valid UTF-8 text, or it could not be read or parsed.",
        default_level: "error",
    },
    RuleInfo {
        id: RULE_SYNTAX_ERROR,
        name: "SyntaxError",
        short_description: "File contains syntax errors",
        full_description: "The parser recovered from syntax errors. Metrics were computed for the rest of the file and may be incomplete.",
        default_level: "warning",
    },
];

fn rule_level(id: &str) -> &'static str {
    RULES
        .iter()
        .find(|r| r.id == id)
        .map(|r| r.default_level)
        .unwrap_or("warning")
}

fn sarif_result(rule_id: &str, text: String, uri: &str, region: SarifRegion) -> SarifResult {
    SarifResult {
        rule_id: rule_id.to_string(),
        level: rule_level(rule_id).to_string(),
        message: SarifMessage { text },
        locations: vec![SarifLocation {
            physical_location: SarifPhysicalLocation {
                artifact_location: SarifArtifact {
                    uri: uri.to_string(),
                },
                region,
            },
        }],
    }
}

fn file_results(file: &FileMetric, threshold: u32, results: &mut Vec<SarifResult>) {
    match file.status {
        FileStatus::Failed => results.push(sarif_result(
            RULE_PARSE_FAILURE,
            file.error.clone().unwrap_or_else(|| "file could not be analyzed".to_string()),
            &file.path,
            SarifRegion {
                start_line: 1,
                start_column: None,
                end_line: None,
            },
        )),
        FileStatus::Partial => {
            let (line, column) = file
                .syntax_errors
                .first()
                .map(|e| (e.line, Some(e.column)))
                .unwrap_or((1, None));
            results.push(sarif_result(
                RULE_SYNTAX_ERROR,
                file.error
                    .clone()
                    .unwrap_or_else(|| format!("{} syntax error(s)", file.syntax_errors.len())),
                &file.path,
                SarifRegion {
                    start_line: line.max(1),
                    start_column: column,
                    end_line: None,
                },
            ));
        }
        FileStatus::Ok => {}
    }

    for f in file.functions.iter().filter(|f| f.cognitive > threshold) {
        results.push(sarif_result(
            RULE_COMPLEXITY,
            format!(
                "{} '{}' has cognitive complexity {} (threshold {}), cyclomatic {}",
                f.kind.as_str(),
                f.name,
                f.cognitive,
                threshold,
                f.cyclomatic
            ),
            &file.path,
            SarifRegion {
                start_line: f.start_line.max(1),
                start_column: Some(f.start_column.max(1)),
                end_line: Some(f.end_line.max(1)),
            },
        ));
    }
}

fn render_sarif(report: &ProjectReport, options: &ExportOptions) -> Result<String> {
    let rules = RULES
        .iter()
        .map(|info| SarifRule {
            id: info.id.to_string(),
            name: info.name.to_string(),
            short_description: SarifMessage {
                text: info.short_description.to_string(),
            },
            full_description: Some(SarifMessage {
                text: info.full_description.to_string(),
            }),
            default_config: SarifRuleConfig {
                level: info.default_level.to_string(),
            },
        })
        .collect();

    let mut results = Vec::new();
    for file in &report.files {
        file_results(file, options.sarif_threshold, &mut results);
    }

    let sarif = SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: report.tool_version.clone(),
                    information_uri: INFO_URI.to_string(),
                    rules,
                },
            },
            results,
        }],
    };

    let mut json = serde_json::to_string_pretty(&sarif)?;
    json.push('\n');
    Ok(json)
}

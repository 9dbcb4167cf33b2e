//! Roll-up of per-function metrics into file and project reports.
//!
//! The [`Aggregator`] keys files by path and computes every derived value in
//! [`Aggregator::finish`] while iterating in path order. Adding files in any
//! order, or merging partial aggregators from different workers, therefore
//! yields the same report.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Error;
use crate::langs::LanguageId;
use crate::metrics::{ClassMetric, FileLines, FileMeasurement, FunctionMetric, Nom, UnitKind};
use crate::parser::SyntaxError;

/// Version of the report layout; bumped on incompatible changes.
pub const SCHEMA_VERSION: &str = "1.1";

pub const UNKNOWN_LANGUAGE: &str = "unknown";

const CYCLOMATIC_BUCKETS: &[(u32, u32, &str)] = &[
    (1, 5, "1-5"),
    (6, 10, "6-10"),
    (11, 20, "11-20"),
    (21, 50, "21-50"),
    (51, u32::MAX, "51+"),
];

const COGNITIVE_BUCKETS: &[(u32, u32, &str)] = &[
    (0, 0, "0"),
    (1, 5, "1-5"),
    (6, 10, "6-10"),
    (11, 20, "11-20"),
    (21, 50, "21-50"),
    (51, u32::MAX, "51+"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Parsed without syntax errors.
    Ok,
    /// Parsed with recovered syntax errors; metrics cover the rest.
    Partial,
    /// Not measured at all.
    Failed,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Ok => "ok",
            FileStatus::Partial => "partial",
            FileStatus::Failed => "failed",
        }
    }
}

/// Sum, mean and maximum of an integer metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub sum: u64,
    pub average: f64,
    pub max: u32,
}

impl Stat {
    fn from_values(values: impl Iterator<Item = u32>) -> Self {
        let mut sum = 0u64;
        let mut max = 0u32;
        let mut count = 0usize;
        for v in values {
            sum += u64::from(v);
            max = max.max(v);
            count += 1;
        }
        Self {
            sum,
            average: mean(sum as f64, count),
            max,
        }
    }
}

fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileTotals {
    pub functions: usize,
    pub lines: FileLines,
    pub cyclomatic: Stat,
    pub cognitive: Stat,
    pub max_nesting_depth: u32,
    pub halstead_volume: f64,
    /// Mean Visual Studio maintainability index (0..=100) of the functions.
    pub maintainability_index: f64,
    #[serde(default)]
    pub nom: Nom,
    /// Sum of the WMC of the file's classes.
    #[serde(default)]
    pub wmc: u64,
    /// Sum of the ABC magnitudes of the functions.
    #[serde(default)]
    pub abc_magnitude: f64,
}

impl FileTotals {
    fn from_parts(functions: &[FunctionMetric], lines: FileLines, classes: &[ClassMetric]) -> Self {
        Self {
            functions: functions.len(),
            lines,
            cyclomatic: Stat::from_values(functions.iter().map(|f| f.cyclomatic)),
            cognitive: Stat::from_values(functions.iter().map(|f| f.cognitive)),
            max_nesting_depth: functions.iter().map(|f| f.nesting_depth).max().unwrap_or(0),
            halstead_volume: functions.iter().map(|f| f.halstead.volume).sum(),
            maintainability_index: mean(
                functions.iter().map(|f| f.maintainability_index.visual_studio).sum(),
                functions.len(),
            ),
            nom: Nom::from_functions(functions),
            wmc: classes.iter().map(|c| u64::from(c.wmc)).sum(),
            abc_magnitude: functions.iter().map(|f| f.abc.magnitude).sum(),
        }
    }
}

/// The report entry for one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetric {
    /// Path with `/` separators, relative to the root it was found under.
    pub path: String,
    pub language: String,
    pub status: FileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub syntax_errors: Vec<SyntaxError>,
    #[serde(default)]
    pub functions: Vec<FunctionMetric>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<ClassMetric>,
    #[serde(default)]
    pub file_totals: FileTotals,
}

impl FileMetric {
    /// A measured file; syntax errors make it `partial`.
    pub fn measured(
        path: impl Into<String>,
        language: LanguageId,
        measurement: FileMeasurement,
        syntax_errors: Vec<SyntaxError>,
    ) -> Self {
        let (status, error) = match syntax_errors.first() {
            None => (FileStatus::Ok, None),
            Some(first) => (
                FileStatus::Partial,
                Some(
                    Error::SyntaxRecovery {
                        count: syntax_errors.len(),
                        line: first.line,
                    }
                    .to_string(),
                ),
            ),
        };
        let file_totals = FileTotals::from_parts(
            &measurement.functions,
            measurement.lines,
            &measurement.classes,
        );
        Self {
            path: path.into(),
            language: language.name().to_string(),
            status,
            error,
            syntax_errors,
            functions: measurement.functions,
            classes: measurement.classes,
            file_totals,
        }
    }

    /// A file that produced no metrics.
    pub fn failed(path: impl Into<String>, language: Option<LanguageId>, error: &Error) -> Self {
        Self {
            path: path.into(),
            language: language
                .map(|l| l.name())
                .unwrap_or(UNKNOWN_LANGUAGE)
                .to_string(),
            status: FileStatus::Failed,
            error: Some(error.to_string()),
            syntax_errors: Vec::new(),
            functions: Vec::new(),
            classes: Vec::new(),
            file_totals: FileTotals::default(),
        }
    }
}

/// One entry of the worst-offender list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offender {
    pub path: String,
    pub language: String,
    pub name: String,
    pub kind: UnitKind,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub cyclomatic: u32,
    pub cognitive: u32,
    pub nesting_depth: u32,
}

impl Offender {
    fn new(file: &FileMetric, f: &FunctionMetric) -> Self {
        Self {
            path: file.path.clone(),
            language: file.language.clone(),
            name: f.name.clone(),
            kind: f.kind,
            start_line: f.start_line,
            start_column: f.start_column,
            end_line: f.end_line,
            cyclomatic: f.cyclomatic,
            cognitive: f.cognitive,
            nesting_depth: f.nesting_depth,
        }
    }

    /// Total order: `Less` means `self` is the worse offender.
    fn rank(&self, other: &Self) -> Ordering {
        other
            .cognitive
            .cmp(&self.cognitive)
            .then_with(|| self.path.cmp(&other.path))
            .then_with(|| self.start_line.cmp(&other.start_line))
            .then_with(|| self.start_column.cmp(&other.start_column))
            .then_with(|| self.name.cmp(&other.name))
    }
}

struct Ranked(Offender);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.0.rank(&other.0) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank(&other.0)
    }
}

/// Bounded selection of the N worst functions by cognitive complexity.
///
/// The heap's top is the mildest entry kept, so it is the one evicted when a
/// worse function arrives.
pub struct TopOffenders {
    limit: usize,
    heap: BinaryHeap<Ranked>,
}

impl TopOffenders {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            heap: BinaryHeap::with_capacity(limit.saturating_add(1).min(1024)),
        }
    }

    pub fn offer(&mut self, offender: Offender) {
        if self.limit == 0 {
            return;
        }
        if self.heap.len() == self.limit {
            if let Some(mildest) = self.heap.peek() {
                if offender.rank(&mildest.0) != Ordering::Less {
                    return;
                }
            }
        }
        self.heap.push(Ranked(offender));
        if self.heap.len() > self.limit {
            self.heap.pop();
        }
    }

    /// Worst first.
    pub fn into_sorted(self) -> Vec<Offender> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub range: String,
    pub count: usize,
}

fn distribution(values: &[u32], buckets: &[(u32, u32, &str)]) -> Vec<Bucket> {
    buckets
        .iter()
        .map(|(lo, hi, label)| Bucket {
            range: label.to_string(),
            count: values.iter().filter(|v| (*lo..=*hi).contains(*v)).count(),
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageSummary {
    pub files: usize,
    pub functions: usize,
    pub code_lines: usize,
    pub cyclomatic: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTotals {
    pub files: usize,
    pub files_ok: usize,
    pub files_partial: usize,
    pub files_failed: usize,
    pub functions: usize,
    pub lines: FileLines,
    pub cyclomatic: Stat,
    pub cognitive: Stat,
    pub max_nesting_depth: u32,
    pub halstead_volume: f64,
    pub maintainability_index: f64,
    #[serde(default)]
    pub nom: Nom,
    #[serde(default)]
    pub classes: usize,
    #[serde(default)]
    pub wmc: u64,
    #[serde(default)]
    pub abc_magnitude: f64,
    pub cyclomatic_distribution: Vec<Bucket>,
    pub cognitive_distribution: Vec<Bucket>,
    pub languages: BTreeMap<String, LanguageSummary>,
}

/// The complete, externally consumed result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub schema_version: String,
    pub tool_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    pub files: Vec<FileMetric>,
    pub project_totals: ProjectTotals,
    #[serde(default)]
    pub top_offenders: Vec<Offender>,
    /// Unknown-language files skipped by configuration.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

/// Run-level facts that are not derived from the files.
#[derive(Debug, Clone, Default)]
pub struct ReportMeta {
    pub generated_at: Option<String>,
    pub cancelled: bool,
}

/// Order-independent accumulator of file results.
#[derive(Debug, Default)]
pub struct Aggregator {
    top_n: usize,
    files: BTreeMap<String, FileMetric>,
    skipped: BTreeSet<String>,
}

impl Aggregator {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn add(&mut self, file: FileMetric) {
        if self.files.contains_key(&file.path) {
            warn!(path = %file.path, "duplicate result ignored");
            return;
        }
        self.files.insert(file.path.clone(), file);
    }

    pub fn skip(&mut self, path: impl Into<String>) {
        self.skipped.insert(path.into());
    }

    pub fn merge(&mut self, other: Aggregator) {
        for file in other.files.into_values() {
            self.add(file);
        }
        self.skipped.extend(other.skipped);
    }

    pub fn finish(self, meta: ReportMeta) -> ProjectReport {
        let mut totals = ProjectTotals::default();
        let mut offenders = TopOffenders::new(self.top_n);
        let mut cyclomatic = Vec::new();
        let mut cognitive = Vec::new();
        let mut nesting = Vec::new();
        let mut maintainability = 0.0;

        for file in self.files.values() {
            totals.files += 1;
            match file.status {
                FileStatus::Ok => totals.files_ok += 1,
                FileStatus::Partial => totals.files_partial += 1,
                FileStatus::Failed => totals.files_failed += 1,
            }

            let lines = &file.file_totals.lines;
            totals.lines.total += lines.total;
            totals.lines.code += lines.code;
            totals.lines.comment += lines.comment;
            totals.lines.blank += lines.blank;
            totals.lines.logical += lines.logical;

            let summary = totals.languages.entry(file.language.clone()).or_default();
            summary.files += 1;
            summary.functions += file.functions.len();
            summary.code_lines += lines.code;
            summary.cyclomatic += file.file_totals.cyclomatic.sum;

            totals.nom.add(file.file_totals.nom);
            totals.classes += file.classes.len();
            totals.wmc += file.file_totals.wmc;
            totals.abc_magnitude += file.file_totals.abc_magnitude;

            for f in &file.functions {
                totals.functions += 1;
                cyclomatic.push(f.cyclomatic);
                cognitive.push(f.cognitive);
                nesting.push(f.nesting_depth);
                totals.halstead_volume += f.halstead.volume;
                maintainability += f.maintainability_index.visual_studio;
                offenders.offer(Offender::new(file, f));
            }
        }

        totals.cyclomatic = Stat::from_values(cyclomatic.iter().copied());
        totals.cognitive = Stat::from_values(cognitive.iter().copied());
        totals.max_nesting_depth = nesting.into_iter().max().unwrap_or(0);
        totals.maintainability_index = mean(maintainability, totals.functions);
        totals.cyclomatic_distribution = distribution(&cyclomatic, CYCLOMATIC_BUCKETS);
        totals.cognitive_distribution = distribution(&cognitive, COGNITIVE_BUCKETS);

        ProjectReport {
            schema_version: SCHEMA_VERSION.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: meta.generated_at,
            cancelled: meta.cancelled,
            files: self.files.into_values().collect(),
            project_totals: totals,
            top_offenders: offenders.into_sorted(),
            skipped: self.skipped.into_iter().collect(),
        }
    }
}

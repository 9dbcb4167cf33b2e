//! Comparison of two JSON reports.
//!
//! Each metric has a polarity saying whether growth is an improvement.
//! Metric selectors may override it: `+name` marks higher as better and
//! `-name` marks lower as better.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{FileMetric, ProjectReport, ProjectTotals, SCHEMA_VERSION};
use crate::error::{Error, Result};

const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum DiffFormat {
    #[default]
    Text,
    Markdown,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    LowerIsBetter,
    HigherIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Better,
    Worse,
    Same,
}

impl Trend {
    fn of(delta: f64, polarity: Polarity) -> Self {
        if delta.abs() <= EPSILON {
            return Trend::Same;
        }
        match (delta > 0.0, polarity) {
            (true, Polarity::HigherIsBetter) | (false, Polarity::LowerIsBetter) => Trend::Better,
            _ => Trend::Worse,
        }
    }

    fn emoji(&self) -> &'static str {
        match self {
            Trend::Better => "\u{1F7E2}",
            Trend::Worse => "\u{1F534}",
            Trend::Same => "\u{26AA}",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cyclomatic,
    Cognitive,
    Functions,
    Closures,
    LogicalLines,
    HalsteadVolume,
    Maintainability,
    Wmc,
    Abc,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Cyclomatic,
        Metric::Cognitive,
        Metric::Functions,
        Metric::Closures,
        Metric::LogicalLines,
        Metric::HalsteadVolume,
        Metric::Maintainability,
        Metric::Wmc,
        Metric::Abc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Cyclomatic => "cyclomatic",
            Metric::Cognitive => "cognitive",
            Metric::Functions => "functions",
            Metric::Closures => "closures",
            Metric::LogicalLines => "logical_lines",
            Metric::HalsteadVolume => "halstead_volume",
            Metric::Maintainability => "maintainability",
            Metric::Wmc => "wmc",
            Metric::Abc => "abc",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.name().eq_ignore_ascii_case(name))
    }

    /// Only maintainability improves as it grows.
    pub fn default_polarity(&self) -> Polarity {
        match self {
            Metric::Maintainability => Polarity::HigherIsBetter,
            _ => Polarity::LowerIsBetter,
        }
    }

    fn of_file(&self, file: &FileMetric) -> f64 {
        let t = &file.file_totals;
        match self {
            Metric::Cyclomatic => t.cyclomatic.sum as f64,
            Metric::Cognitive => t.cognitive.sum as f64,
            Metric::Functions => t.functions as f64,
            Metric::Closures => t.nom.closures as f64,
            Metric::LogicalLines => t.lines.logical as f64,
            Metric::HalsteadVolume => t.halstead_volume,
            Metric::Maintainability => t.maintainability_index,
            Metric::Wmc => t.wmc as f64,
            Metric::Abc => t.abc_magnitude,
        }
    }

    fn of_project(&self, t: &ProjectTotals) -> f64 {
        match self {
            Metric::Cyclomatic => t.cyclomatic.sum as f64,
            Metric::Cognitive => t.cognitive.sum as f64,
            Metric::Functions => t.functions as f64,
            Metric::Closures => t.nom.closures as f64,
            Metric::LogicalLines => t.lines.logical as f64,
            Metric::HalsteadVolume => t.halstead_volume,
            Metric::Maintainability => t.maintainability_index,
            Metric::Wmc => t.wmc as f64,
            Metric::Abc => t.abc_magnitude,
        }
    }
}

/// A selected metric and the direction that counts as an improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub metric: Metric,
    pub polarity: Polarity,
}

impl From<Metric> for MetricSpec {
    fn from(metric: Metric) -> Self {
        Self {
            metric,
            polarity: metric.default_polarity(),
        }
    }
}

impl FromStr for MetricSpec {
    type Err = Error;

    /// `cognitive`, `+functions` or `-maintainability`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (polarity, name) = if let Some(rest) = s.strip_prefix('+') {
            (Some(Polarity::HigherIsBetter), rest)
        } else if let Some(rest) = s.strip_prefix('-') {
            (Some(Polarity::LowerIsBetter), rest)
        } else {
            (None, s)
        };
        let metric = Metric::from_name(name).ok_or_else(|| {
            let known: Vec<&str> = Metric::ALL.iter().map(|m| m.name()).collect();
            Error::config(format!(
                "unknown metric {:?}, must be one of {}",
                name,
                known.join(", ")
            ))
        })?;
        Ok(Self {
            metric,
            polarity: polarity.unwrap_or_else(|| metric.default_polarity()),
        })
    }
}

/// `value_parser` for `--metric`.
pub fn parse_metric_spec(s: &str) -> std::result::Result<MetricSpec, String> {
    s.parse().map_err(|e: Error| e.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricDelta {
    pub metric: Metric,
    pub polarity: Polarity,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
    pub trend: Trend,
}

impl MetricDelta {
    fn new(spec: MetricSpec, before: f64, after: f64) -> Self {
        let delta = after - before;
        Self {
            metric: spec.metric,
            polarity: spec.polarity,
            before,
            after,
            delta,
            trend: Trend::of(delta, spec.polarity),
        }
    }

    fn changed(&self) -> bool {
        self.delta.abs() > EPSILON
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDiff {
    pub path: String,
    pub deltas: Vec<MetricDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDiff {
    /// Compared metrics, in column order.
    pub metrics: Vec<Metric>,
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub changed_files: Vec<FileDiff>,
    pub totals: Vec<MetricDelta>,
}

impl ReportDiff {
    pub fn is_empty(&self) -> bool {
        self.new_files.is_empty()
            && self.deleted_files.is_empty()
            && self.changed_files.is_empty()
    }
}

/// Read a JSON report written by `mehen --format json`.
pub fn load_report(path: &Path) -> Result<ProjectReport> {
    let content = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let report: ProjectReport = serde_json::from_str(&content).map_err(|e| {
        Error::config(format!("{} is not a mehen JSON report: {}", path.display(), e))
    })?;
    let major = |v: &str| v.split('.').next().map(str::to_string);
    if major(&report.schema_version) != major(SCHEMA_VERSION) {
        return Err(Error::config(format!(
            "{}: unsupported schema version {} (expected {})",
            path.display(),
            report.schema_version,
            SCHEMA_VERSION
        )));
    }
    Ok(report)
}

/// Compare reports file by file. An empty metric list selects all metrics;
/// when a metric is named twice the last polarity wins.
pub fn diff(baseline: &ProjectReport, current: &ProjectReport, metrics: &[MetricSpec]) -> ReportDiff {
    let selected: Vec<MetricSpec> = if metrics.is_empty() {
        Metric::ALL.into_iter().map(MetricSpec::from).collect()
    } else {
        let by_metric: BTreeMap<Metric, Polarity> =
            metrics.iter().map(|s| (s.metric, s.polarity)).collect();
        by_metric
            .into_iter()
            .map(|(metric, polarity)| MetricSpec { metric, polarity })
            .collect()
    };

    let before: BTreeMap<&str, &FileMetric> =
        baseline.files.iter().map(|f| (f.path.as_str(), f)).collect();
    let after: BTreeMap<&str, &FileMetric> =
        current.files.iter().map(|f| (f.path.as_str(), f)).collect();

    let new_files = after
        .keys()
        .filter(|p| !before.contains_key(*p))
        .map(|p| p.to_string())
        .collect();
    let deleted_files = before
        .keys()
        .filter(|p| !after.contains_key(*p))
        .map(|p| p.to_string())
        .collect();

    let mut changed_files = Vec::new();
    for (path, old) in &before {
        let Some(new) = after.get(path) else {
            continue;
        };
        let deltas: Vec<MetricDelta> = selected
            .iter()
            .map(|s| MetricDelta::new(*s, s.metric.of_file(old), s.metric.of_file(new)))
            .filter(MetricDelta::changed)
            .collect();
        if !deltas.is_empty() {
            changed_files.push(FileDiff {
                path: path.to_string(),
                deltas,
            });
        }
    }

    let totals = selected
        .iter()
        .map(|s| {
            MetricDelta::new(
                *s,
                s.metric.of_project(&baseline.project_totals),
                s.metric.of_project(&current.project_totals),
            )
        })
        .collect();

    ReportDiff {
        metrics: selected.iter().map(|s| s.metric).collect(),
        new_files,
        deleted_files,
        changed_files,
        totals,
    }
}

pub fn render_json(diff: &ReportDiff) -> Result<String> {
    let mut json = serde_json::to_string_pretty(diff)?;
    json.push('\n');
    Ok(json)
}

pub fn render_text(diff: &ReportDiff) -> String {
    let mut out = String::new();

    if diff.is_empty() {
        let _ = writeln!(out, "  {}", "No changes".green());
    }

    if !diff.new_files.is_empty() {
        let _ = writeln!(out, "  {} ({}):", "New files".bold(), diff.new_files.len());
        for path in &diff.new_files {
            let _ = writeln!(out, "    {} {}", "+".green(), path.blue());
        }
        out.push('\n');
    }

    if !diff.deleted_files.is_empty() {
        let _ = writeln!(out, "  {} ({}):", "Deleted files".bold(), diff.deleted_files.len());
        for path in &diff.deleted_files {
            let _ = writeln!(out, "    {} {}", "-".red(), path.blue());
        }
        out.push('\n');
    }

    if !diff.changed_files.is_empty() {
        let _ = writeln!(out, "  {} ({}):", "Changed files".bold(), diff.changed_files.len());
        for file in &diff.changed_files {
            let _ = writeln!(out, "    {}", file.path.blue());
            for delta in &file.deltas {
                write_delta(&mut out, delta, 6);
            }
        }
        out.push('\n');
    }

    let _ = writeln!(out, "  {}", "Totals:".bold());
    for delta in &diff.totals {
        write_delta(&mut out, delta, 4);
    }
    out
}

fn write_delta(out: &mut String, delta: &MetricDelta, indent: usize) {
    let sign = if delta.delta > 0.0 { "+" } else { "" };
    let change = format!("({}{})", sign, number(delta.delta));
    let change = match delta.trend {
        Trend::Same => change.dimmed(),
        Trend::Worse => change.red(),
        Trend::Better => change.green(),
    };
    let _ = writeln!(
        out,
        "{:indent$}{:<18}{:>10} -> {:<10} {}",
        "",
        delta.metric.name(),
        number(delta.before),
        number(delta.after),
        change,
        indent = indent
    );
}

/// GitHub-flavored markdown: one row per changed file, one column per metric.
///
/// A changed cell reads `after (<from>: before)` with a trend marker.
pub fn render_markdown(diff: &ReportDiff, from: &str, to: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## mehen summary (`{}`..`{}`)\n", from, to);

    if diff.is_empty() && diff.totals.iter().all(|t| t.trend == Trend::Same) {
        out.push_str("No metric changes detected.\n");
        return out;
    }

    out.push_str("| File |");
    for metric in &diff.metrics {
        let _ = write!(out, " {} |", metric.name());
    }
    out.push_str("\n|---|");
    for _ in &diff.metrics {
        out.push_str("---:|");
    }
    out.push('\n');

    for file in &diff.changed_files {
        let _ = write!(out, "| {} |", markdown_cell(&file.path));
        for metric in &diff.metrics {
            match file.deltas.iter().find(|d| d.metric == *metric) {
                Some(delta) => {
                    let _ = write!(out, " {} |", markdown_delta(delta, from));
                }
                None => {
                    let _ = write!(out, " {} |", Trend::Same.emoji());
                }
            }
        }
        out.push('\n');
    }
    for (paths, marker) in [(&diff.new_files, "\u{1F195}"), (&diff.deleted_files, "deleted")] {
        for path in paths {
            let _ = write!(out, "| {} ({}) |", markdown_cell(path), marker);
            out.push_str(&" |".repeat(diff.metrics.len()));
            out.push('\n');
        }
    }

    out.push_str("| **Total** |");
    for delta in &diff.totals {
        let _ = write!(out, " {} |", markdown_delta(delta, from));
    }
    out.push('\n');
    out
}

fn markdown_delta(delta: &MetricDelta, from: &str) -> String {
    if delta.trend == Trend::Same {
        return format!("{} {}", number(delta.after), Trend::Same.emoji());
    }
    format!(
        "{} ({}: {}) {}",
        number(delta.after),
        markdown_cell(from),
        number(delta.before),
        delta.trend.emoji()
    )
}

fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn number(value: f64) -> String {
    if (value - value.round()).abs() < EPSILON {
        format!("{}", value.round() as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::{file, function};
    use crate::aggregate::{Aggregator, ReportMeta};
    use tempfile::TempDir;

    fn report(files: Vec<FileMetric>) -> ProjectReport {
        let mut agg = Aggregator::new(5);
        for f in files {
            agg.add(f);
        }
        agg.finish(ReportMeta::default())
    }

    fn pair() -> (ProjectReport, ProjectReport) {
        let baseline = report(vec![
            file("a.go", vec![function("f", 1, 2, 1)]),
            file("old.go", vec![function("g", 1, 1, 0)]),
        ]);
        let current = report(vec![
            file("a.go", vec![function("f", 1, 5, 6)]),
            file("new.go", vec![function("h", 1, 1, 0)]),
        ]);
        (baseline, current)
    }

    #[test]
    fn test_new_deleted_changed() {
        let (baseline, current) = pair();
        let d = diff(&baseline, &current, &[]);
        assert_eq!(d.new_files, vec!["new.go"]);
        assert_eq!(d.deleted_files, vec!["old.go"]);
        assert_eq!(d.changed_files.len(), 1);

        let a = &d.changed_files[0];
        assert_eq!(a.path, "a.go");
        let cyclomatic = a.deltas.iter().find(|x| x.metric == Metric::Cyclomatic).unwrap();
        assert_eq!((cyclomatic.before, cyclomatic.after, cyclomatic.delta), (2.0, 5.0, 3.0));
        assert!(
            a.deltas.iter().all(|x| x.metric != Metric::Functions),
            "unchanged metrics are not listed"
        );
    }

    #[test]
    fn test_metric_selection() {
        let (baseline, current) = pair();
        let specs = [MetricSpec::from(Metric::Cognitive), MetricSpec::from(Metric::Cognitive)];
        let d = diff(&baseline, &current, &specs);
        assert_eq!(d.metrics, vec![Metric::Cognitive]);
        assert_eq!(d.totals.len(), 1);
        assert_eq!(d.totals[0].metric, Metric::Cognitive);
        assert_eq!(d.totals[0].trend, Trend::Worse);
        assert_eq!(d.changed_files[0].deltas.len(), 1);
    }

    #[test]
    fn test_metric_spec_parsing() {
        let plain: MetricSpec = "cognitive".parse().unwrap();
        assert_eq!(plain.polarity, Polarity::LowerIsBetter);

        let up: MetricSpec = "+functions".parse().unwrap();
        assert_eq!((up.metric, up.polarity), (Metric::Functions, Polarity::HigherIsBetter));

        let down: MetricSpec = "-maintainability".parse().unwrap();
        assert_eq!(down.polarity, Polarity::LowerIsBetter);
        assert_eq!(
            "maintainability".parse::<MetricSpec>().unwrap().polarity,
            Polarity::HigherIsBetter
        );

        assert!("+".parse::<MetricSpec>().is_err());
        let err = parse_metric_spec("npm").unwrap_err();
        assert!(err.contains("unknown metric"), "{}", err);
    }

    #[test]
    fn test_polarity_override_flips_trend() {
        let (baseline, current) = pair();
        let cognitive = diff(&baseline, &current, &["cognitive".parse::<MetricSpec>().unwrap()]);
        assert_eq!(cognitive.totals[0].trend, Trend::Worse);

        let specs: Vec<MetricSpec> = ["-cognitive", "+cognitive"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        let flipped = diff(&baseline, &current, &specs);
        assert_eq!(flipped.totals.len(), 1);
        assert_eq!(flipped.totals[0].polarity, Polarity::HigherIsBetter);
        assert_eq!(flipped.totals[0].trend, Trend::Better);
    }

    #[test]
    fn test_identical_reports() {
        let (baseline, _) = pair();
        let d = diff(&baseline, &baseline, &[]);
        assert!(d.is_empty());
        assert!(d.totals.iter().all(|t| t.delta == 0.0));
        assert!(render_text(&d).contains("No changes"));
    }

    #[test]
    fn test_render_json() {
        let (baseline, current) = pair();
        let json = render_json(&diff(&baseline, &current, &[Metric::LogicalLines.into()])).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["totals"][0]["metric"], "logical_lines");
        assert_eq!(value["totals"][0]["polarity"], "lower_is_better");
        assert_eq!(value["totals"][0]["trend"], "same");
        assert_eq!(value["new_files"][0], "new.go");
    }

    #[test]
    fn test_render_text_lists_sections() {
        let (baseline, current) = pair();
        let text = render_text(&diff(&baseline, &current, &[]));
        assert!(text.contains("New files"));
        assert!(text.contains("old.go"));
        assert!(text.contains("cyclomatic"));
    }

    #[test]
    fn test_render_markdown_table() {
        let (baseline, mut current) = pair();
        current.files[0].path = "a|b.go".to_string();
        let specs: [MetricSpec; 2] = [Metric::Cyclomatic.into(), Metric::Maintainability.into()];
        let md = render_markdown(&diff(&baseline, &current, &specs), "main", "HEAD");
        let lines: Vec<&str> = md.lines().collect();

        assert_eq!(lines[0], "## mehen summary (`main`..`HEAD`)");
        assert_eq!(lines[2], "| File | cyclomatic | maintainability |");
        assert_eq!(lines[3], "|---|---:|---:|");
        assert!(md.contains("| a\\|b.go (\u{1F195}) | | |"), "{}", md);
        assert!(md.contains("| old.go (deleted) | | |"), "{}", md);
        let total = lines.iter().find(|l| l.starts_with("| **Total**")).unwrap();
        // 5 + 1 after, 2 + 1 before
        assert!(total.contains("6 (main: 3) \u{1F534}"), "{}", total);
    }

    #[test]
    fn test_render_markdown_no_changes() {
        let (baseline, _) = pair();
        let md = render_markdown(&diff(&baseline, &baseline, &[]), "a.json", "a.json");
        assert!(md.ends_with("No metric changes detected.\n"));
    }

    #[test]
    fn test_load_report_validates() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.json");
        let (baseline, _) = pair();
        fs::write(&good, serde_json::to_string(&baseline).unwrap()).unwrap();
        assert_eq!(load_report(&good).unwrap(), baseline);

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{\"hello\": 1}").unwrap();
        assert!(matches!(load_report(&bad), Err(Error::Configuration(_))));

        let mut future = baseline.clone();
        future.schema_version = "2.0".to_string();
        let newer = dir.path().join("newer.json");
        fs::write(&newer, serde_json::to_string(&future).unwrap()).unwrap();
        assert!(load_report(&newer).is_err());
    }

    #[test]
    fn test_number_format() {
        assert_eq!(number(3.0), "3");
        assert_eq!(number(-2.0), "-2");
        assert_eq!(number(1.256), "1.26");
    }
}

//! Command-line interface for mehen.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use crate::config::Config;
use crate::diff::{self, DiffFormat, MetricSpec};
use crate::error::Error;
use crate::langs::LanguageRegistry;
use crate::report::{self, Format};
use crate::runner::{discover, CancelToken, Filters, RunOptions, Runner};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;
/// Second Ctrl-C while a run is winding down.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for a library error that ends a command.
///
/// Bad input (configuration, unreadable paths or reports) is a usage
/// failure; any other fatal error is internal.
pub fn exit_code(err: &Error) -> i32 {
    match err {
        Error::Configuration(_) => EXIT_FAILED,
        e if e.is_fatal() => EXIT_ERROR,
        _ => EXIT_FAILED,
    }
}

fn report_error(err: &Error) -> i32 {
    eprintln!("Error: {}", err);
    exit_code(err)
}

/// Source-code metrics for Go, Python, Rust and TypeScript.
///
/// Mehen parses every file with tree-sitter and reports per-function
/// cyclomatic and cognitive complexity, nesting depth, line counts,
/// Halstead measures and the maintainability index, rolled up per file and
/// per project.
#[derive(Parser, Debug)]
#[command(name = "mehen")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true, subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub analyze: AnalyzeArgs,

    /// More logging (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze files and directories (the default command)
    Analyze(AnalyzeArgs),
    /// Compare two JSON reports
    Diff(DiffArgs),
}

/// Arguments for analysis.
#[derive(Args, Debug, Clone, Default)]
pub struct AnalyzeArgs {
    /// Files or directories to analyze
    #[arg(value_name = "PATHS", required = true)]
    pub paths: Vec<PathBuf>,

    /// Language to analyze: go, python, rust, typescript or all (repeatable)
    #[arg(short, long = "lang", value_name = "LANG")]
    pub lang: Vec<String>,

    /// Glob of paths to leave out (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Only analyze paths matching a glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<Format>,

    /// Worker threads (default: number of CPUs)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Number of worst functions to list (default: 10)
    #[arg(long)]
    pub top: Option<usize>,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Path to config YAML file (default: auto-discover mehen.yaml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip files of unknown language instead of reporting them as failed
    #[arg(long)]
    pub skip_unknown: bool,

    /// Stop starting new files after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Leave the generation timestamp out of the report
    #[arg(long)]
    pub no_timestamp: bool,

    /// Cognitive complexity above which SARIF output reports a function
    #[arg(long, value_name = "N")]
    pub sarif_threshold: Option<u32>,
}

impl AnalyzeArgs {
    /// Flags override config values; lists are appended.
    pub fn apply(&self, config: &mut Config) {
        config.languages.extend(self.lang.iter().cloned());
        config.include.extend(self.include.iter().cloned());
        config.exclude.extend(self.exclude.iter().cloned());
        if self.format.is_some() {
            config.format = self.format;
        }
        if self.jobs.is_some() {
            config.jobs = self.jobs;
        }
        if self.top.is_some() {
            config.top = self.top;
        }
        if self.skip_unknown {
            config.skip_unknown = Some(true);
        }
        if self.timeout.is_some() {
            config.timeout_secs = self.timeout;
        }
        if self.no_timestamp {
            config.timestamp = Some(false);
        }
        if self.sarif_threshold.is_some() {
            config.sarif_threshold = self.sarif_threshold;
        }
    }
}

/// Arguments for the diff command.
#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
    /// Earlier JSON report
    pub baseline: PathBuf,

    /// Later JSON report
    pub current: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = DiffFormat::Text)]
    pub format: DiffFormat,

    /// Metric to compare (repeatable, default: all). Prefix with `+` when
    /// higher is better or `-` when lower is better.
    #[arg(short, long, value_parser = diff::parse_metric_spec, allow_hyphen_values = true)]
    pub metric: Vec<MetricSpec>,
}

/// Run an analysis.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir().context("cannot determine working directory")?;

    let mut config = match Config::load(args.config.as_deref(), &cwd) {
        Ok(c) => c,
        Err(e) => return Ok(report_error(&e)),
    };
    args.apply(&mut config);

    if let Err(e) = config.validate() {
        return Ok(report_error(&e));
    }

    let filters = Filters::from_config(&config)?;
    let discovery = match discover(&args.paths, &filters) {
        Ok(d) => d,
        Err(e) => return Ok(report_error(&e)),
    };
    if discovery.is_empty() {
        eprintln!("Error: no files matched");
        return Ok(EXIT_FAILED);
    }

    let registry = match config.language_filter().and_then(LanguageRegistry::load) {
        Ok(r) => r,
        Err(e) => return Ok(report_error(&e)),
    };

    let token = CancelToken::new();
    watch_interrupt(token.clone());
    let runner = Runner::new(registry, RunOptions::from_config(&config))
        .with_cancel_token(token)
        .with_progress(|finished, total| {
            if finished == total || finished % 500 == 0 {
                info!(finished, total, "progress");
            }
        });
    let report = match runner.run(&discovery) {
        Ok(r) => r,
        Err(e) => return Ok(report_error(&e)),
    };
    if report.cancelled {
        warn!(files = report.files.len(), "report is partial, run was cancelled");
    }

    let format = config.format();
    let options = config.export_options();
    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            report::write(&report, format, &options, &mut out)?;
            info!(path = %path.display(), %format, "report written");
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            report::write(&report, format, &options, &mut out)?;
        }
    }

    Ok(EXIT_SUCCESS)
}

/// Run the diff command.
pub fn run_diff(args: &DiffArgs) -> anyhow::Result<i32> {
    let baseline = match diff::load_report(&args.baseline) {
        Ok(r) => r,
        Err(e) => return Ok(report_error(&e)),
    };
    let current = match diff::load_report(&args.current) {
        Ok(r) => r,
        Err(e) => return Ok(report_error(&e)),
    };

    let result = diff::diff(&baseline, &current, &args.metric);
    let text = match args.format {
        DiffFormat::Text => format!(
            "\n  {} {} -> {}\n\n{}\n",
            "mehen diff".cyan().bold(),
            args.baseline.display(),
            args.current.display(),
            diff::render_text(&result)
        ),
        DiffFormat::Markdown => diff::render_markdown(
            &result,
            &args.baseline.display().to_string(),
            &args.current.display().to_string(),
        ),
        DiffFormat::Json => diff::render_json(&result)?,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(text.as_bytes())?;
    out.flush()?;
    Ok(EXIT_SUCCESS)
}

/// Cancel `token` on the first Ctrl-C: workers stop starting files and the
/// partial report is still written. A second Ctrl-C exits at once.
fn watch_interrupt(token: CancelToken) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            warn!(error = %e, "cannot install interrupt handler");
            return;
        }
    };
    let spawned = std::thread::Builder::new()
        .name("mehen-interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("interrupted, finishing files in flight");
                token.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(EXIT_INTERRUPTED);
                }
            });
        });
    if let Err(e) = spawned {
        warn!(error = %e, "cannot install interrupt handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Metric, Polarity};

    #[test]
    fn test_parse_default_analyze() {
        let cli = Cli::try_parse_from(["mehen", "src", "--lang", "go", "-l", "rust", "--top", "3"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.analyze.paths, vec![PathBuf::from("src")]);
        assert_eq!(cli.analyze.lang, vec!["go", "rust"]);
        assert_eq!(cli.analyze.top, Some(3));
    }

    #[test]
    fn test_parse_diff() {
        let cli = Cli::try_parse_from([
            "mehen", "diff", "a.json", "b.json", "--metric", "cognitive", "--metric", "logical_lines",
            "--metric", "-maintainability", "-f", "markdown",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Diff(args)) => {
                let metrics: Vec<(Metric, Polarity)> =
                    args.metric.iter().map(|s| (s.metric, s.polarity)).collect();
                assert_eq!(
                    metrics,
                    vec![
                        (Metric::Cognitive, Polarity::LowerIsBetter),
                        (Metric::LogicalLines, Polarity::LowerIsBetter),
                        (Metric::Maintainability, Polarity::LowerIsBetter),
                    ]
                );
                assert_eq!(args.format, DiffFormat::Markdown);
            }
            other => panic!("expected diff, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_format_rejected() {
        assert!(Cli::try_parse_from(["mehen", "src", "--format", "pretty"]).is_err());
        assert!(Cli::try_parse_from(["mehen"]).is_err(), "paths are required");
    }

    #[test]
    fn test_exit_codes_for_errors() {
        assert_eq!(exit_code(&Error::config("bad glob")), EXIT_FAILED);
        assert_eq!(
            exit_code(&Error::Io {
                path: PathBuf::from("missing.json"),
                source: io::Error::new(io::ErrorKind::NotFound, "gone"),
            }),
            EXIT_FAILED
        );
        assert_eq!(
            exit_code(&Error::GrammarLoad {
                language: "go".into(),
                reason: "abi".into()
            }),
            EXIT_ERROR
        );
        assert_eq!(exit_code(&Error::Internal("worker pool".into())), EXIT_ERROR);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::parse_str("languages: [go]\ntop: 5\ntimestamp: true\n").unwrap();
        let args = AnalyzeArgs {
            lang: vec!["python".to_string()],
            top: Some(7),
            no_timestamp: true,
            format: Some(Format::Csv),
            ..AnalyzeArgs::default()
        };
        args.apply(&mut config);
        assert_eq!(config.languages, vec!["go", "python"]);
        assert_eq!(config.top(), 7);
        assert!(!config.timestamp());
        assert_eq!(config.format(), Format::Csv);
    }
}

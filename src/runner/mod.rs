//! Run orchestration.
//!
//! A bounded rayon pool runs the whole per-file pipeline (read, classify,
//! parse, measure) for one file at a time per worker and sends the outcome
//! over a crossbeam channel. A single consumer thread owns the
//! [`Aggregator`]; workers share nothing mutable.

mod discover;
mod state;

pub use discover::{discover, Discovery, Filters, SourcePath, PRUNED_DIRS};
pub use state::FileState;

use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use rayon::prelude::*;
use tracing::{debug, debug_span, info, warn};

use crate::aggregate::{Aggregator, FileMetric, ProjectReport, ReportMeta};
use crate::config::{Config, DEFAULT_TOP};
use crate::error::{Error, Result};
use crate::langs::{classify, LanguageId, LanguageRegistry, SAMPLE_LEN};
use crate::metrics;
use crate::parser;

/// Shared cancellation flag.
///
/// Workers check it before starting a file; files already in flight finish.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub jobs: usize,
    pub top: usize,
    pub skip_unknown: bool,
    pub timeout: Option<Duration>,
    pub timestamp: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            top: DEFAULT_TOP,
            skip_unknown: false,
            timeout: None,
            timestamp: true,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            jobs: config.jobs(),
            top: config.top(),
            skip_unknown: config.skip_unknown(),
            timeout: config.timeout(),
            timestamp: config.timestamp(),
        }
    }
}

/// What a worker reports for one file.
#[derive(Debug)]
pub enum FileOutcome {
    Measured(FileMetric),
    Failed(FileMetric),
    /// Unknown language under `--skip-unknown`; listed in the report.
    Skipped(String),
    /// Language outside the `--lang` selection; not reported.
    Omitted(String),
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            FileOutcome::Measured(m) | FileOutcome::Failed(m) => &m.path,
            FileOutcome::Skipped(p) | FileOutcome::Omitted(p) => p,
        }
    }

    pub fn state(&self) -> FileState {
        match self {
            FileOutcome::Measured(_) => FileState::Measured,
            FileOutcome::Failed(_) => FileState::Failed,
            FileOutcome::Skipped(_) | FileOutcome::Omitted(_) => FileState::Skipped,
        }
    }
}

/// Progress callback: `(finished, total)` after each file's outcome is
/// collected. Runs on the aggregator thread.
pub type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

pub struct Runner {
    registry: LanguageRegistry,
    options: RunOptions,
    cancel: CancelToken,
    progress: Option<Arc<ProgressFn>>,
}

impl Runner {
    pub fn new(registry: LanguageRegistry, options: RunOptions) -> Self {
        Self {
            registry,
            options,
            cancel: CancelToken::new(),
            progress: None,
        }
    }

    /// Use an externally owned token, e.g. one wired to a signal handler.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Analyze every discovered file and build the project report.
    pub fn run(&self, discovery: &Discovery) -> Result<ProjectReport> {
        let jobs = self.options.jobs.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("mehen-worker-{}", i))
            .build()
            .map_err(|e| Error::Internal(format!("failed to start worker pool: {}", e)))?;

        let started = Instant::now();
        let deadline = self.options.timeout.map(|t| started + t);
        let (tx, rx) = crossbeam_channel::bounded::<FileOutcome>(jobs * 4);
        info!(files = discovery.len(), jobs, "analyzing");

        let collected = std::thread::scope(|scope| {
            let top = self.options.top;
            let progress = self.progress.as_deref();
            let consumer = scope.spawn(move || consume(rx, top, discovery, progress));

            pool.install(|| {
                discovery.files.par_iter().for_each_with(tx, |tx, file| {
                    if self.should_stop(deadline) {
                        return;
                    }
                    let outcome = self.process(file);
                    if tx.send(outcome).is_err() {
                        self.cancel.cancel();
                    }
                });
            });

            consumer.join()
        });
        let (aggregator, pending) =
            collected.map_err(|_| Error::Internal("aggregator thread panicked".to_string()))?;

        if pending > 0 {
            warn!(pending, "run cancelled before all files were analyzed");
        }
        info!(
            files = aggregator.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "analysis finished"
        );

        let generated_at = self
            .options
            .timestamp
            .then(|| chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        Ok(aggregator.finish(ReportMeta {
            generated_at,
            cancelled: pending > 0,
        }))
    }

    fn should_stop(&self, deadline: Option<Instant>) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        match deadline {
            Some(deadline) if Instant::now() >= deadline => {
                info!("timeout reached, cancelling remaining files");
                self.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Run the pipeline for one file. Never fails: every error becomes the
    /// file's outcome.
    fn process(&self, file: &SourcePath) -> FileOutcome {
        let _span = debug_span!("file", path = %file.display).entered();

        let bytes = match fs::read(&file.path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = Error::Io {
                    path: file.path.clone(),
                    source,
                };
                return failed(file, None, &err);
            }
        };

        let sample = &bytes[..bytes.len().min(SAMPLE_LEN)];
        let Some(language) = classify(&file.path, Some(sample)) else {
            if self.options.skip_unknown {
                debug!("unknown language, skipped");
                return FileOutcome::Skipped(file.display.clone());
            }
            let err = Error::UnknownLanguage {
                path: file.path.clone(),
            };
            return failed(file, None, &err);
        };
        if !self.registry.filter().includes(language) {
            debug!(%language, "language not selected");
            return FileOutcome::Omitted(file.display.clone());
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.analyze(file, language, bytes)
        }));
        match result {
            Ok(Ok(metric)) => FileOutcome::Measured(metric),
            Ok(Err(err)) => failed(file, Some(language), &err),
            Err(_) => {
                let err = Error::Internal("measurement panicked".to_string());
                failed(file, Some(language), &err)
            }
        }
    }

    fn analyze(&self, file: &SourcePath, language: LanguageId, bytes: Vec<u8>) -> Result<FileMetric> {
        let mut state = FileState::Discovered;
        state.advance(FileState::Classified)?;

        let lang = self.registry.get(language)?;
        let (source, encoding) = parser::decode(bytes)?;
        let tree = parser::parse(lang, &source)?;
        state.advance(FileState::Parsed)?;
        if let Some(recovered) = tree.recovery_error() {
            debug!(error = %recovered, "parsed with recovery");
        }

        let measurement = metrics::measure(&tree, &source, lang);
        state.advance(FileState::Measured)?;
        debug!(
            functions = measurement.functions.len(),
            ?encoding,
            "measured"
        );

        Ok(FileMetric::measured(
            file.display.clone(),
            language,
            measurement,
            tree.errors().to_vec(),
        ))
    }
}

fn failed(file: &SourcePath, language: Option<LanguageId>, err: &Error) -> FileOutcome {
    warn!(path = %file.display, error = %err, "file not measured");
    FileOutcome::Failed(FileMetric::failed(file.display.clone(), language, err))
}

/// Drain the channel into an aggregator. Returns it with the number of
/// discovered files that never reached a terminal state.
fn consume(
    rx: Receiver<FileOutcome>,
    top: usize,
    discovery: &Discovery,
    progress: Option<&ProgressFn>,
) -> (Aggregator, usize) {
    let mut aggregator = Aggregator::new(top);
    let mut ledger: BTreeMap<&str, FileState> = discovery
        .files
        .iter()
        .map(|f| (f.display.as_str(), FileState::Discovered))
        .collect();

    let total = discovery.len();
    let mut finished = 0;

    for outcome in rx {
        let path = outcome.path().to_string();
        let mut reached = outcome.state();
        match outcome {
            FileOutcome::Measured(metric) => {
                aggregator.add(metric);
                reached = FileState::Aggregated;
            }
            FileOutcome::Failed(metric) => aggregator.add(metric),
            FileOutcome::Skipped(path) => aggregator.skip(path),
            FileOutcome::Omitted(_) => {}
        }
        if let Some(state) = ledger.get_mut(path.as_str()) {
            if reached == FileState::Aggregated {
                if let Err(e) = state.advance(FileState::Measured) {
                    warn!(path = %path, error = %e, "unexpected outcome");
                }
            }
            if let Err(e) = state.advance(reached) {
                warn!(path = %path, error = %e, "unexpected outcome");
            }
        }

        finished += 1;
        if let Some(progress) = progress {
            progress(finished, total);
        }
    }

    let pending = ledger.values().filter(|s| !s.is_terminal()).count();
    (aggregator, pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::langs::LanguageFilter;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(
            root.join("main.go"),
            "package main\n\nfunc main() {\n\tif true {\n\t\tprintln(1)\n\t}\n}\n",
        )
        .unwrap();
        fs::write(root.join("util.py"), "def f(x):\n    return x * 2\n").unwrap();
        fs::write(root.join("lib.rs"), "fn g() -> u8 {\n    1\n}\n").unwrap();
        fs::write(root.join("broken.ts"), "function h( {\n  return 1;\n").unwrap();
        dir
    }

    fn runner(options: RunOptions) -> Runner {
        Runner::new(LanguageRegistry::load(LanguageFilter::all()).unwrap(), options)
    }

    fn no_timestamp(jobs: usize) -> RunOptions {
        RunOptions {
            jobs,
            timestamp: false,
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_run_measures_every_file() {
        let dir = project();
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();
        let report = runner(no_timestamp(2)).run(&discovery).unwrap();

        assert!(!report.cancelled);
        assert_eq!(report.files.len(), 4);
        assert_eq!(report.project_totals.files_ok, 3);
        let broken = report.files.iter().find(|f| f.path.ends_with("broken.ts")).unwrap();
        assert_ne!(broken.status, crate::aggregate::FileStatus::Ok);
        assert!(report.generated_at.is_none());
    }

    #[test]
    fn test_worker_count_does_not_change_report() {
        let dir = project();
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();
        let one = runner(no_timestamp(1)).run(&discovery).unwrap();
        let many = runner(no_timestamp(4)).run(&discovery).unwrap();
        assert_eq!(one, many);
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = project();
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();
        let runner = runner(no_timestamp(2));
        runner.cancel_token().cancel();

        let report = runner.run(&discovery).unwrap();
        assert!(report.cancelled);
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_cancelled_mid_run_keeps_completed_files() {
        let dir = TempDir::new().unwrap();
        for i in 0..40 {
            fs::write(
                dir.path().join(format!("f{:02}.py", i)),
                "def f(x):\n    if x:\n        return 1\n    return 0\n",
            )
            .unwrap();
        }
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();

        let runner = runner(no_timestamp(1));
        let token = runner.cancel_token();
        let runner = runner.with_progress(move |finished, _| {
            if finished == 2 {
                token.cancel();
            }
        });
        let report = runner.run(&discovery).unwrap();

        assert!(report.cancelled);
        assert!(report.files.len() >= 2, "files collected before cancelling are kept");
        assert!(report.files.len() < 40, "files not started are dropped");
        for file in &report.files {
            assert_eq!(file.status, crate::aggregate::FileStatus::Ok, "{}", file.path);
            assert_eq!(file.functions.len(), 1, "{}", file.path);
            assert_eq!(file.functions[0].cyclomatic, 2, "{}", file.path);
        }
        assert_eq!(report.project_totals.files, report.files.len());
    }

    #[test]
    fn test_progress_reports_every_file() {
        let dir = project();
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let runner = runner(no_timestamp(2)).with_progress(move |finished, total| {
            sink.lock().unwrap().push((finished, total));
        });

        runner.run(&discovery).unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn test_unknown_language_failed_or_skipped() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "plain text\n").unwrap();
        let discovery = discover(&[&notes], &Filters::default()).unwrap();

        let report = runner(no_timestamp(1)).run(&discovery).unwrap();
        assert_eq!(report.files.len(), 1);
        assert_eq!(report.files[0].language, "unknown");
        assert_eq!(report.files[0].status, crate::aggregate::FileStatus::Failed);

        let options = RunOptions {
            skip_unknown: true,
            ..no_timestamp(1)
        };
        let report = runner(options).run(&discovery).unwrap();
        assert!(report.files.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_timestamp_present_by_default() {
        let dir = project();
        let discovery = discover(&[dir.path()], &Filters::default()).unwrap();
        let report = runner(RunOptions::default()).run(&discovery).unwrap();
        let stamp = report.generated_at.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok(), "{}", stamp);
    }
}

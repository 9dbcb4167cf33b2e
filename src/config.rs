//! Run configuration.
//!
//! A YAML file (auto-discovered as `mehen.yaml` or `.mehen.yaml`) supplies
//! defaults; command-line flags override scalar values and extend lists.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::langs::LanguageFilter;
use crate::report::{ExportOptions, Format, DEFAULT_SARIF_THRESHOLD};

/// Config file names searched for in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["mehen.yaml", ".mehen.yaml"];

pub const DEFAULT_TOP: usize = 10;

/// Upper bound on `jobs`; larger values are almost certainly typos.
const MAX_JOBS: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Languages to analyze: go, python, rust, typescript or all.
    #[serde(default)]
    pub languages: Vec<String>,
    /// When non-empty, only files matching one of these globs are analyzed.
    #[serde(default)]
    pub include: Vec<String>,
    /// Globs that drop files before they are read.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub jobs: Option<usize>,
    #[serde(default)]
    pub top: Option<usize>,
    #[serde(default)]
    pub format: Option<Format>,
    #[serde(default)]
    pub skip_unknown: Option<bool>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub sarif_threshold: Option<u32>,
    /// Whether reports carry a `generated_at` timestamp (default: true).
    #[serde(default)]
    pub timestamp: Option<bool>,
}

impl Config {
    pub fn parse_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| Error::config(format!("invalid config: {}", e)))
    }

    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Find a config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the explicit config file, or the discovered one, or defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match Self::discover(dir) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        debug!(path = %path.display(), "loading config");
        Self::parse_file(&path)
    }

    /// Check every value before any file is processed.
    pub fn validate(&self) -> Result<()> {
        self.language_filter()?;
        build_globset(&self.include)?;
        build_globset(&self.exclude)?;

        match self.jobs {
            Some(0) => return Err(Error::config("jobs must be at least 1")),
            Some(n) if n > MAX_JOBS => {
                return Err(Error::config(format!("jobs must be at most {}", MAX_JOBS)))
            }
            _ => {}
        }
        if self.timeout_secs == Some(0) {
            return Err(Error::config("timeout must be at least 1 second"));
        }
        Ok(())
    }

    pub fn language_filter(&self) -> Result<LanguageFilter> {
        LanguageFilter::parse(&self.languages)
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn top(&self) -> usize {
        self.top.unwrap_or(DEFAULT_TOP)
    }

    pub fn format(&self) -> Format {
        self.format.unwrap_or_default()
    }

    pub fn skip_unknown(&self) -> bool {
        self.skip_unknown.unwrap_or(false)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn timestamp(&self) -> bool {
        self.timestamp.unwrap_or(true)
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            sarif_threshold: self.sarif_threshold.unwrap_or(DEFAULT_SARIF_THRESHOLD),
        }
    }
}

/// Compile glob patterns; `**` matches across directories.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config(format!("invalid glob {:?}: {}", pattern, e)))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

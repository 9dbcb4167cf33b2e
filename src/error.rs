//! Error taxonomy for the analyzer.
//!
//! Configuration-time errors abort a run before any file is read. Per-file
//! errors are recorded on the file's entry in the report and never abort.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the analysis library.
#[derive(Error, Debug)]
pub enum Error {
    /// No supported language could be determined for the path.
    #[error("unknown language for {}", path.display())]
    UnknownLanguage { path: PathBuf },

    /// The grammar could not produce any tree (undecodable bytes, parser refusal).
    #[error("parse failure: {reason}")]
    ParseFailure { reason: String },

    /// A tree was produced but contains error-recovery nodes.
    #[error("{count} syntax error(s), first at line {line}")]
    SyntaxRecovery { count: usize, line: usize },

    /// Invalid configuration: bad glob, unsupported format, bad limits.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A grammar or one of its queries failed to load.
    #[error("failed to load {language} grammar: {reason}")]
    GrammarLoad { language: String, reason: String },

    /// I/O failure reading an input or writing a report.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization failure while exporting a report.
    #[error("export failed: {0}")]
    Export(String),

    /// A broken internal invariant: an illegal state transition or a
    /// panicked worker.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn parse_failure(reason: impl Into<String>) -> Self {
        Error::ParseFailure {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Whether this error must abort the whole run.
    ///
    /// Per-file errors (unknown language, parse failure, syntax recovery,
    /// reading an input) are content, not process errors.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_)
                | Error::GrammarLoad { .. }
                | Error::Export(_)
                | Error::Internal(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Export(e.to_string())
    }
}

impl From<globset::Error> for Error {
    fn from(e: globset::Error) -> Self {
        Error::Configuration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Mehen - source-code metrics for Go, Python, Rust and TypeScript.
//!
//! Every file is parsed with tree-sitter. Function-like units are found with
//! per-language queries, and their syntax is mapped onto a small set of
//! language-neutral constructs. The metric formulas run over those
//! constructs, so equivalent code scores the same in every language.
//!
//! # Architecture
//!
//! - `langs`: language identification and grammar descriptors
//! - `parser`: decoding and tree-sitter parsing with syntax-error collection
//! - `metrics`: complexity, Halstead, ABC, line, maintainability and
//!   class extractors
//! - `aggregate`: file and project roll-ups, top offenders
//! - `runner`: discovery and the parallel analysis pipeline
//! - `report`: JSON, CSV and SARIF output
//! - `diff`: comparison of two JSON reports
//! - `config`: YAML configuration
//!
//! # Adding a New Language
//!
//! Add a `LanguageSpec` under `src/langs/` that maps the grammar's node kinds
//! onto `Construct`s, then register it in `LanguageId`.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod langs;
pub mod metrics;
pub mod parser;
pub mod report;
pub mod runner;

pub use aggregate::{Aggregator, FileMetric, FileStatus, ProjectReport};
pub use config::Config;
pub use error::{Error, Result};
pub use langs::{LanguageFilter, LanguageId, LanguageRegistry};
pub use metrics::FunctionMetric;
pub use report::{ExportOptions, Format};
pub use runner::{discover, CancelToken, Filters, RunOptions, Runner};

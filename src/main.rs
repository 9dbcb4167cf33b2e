//! Mehen CLI entry point.

use clap::Parser;
use mehen::cli::{self, Cli, Commands, EXIT_ERROR, EXIT_FAILED, EXIT_SUCCESS};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version are not errors
            let code = if e.use_stderr() { EXIT_FAILED } else { EXIT_SUCCESS };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    init_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Diff(args)) => cli::run_diff(args),
        Some(Commands::Analyze(args)) => cli::run_analyze(args),
        None => cli::run_analyze(&cli.analyze),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

/// Logs go to stderr so reports on stdout stay machine-readable.
/// `RUST_LOG` takes precedence over the flags.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

//! CLI for the quarantine engine.
//!
//! The binary is the "caller" the library is designed around: it owns file
//! persistence and exit codes, while the engine itself only computes
//! rewritten content.
//!
//! ## Commands
//!
//! - `quarantine` - Inject skip guards for the given targets
//! - `unquarantine` - Remove previously injected guards
//! - `list` - Inventory the guards currently present under a root
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Quarantine flaky Go tests by injecting reversible runtime skip guards
#[derive(Parser, Debug)]
#[command(name = "skipjack")]
#[command(version = VERSION)]
#[command(about = "Quarantine flaky Go tests without deleting them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inject skip guards for the given targets
    Quarantine {
        /// Tracking identifier embedded in every guard (e.g. a ticket key)
        #[arg(long, value_name = "ID")]
        reason: String,

        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Remove previously injected guards for the given targets
    Unquarantine {
        #[command(flatten)]
        selection: Selection,

        #[command(flatten)]
        output: OutputOptions,
    },

    /// Inventory the guards currently present under a root
    List {
        /// Root directory containing one or more Go modules
        #[arg(long, value_name = "DIR", default_value = ".")]
        root: PathBuf,

        /// Build tags applied during file selection (repeatable)
        #[arg(long = "tag", value_name = "TAG")]
        tags: Vec<String>,

        /// Emit the inventory as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Which tests to operate on, shared by quarantine and unquarantine.
#[derive(clap::Args, Debug)]
pub struct Selection {
    /// Root directory containing one or more Go modules
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Build tags applied during file selection (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// JSON file holding an array of {package, tests} targets
    #[arg(long, value_name = "FILE")]
    pub targets_file: Option<PathBuf>,

    /// Targets in the form import/path:TestName[/subtest]
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,
}

/// How to present and persist results, shared by quarantine and unquarantine.
#[derive(clap::Args, Debug)]
pub struct OutputOptions {
    /// Report what would change without writing any file; exits 1 if
    /// anything would change
    #[arg(long)]
    pub check: bool,

    /// Print a unified diff of every modified file
    #[arg(long)]
    pub diff: bool,

    /// Emit the full report as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Command::Quarantine {
            reason,
            selection,
            output,
        } => commands::quarantine(&reason, &selection, &output),
        Command::Unquarantine { selection, output } => {
            commands::unquarantine(&selection, &output)
        }
        Command::List { root, tags, json } => commands::list(&root, tags, json),
    }
}

// ============================================================================
// Tests
// ============================================================================

// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `taskweave`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "taskweave",
    version,
    about = "Run lint/build/test/deploy tasks declared in a task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Identifier of the task to run (a key of `[task.<id>]`).
    #[arg(value_name = "TASK")]
    pub task: Option<String>,

    /// Path to the task file (TOML).
    ///
    /// Default: `TASKWEAVE_CONFIG`, or `Taskweave.toml` in the current
    /// working directory.
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// List all available task identifiers and exit.
    #[arg(long)]
    pub list: bool,

    /// JSON object used to expand `{{ ... }}` placeholders in commands.
    #[arg(long, value_name = "JSON")]
    pub data: Option<String>,

    /// Resolve the task and print its hook/child tree without executing.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit plain log lines instead of redrawing live status frames.
    #[arg(long)]
    pub plain: bool,

    /// Hide the rolling output tail under running tasks.
    #[arg(long, short)]
    pub quiet: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TASKWEAVE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every failure in taskweave is terminal for the top-level invocation; the
//! binary maps any error to exit code 1. The variants only exist so callers
//! (and tests) can tell configuration problems, command failures and
//! cancellation apart.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskweaveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {0}")]
    TaskCycle(String),

    #[error("Template error in '{task}': {message}")]
    Template { task: String, message: String },

    #[error("Task '{task}' failed (exit code {code})")]
    TaskFailed { task: String, code: i32 },

    #[error("Task '{0}' was cancelled")]
    Cancelled(String),

    #[error("Batch '{task}' failed: {failed} failed, {cancelled} cancelled")]
    BatchFailed {
        task: String,
        failed: usize,
        cancelled: usize,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskweaveError {
    /// Process exit status for this error. The core defines no code other
    /// than 1 for failures.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// True when the run stopped because of an external interrupt rather
    /// than a failing command or a bad configuration.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskweaveError::Cancelled(_))
    }

    /// True for errors detected before any command could run.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TaskweaveError::ConfigError(_)
                | TaskweaveError::TaskNotFound(_)
                | TaskweaveError::TaskCycle(_)
                | TaskweaveError::Template { .. }
                | TaskweaveError::TomlError(_)
        )
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, TaskweaveError>;

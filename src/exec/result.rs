// src/exec/result.rs

use std::time::Duration;

use crate::engine::TaskId;
use crate::errors::TaskweaveError;
use crate::exec::process::ProcessOutcome;

/// Outcome of one task execution.
///
/// Produced exactly once per execution and never mutated afterwards; all
/// fields are read through accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    id: TaskId,
    outcome: ProcessOutcome,
    output: String,
    error: Option<String>,
    elapsed: Duration,
}

impl TaskResult {
    /// Build a result from a classified process outcome.
    pub fn from_outcome(
        id: impl Into<TaskId>,
        outcome: ProcessOutcome,
        output: String,
        elapsed: Duration,
    ) -> Self {
        let error = match outcome {
            ProcessOutcome::Success => None,
            ProcessOutcome::Failed(code) => Some(format!("command exited with status {code}")),
            ProcessOutcome::Cancelled => Some("cancelled".to_string()),
        };
        Self {
            id: id.into(),
            outcome,
            output,
            error,
            elapsed,
        }
    }

    /// Build a result for an execution that ended in an engine error
    /// (spawn failure, nested task failure, template error).
    pub fn from_error(
        id: impl Into<TaskId>,
        err: &TaskweaveError,
        output: String,
        elapsed: Duration,
    ) -> Self {
        let outcome = match err {
            TaskweaveError::Cancelled(_) => ProcessOutcome::Cancelled,
            TaskweaveError::TaskFailed { code, .. } => ProcessOutcome::Failed(*code),
            _ => ProcessOutcome::Failed(-1),
        };
        Self {
            id: id.into(),
            outcome,
            output,
            error: Some(err.to_string()),
            elapsed,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn success(&self) -> bool {
        self.outcome == ProcessOutcome::Success
    }

    pub fn outcome(&self) -> ProcessOutcome {
        self.outcome
    }

    /// Combined stdout + stderr, one line per captured line.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Convert a non-successful result into the matching engine error.
    pub fn into_error(self) -> Option<TaskweaveError> {
        match self.outcome {
            ProcessOutcome::Success => None,
            ProcessOutcome::Failed(code) => Some(TaskweaveError::TaskFailed {
                task: self.id,
                code,
            }),
            ProcessOutcome::Cancelled => Some(TaskweaveError::Cancelled(self.id)),
        }
    }
}

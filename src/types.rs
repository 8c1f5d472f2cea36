use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How a task's body is executed.
///
/// - `Single`: one shell command.
/// - `Batch`: a child list; with `parallel = true` it runs on the worker pool,
///   otherwise children run in list order.
/// - `Sequential`: a child list run strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Single,
    Batch,
    Sequential,
}

impl TaskMode {
    pub fn is_composite(self) -> bool {
        !matches!(self, TaskMode::Single)
    }
}

impl fmt::Display for TaskMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskMode::Single => "single",
            TaskMode::Batch => "batch",
            TaskMode::Sequential => "sequential",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(TaskMode::Single),
            "batch" => Ok(TaskMode::Batch),
            "sequential" => Ok(TaskMode::Sequential),
            other => Err(format!(
                "invalid task mode: {other} (expected \"single\", \"batch\" or \"sequential\")"
            )),
        }
    }
}

/// How a composite member of a parallel batch is executed by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NestedIsolation {
    /// Recurse into the orchestrator in-process with rendering suppressed.
    InProcess,
    /// Re-execute the current binary with `TASKWEAVE_NESTED=1`.
    Process,
}

impl Default for NestedIsolation {
    fn default() -> Self {
        NestedIsolation::InProcess
    }
}

/// How task progress is presented on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Redrawing status frames (one live renderer per terminal).
    Live,
    /// Plain prefixed log lines; used for nested runs and non-TTY output.
    Plain,
    /// Nothing is printed; output is only forwarded to a line sink.
    Silent,
}

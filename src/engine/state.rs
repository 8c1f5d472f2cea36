// src/engine/state.rs

//! Per-task execution state shared between the scheduler and the renderer.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::engine::TaskId;
use crate::exec::output::TailBuffer;

/// Lifecycle of one task inside a run.
///
/// `Queued -> Active -> {Completed | Failed | Cancelled}`, or
/// `Queued -> Cancelled` for a task that never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Mutable state of one task.
///
/// Terminal states are sticky: once a task completed, failed or was
/// cancelled, further transitions are ignored.
#[derive(Debug, Clone)]
pub struct TaskState {
    id: TaskId,
    name: String,
    status: TaskStatus,
    started: Option<Instant>,
    elapsed: Option<Duration>,
    tail: TailBuffer,
}

impl TaskState {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>, tail_lines: usize) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Queued,
            started: None,
            elapsed: None,
            tail: TailBuffer::new(tail_lines),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn tail(&self) -> &TailBuffer {
        &self.tail
    }

    /// `Queued -> Active`. Returns false for any other starting state.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.status != TaskStatus::Queued {
            return false;
        }
        self.status = TaskStatus::Active;
        self.started = Some(now);
        trace!(task = %self.id, "state -> active");
        true
    }

    /// Move into a terminal state, recording elapsed time and clearing the
    /// tail. Returns false when already terminal or `status` is not terminal.
    pub fn finish(&mut self, status: TaskStatus, now: Instant) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.elapsed = self.started.map(|s| now.saturating_duration_since(s));
        self.tail.clear();
        trace!(task = %self.id, %status, "state -> terminal");
        true
    }

    pub fn cancel(&mut self, now: Instant) -> bool {
        self.finish(TaskStatus::Cancelled, now)
    }

    /// Append an output line to the tail. Only running tasks have a tail.
    pub fn push_tail(&mut self, line: &str) {
        if self.status == TaskStatus::Active {
            self.tail.push(line);
        }
    }

    /// Time spent running: live while active, frozen once terminal, `None`
    /// for a task that never started.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match self.status {
            TaskStatus::Active => self.started.map(|s| now.saturating_duration_since(s)),
            _ => self.elapsed,
        }
    }

    /// Copy of the fields the renderer needs.
    pub fn snapshot(&self, now: Instant) -> TaskSnapshot {
        TaskSnapshot {
            name: self.name.clone(),
            status: self.status,
            elapsed: self.elapsed(now),
            tail: self.tail.to_vec(),
        }
    }
}

/// Point-in-time copy of a [`TaskState`], taken under lock and rendered
/// without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub name: String,
    pub status: TaskStatus,
    pub elapsed: Option<Duration>,
    pub tail: Vec<String>,
}

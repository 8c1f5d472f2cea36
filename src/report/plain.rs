// src/report/plain.rs

//! Line-oriented output for nested runs and non-terminal stdout.

use std::time::Duration;

use crate::exec::process::ProcessOutcome;

pub fn pipeline_started(name: &str) -> String {
    format!("[{name}] ⟳ pipeline")
}

pub fn task_started(name: &str) -> String {
    format!("[{name}] ⟳ started")
}

pub fn task_finished(name: &str, outcome: ProcessOutcome, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    match outcome {
        ProcessOutcome::Success => format!("[{name}] ✓ completed in {secs:.1}s"),
        ProcessOutcome::Failed(code) => {
            format!("[{name}] ✕ failed with exit code {code} after {secs:.1}s")
        }
        ProcessOutcome::Cancelled => format!("[{name}] ⏹ cancelled after {secs:.1}s"),
    }
}

// src/engine/mod.rs

//! Orchestration engine for taskweave.
//!
//! This module ties together:
//! - the recursive orchestrator (hooks, sequential composites, atomic tasks)
//! - the bounded worker pool for parallel batches
//! - the pluggable runner that executes one pool member
//! - per-task state shared with the live renderer
//! - interrupt handling for the run-wide cancellation token

/// Canonical task identifier type used throughout the engine.
pub type TaskId = String;

pub mod backend;
pub mod orchestrator;
pub mod queue;
pub mod signals;
pub mod state;
pub mod visited;

pub use backend::{MemberRun, MemberRunner, NESTED_ENV, OrchestratorRunner};
pub use orchestrator::Orchestrator;
pub use queue::{QueueBoard, QueueEntry, QueueMember, QueueOptions, QueueReport, StartDecision, TailSink, run_queue};
pub use signals::spawn_interrupt_handler;
pub use state::{TaskSnapshot, TaskState, TaskStatus};
pub use visited::VisitedSet;

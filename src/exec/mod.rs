// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] spawns shell commands in their own process group and owns
//!   the escalating termination path used on cancellation.
//! - [`executor`] runs one atomic task: output capture, live status, result
//!   presentation.
//! - [`output`] merges stdout/stderr and keeps the full buffer and the tail.
//! - [`template`] expands `{{ ... }}` placeholders against caller data.
//! - [`result`] is the immutable per-execution [`TaskResult`].

pub mod executor;
pub mod output;
pub mod process;
pub mod result;
pub mod template;

pub use executor::{ExecContext, Executor};
pub use output::{LineSink, TailBuffer};
pub use process::{ProcessOutcome, ShellCommand, StdioMode, Supervisor};
pub use result::TaskResult;
pub use template::render_command;

// src/exec/executor.rs

//! Single-task executor.
//!
//! Runs one atomic task through the [`Supervisor`], streaming its merged
//! output into a full buffer, the task's tail and an optional forwarding sink,
//! and presents the result according to the [`RenderMode`].

use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crossterm::style::Stylize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ConfigSection, TaskDefinition};
use crate::engine::state::{TaskState, TaskStatus};
use crate::errors::Result;
use crate::exec::output::{CapturedOutput, LineSink, merge_lines};
use crate::exec::process::{ProcessOutcome, ShellCommand, StdioMode, Supervisor};
use crate::exec::result::TaskResult;
use crate::report::live::LiveStatusReporter;
use crate::report::style::{Tone, boxed};
use crate::report::plain;
use crate::types::RenderMode;

/// How long the line collector may keep reading after the child exited.
/// A backgrounded grandchild can hold the pipes open indefinitely.
const DRAIN_WINDOW: Duration = Duration::from_millis(250);

/// Per-call execution context.
#[derive(Clone)]
pub struct ExecContext {
    pub mode: RenderMode,
    pub forward: Option<LineSink>,
    pub cancel: CancellationToken,
}

impl ExecContext {
    pub fn new(mode: RenderMode, cancel: CancellationToken) -> Self {
        Self {
            mode,
            forward: None,
            cancel,
        }
    }

    pub fn with_forward(mut self, forward: Option<LineSink>) -> Self {
        self.forward = forward;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Executor {
    supervisor: Supervisor,
    tail_lines: usize,
    render_tick: Duration,
    short_output_lines: usize,
    show_tail: bool,
}

impl Executor {
    pub fn from_settings(settings: &ConfigSection) -> Self {
        Self {
            supervisor: Supervisor::new(
                settings.shell.clone(),
                Duration::from_millis(settings.grace_period_ms),
            ),
            tail_lines: settings.tail_lines,
            render_tick: Duration::from_millis(settings.render_tick_ms),
            short_output_lines: settings.short_output_lines,
            show_tail: true,
        }
    }

    /// Show or hide the rolling tail in live frames.
    pub fn with_show_tail(mut self, show_tail: bool) -> Self {
        self.show_tail = show_tail;
        self
    }

    /// Override the SIGTERM to SIGKILL grace period of spawned processes.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.supervisor = self.supervisor.with_grace(grace);
        self
    }

    pub fn tail_lines(&self) -> usize {
        self.tail_lines
    }

    pub fn render_tick(&self) -> Duration {
        self.render_tick
    }

    pub fn show_tail(&self) -> bool {
        self.show_tail
    }

    /// Run `command` (already template-expanded) as the body of `def`.
    ///
    /// Failures and cancellation are part of the returned [`TaskResult`];
    /// `Err` is reserved for problems spawning or waiting on the process.
    pub async fn execute(
        &self,
        def: &TaskDefinition,
        command: &str,
        ctx: &ExecContext,
    ) -> Result<TaskResult> {
        let cmd = ShellCommand::new(&def.id, command).cwd(def.cwd.clone());
        if def.interactive {
            return self.execute_interactive(def, &cmd, ctx).await;
        }
        self.execute_piped(def, &cmd, ctx).await
    }

    /// Run `cmd` with captured output on behalf of `def`.
    pub async fn execute_piped(
        &self,
        def: &TaskDefinition,
        cmd: &ShellCommand,
        ctx: &ExecContext,
    ) -> Result<TaskResult> {
        let started = Instant::now();
        let state = Arc::new(Mutex::new(TaskState::new(
            &def.id,
            &def.name,
            self.tail_lines,
        )));
        lock(&state).start(started);

        if ctx.mode == RenderMode::Plain {
            println!("{}", plain::task_started(&def.name));
        }

        let mut child = self.supervisor.spawn(cmd, StdioMode::Piped)?;
        let mut lines = merge_lines(child.take_stdout(), child.take_stderr());

        let captured = CapturedOutput::new();
        let collector = {
            let captured = captured.clone();
            let state = Arc::clone(&state);
            let forward = ctx.forward.clone();
            tokio::spawn(async move {
                while let Some(line) = lines.recv().await {
                    captured.push_line(&line);
                    lock(&state).push_tail(&line);
                    if let Some(forward) = &forward {
                        forward(&line);
                    }
                }
            })
        };

        let reporter = (ctx.mode == RenderMode::Live).then(|| {
            LiveStatusReporter::spawn(
                state.clone(),
                self.render_tick,
                self.show_tail,
                Box::new(io::stdout()),
            )
        });

        let waited = child.wait(&ctx.cancel).await;

        if tokio::time::timeout(DRAIN_WINDOW, collector).await.is_err() {
            debug!(
                task = %def.id,
                "output pipes still open after process exit; detaching collector"
            );
        }

        let finished = Instant::now();
        let status = match &waited {
            Ok(ProcessOutcome::Success) => TaskStatus::Completed,
            Ok(ProcessOutcome::Cancelled) => TaskStatus::Cancelled,
            Ok(ProcessOutcome::Failed(_)) | Err(_) => TaskStatus::Failed,
        };
        lock(&state).finish(status, finished);

        if let Some(reporter) = reporter {
            reporter.finish().await;
        }

        let outcome = waited?;
        let result = TaskResult::from_outcome(
            &def.id,
            outcome,
            captured.contents(),
            finished.saturating_duration_since(started),
        );
        self.present(def, &result, ctx.mode);
        Ok(result)
    }

    /// Interactive tasks own the terminal: no capture, no frames.
    async fn execute_interactive(
        &self,
        def: &TaskDefinition,
        cmd: &ShellCommand,
        ctx: &ExecContext,
    ) -> Result<TaskResult> {
        if ctx.mode == RenderMode::Live {
            println!("{}", format!("Interactive Session: {}", def.name).cyan().bold());
        }

        let started = Instant::now();
        let mut child = self.supervisor.spawn(cmd, StdioMode::Inherit)?;
        let outcome = child.wait(&ctx.cancel).await?;

        info!(task = %def.id, ?outcome, "interactive task finished");

        let result = TaskResult::from_outcome(&def.id, outcome, String::new(), started.elapsed());
        if outcome == ProcessOutcome::Cancelled && ctx.mode != RenderMode::Silent {
            print_cancelled(&def.name);
        }
        Ok(result)
    }

    fn present(&self, def: &TaskDefinition, result: &TaskResult, mode: RenderMode) {
        if mode == RenderMode::Silent {
            return;
        }

        if mode == RenderMode::Plain {
            println!(
                "{}",
                plain::task_finished(&def.name, result.outcome(), result.elapsed())
            );
        }

        match result.outcome() {
            ProcessOutcome::Success => {
                let output = result.output();
                let line_count = output.lines().count();
                if mode == RenderMode::Live && line_count > 0 && line_count <= self.short_output_lines {
                    print!("{}", boxed(&def.name, output, Tone::Info));
                }
            }
            ProcessOutcome::Failed(_) => {
                if let Some(msg) = &def.on_error {
                    println!("{}", msg.as_str().red().bold());
                }
                print!(
                    "{}",
                    boxed(&format!("Failure Log: {}", def.name), result.output(), Tone::Failure)
                );
            }
            ProcessOutcome::Cancelled => print_cancelled(&def.name),
        }
    }
}

fn print_cancelled(name: &str) {
    println!("\n{}", format!("⏹  {name} cancelled.").yellow());
}

fn lock(state: &Mutex<TaskState>) -> std::sync::MutexGuard<'_, TaskState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

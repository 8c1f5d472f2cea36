// src/engine/backend.rs

//! How a worker runs one pool member.
//!
//! The worker pool talks to a [`MemberRunner`] instead of the orchestrator
//! directly, so tests can drive the pool with a scripted fake while
//! production uses [`OrchestratorRunner`]:
//!
//! - atomic members run through the executor with rendering suppressed and
//!   their lines forwarded into the member's tail;
//! - composite members either recurse into the orchestrator in-process
//!   (`nested_isolation = "in_process"`) or re-execute the current binary
//!   with [`NESTED_ENV`] set (`nested_isolation = "process"`).

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::TaskId;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::queue::QueueMember;
use crate::engine::visited::VisitedSet;
use crate::errors::{Result, TaskweaveError};
use crate::exec::executor::ExecContext;
use crate::exec::output::{CapturedOutput, LineSink};
use crate::exec::process::{ProcessOutcome, ShellCommand};
use crate::exec::result::TaskResult;
use crate::types::{NestedIsolation, RenderMode};

/// Environment marker telling a re-executed run that it is nested.
pub const NESTED_ENV: &str = "TASKWEAVE_NESTED";

/// Extra time a re-executed run gets on top of its own escalation.
const NESTED_GRACE_MARGIN: Duration = Duration::from_secs(1);

/// Grace period for a re-executed run. It escalates its own process groups
/// after `grace`, so the parent must not SIGKILL it before that happens.
pub fn nested_grace(grace: Duration) -> Duration {
    grace * 2 + NESTED_GRACE_MARGIN
}

/// Everything a runner needs to execute one started member.
pub struct MemberRun {
    pub index: usize,
    pub member: QueueMember,
    /// Receives every output line of the member.
    pub sink: LineSink,
    pub cancel: CancellationToken,
}

/// Trait abstracting how a started pool member is executed.
///
/// Implementations always produce a [`TaskResult`]; errors are folded into a
/// failed (or cancelled) result so a member can never abort its siblings.
pub trait MemberRunner: Send + Sync {
    fn run_member(&self, run: MemberRun) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>>;
}

/// Production runner backed by the orchestrator.
pub struct OrchestratorRunner {
    orchestrator: Orchestrator,
    data: Option<Value>,
    parent: Option<TaskId>,
}

impl OrchestratorRunner {
    /// `parent` is the batch the members belong to; nested runs never
    /// re-enter it.
    pub fn new(orchestrator: Orchestrator, data: Option<Value>, parent: Option<TaskId>) -> Self {
        Self {
            orchestrator,
            data,
            parent,
        }
    }

    async fn run_atomic(&self, run: MemberRun) -> TaskResult {
        let started = Instant::now();
        let def = &run.member.definition;
        let command = run.member.command.as_deref().unwrap_or_default();
        let ctx = ExecContext::new(RenderMode::Silent, run.cancel.clone())
            .with_forward(Some(run.sink.clone()));

        match self.orchestrator.executor().execute(def, command, &ctx).await {
            Ok(result) => result,
            Err(e) => TaskResult::from_error(&def.id, &e, String::new(), started.elapsed()),
        }
    }

    async fn run_nested_in_process(&self, run: MemberRun) -> TaskResult {
        let started = Instant::now();
        let id = run.member.id().to_string();

        let captured = CapturedOutput::new();
        let forward: LineSink = {
            let captured = captured.clone();
            let sink = run.sink.clone();
            Arc::new(move |line: &str| {
                captured.push_line(line);
                sink(line);
            })
        };

        let nested = self
            .orchestrator
            .clone()
            .with_render_mode(RenderMode::Silent)
            .with_forward(Some(forward));

        let mut visited = VisitedSet::new();
        if let Some(parent) = &self.parent {
            visited.insert(parent);
        }

        debug!(task = %id, index = run.index, "running composite member in-process");
        match nested.run(&id, self.data.as_ref(), &mut visited).await {
            Ok(()) => TaskResult::from_outcome(
                &id,
                ProcessOutcome::Success,
                captured.contents(),
                started.elapsed(),
            ),
            Err(e) => TaskResult::from_error(&id, &e, captured.contents(), started.elapsed()),
        }
    }

    async fn run_nested_process(&self, run: MemberRun) -> TaskResult {
        let started = Instant::now();
        let def = &run.member.definition;

        let cmd = match self.reexec_command(&def.id) {
            Ok(cmd) => cmd,
            Err(e) => return TaskResult::from_error(&def.id, &e, String::new(), started.elapsed()),
        };

        info!(task = %def.id, index = run.index, cmd = %cmd.command, "re-executing for composite member");

        let grace = Duration::from_millis(self.orchestrator.registry().settings().grace_period_ms);
        let executor = self.orchestrator.executor().clone().with_grace(nested_grace(grace));
        let ctx = ExecContext::new(RenderMode::Silent, run.cancel.clone())
            .with_forward(Some(run.sink.clone()));
        match executor.execute_piped(def, &cmd, &ctx).await {
            Ok(result) => result,
            Err(e) => TaskResult::from_error(&def.id, &e, String::new(), started.elapsed()),
        }
    }

    fn reexec_command(&self, id: &str) -> Result<ShellCommand> {
        let exe = std::env::current_exe()?;
        let mut command = shell_quote(&exe.to_string_lossy());

        if let Some(source) = self.orchestrator.registry().source() {
            command.push_str(" --config ");
            command.push_str(&shell_quote(&path_arg(source)));
        }
        command.push(' ');
        command.push_str(&shell_quote(id));

        if let Some(data) = &self.data {
            let json = serde_json::to_string(data)
                .map_err(|e| TaskweaveError::ConfigError(format!("serializing --data: {e}")))?;
            command.push_str(" --data ");
            command.push_str(&shell_quote(&json));
        }

        Ok(ShellCommand::new(id, command).env(NESTED_ENV, "1"))
    }
}

impl MemberRunner for OrchestratorRunner {
    fn run_member(&self, run: MemberRun) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>> {
        Box::pin(async move {
            if !run.member.definition.is_composite() {
                return self.run_atomic(run).await;
            }
            match self.orchestrator.registry().settings().nested_isolation {
                NestedIsolation::InProcess => self.run_nested_in_process(run).await,
                NestedIsolation::Process => self.run_nested_process(run).await,
            }
        })
    }
}

fn path_arg(path: &Path) -> String {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

/// Quote `s` as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '='))
    {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

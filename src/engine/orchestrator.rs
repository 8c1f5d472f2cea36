// src/engine/orchestrator.rs

//! Recursive task orchestrator.
//!
//! `run(id)` gives one identifier its full lifecycle: pre-hooks, body,
//! post-hooks. The body is dispatched on the task's shape:
//!
//! - atomic: expand the command template and hand it to the executor;
//! - composite + parallel batch: the worker pool;
//! - any other composite: `run` each child in list order.
//!
//! Every failure is returned as an error and propagated with `?`, so nothing
//! after a failing step runs. A [`VisitedSet`] owned by the caller makes each
//! identifier run at most once per top-level invocation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crossterm::style::Stylize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{TaskDefinition, TaskRegistry};
use crate::engine::TaskId;
use crate::engine::backend::{MemberRunner, OrchestratorRunner};
use crate::engine::queue::{QueueMember, QueueOptions, QueueReport, run_queue};
use crate::engine::visited::VisitedSet;
use crate::errors::{Result, TaskweaveError};
use crate::exec::executor::{ExecContext, Executor};
use crate::exec::output::LineSink;
use crate::exec::template::render_command;
use crate::report::plain;
use crate::types::RenderMode;

/// Entry point for running tasks from a registry.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    executor: Executor,
    cancel: CancellationToken,
    mode: RenderMode,
    forward: Option<LineSink>,
}

impl Orchestrator {
    pub fn new(registry: Arc<TaskRegistry>, cancel: CancellationToken) -> Self {
        let executor = Executor::from_settings(registry.settings());
        Self {
            registry,
            executor,
            cancel,
            mode: RenderMode::Plain,
            forward: None,
        }
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Send every output line of every task run through this orchestrator
    /// to `forward`.
    pub fn with_forward(mut self, forward: Option<LineSink>) -> Self {
        self.forward = forward;
        self
    }

    pub fn with_show_tail(mut self, show_tail: bool) -> Self {
        self.executor = self.executor.with_show_tail(show_tail);
        self
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn resolve(&self, id: &str) -> Result<TaskDefinition> {
        self.registry.resolve(id)
    }

    /// Run `id` with hooks, sharing `visited` with the rest of the call tree.
    pub fn run<'a>(
        &'a self,
        id: &'a str,
        data: Option<&'a Value>,
        visited: &'a mut VisitedSet,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if !visited.insert(id) {
                debug!(task = %id, "already visited in this invocation; skipping");
                return Ok(());
            }

            let def = self.registry.resolve(id)?;

            for hook in &def.pre_run {
                debug!(task = %id, hook = %hook, "running pre-hook");
                self.run(hook, data, visited).await?;
            }

            if def.runs_on_pool() {
                self.run_batch(&def, data).await?;
            } else if def.is_composite() {
                self.announce_pipeline(&def);
                for child in &def.children {
                    self.run(child, data, visited).await?;
                }
            } else {
                self.run_atomic(&def, data).await?;
            }

            for hook in &def.post_run {
                debug!(task = %id, hook = %hook, "running post-hook");
                self.run(hook, data, visited).await?;
            }

            Ok(())
        })
    }

    /// Run `ids` on the worker pool without caller data.
    pub async fn run_queue(
        &self,
        ids: &[TaskId],
        workers: usize,
        continue_on_error: bool,
    ) -> Result<QueueReport> {
        self.queue(None, ids, workers, continue_on_error, None).await
    }

    /// Run `ids` on the worker pool, expanding templates against `data`.
    pub async fn run_queue_with_data(
        &self,
        ids: &[TaskId],
        workers: usize,
        continue_on_error: bool,
        data: Option<&Value>,
    ) -> Result<QueueReport> {
        self.queue(None, ids, workers, continue_on_error, data).await
    }

    async fn queue(
        &self,
        parent: Option<&str>,
        ids: &[TaskId],
        workers: usize,
        continue_on_error: bool,
        data: Option<&Value>,
    ) -> Result<QueueReport> {
        // Resolve and expand everything before any member starts: a missing
        // identifier or a broken template aborts the whole batch.
        let members = ids
            .iter()
            .map(|id| -> Result<QueueMember> {
                let def = self.registry.resolve(id)?;
                let command = if def.is_composite() {
                    None
                } else {
                    let template = def.command.as_deref().unwrap_or_default();
                    Some(render_command(&def.id, template, data)?)
                };
                Ok(QueueMember::new(def, command))
            })
            .collect::<Result<Vec<_>>>()?;

        let runner: Arc<dyn MemberRunner> = Arc::new(OrchestratorRunner::new(
            self.clone(),
            data.cloned(),
            parent.map(str::to_string),
        ));

        let opts = QueueOptions {
            workers,
            continue_on_error,
            tail_lines: self.executor.tail_lines(),
            render_tick: self.executor.render_tick(),
            show_tail: self.executor.show_tail(),
            mode: self.mode,
        };

        Ok(run_queue(members, runner, opts, self.cancel.clone(), self.forward.clone()).await)
    }

    async fn run_batch(&self, def: &TaskDefinition, data: Option<&Value>) -> Result<()> {
        self.announce_pipeline(def);

        let report = self
            .queue(
                Some(&def.id),
                &def.children,
                def.workers,
                def.continue_on_error,
                data,
            )
            .await?;

        if report.is_success() {
            return Ok(());
        }

        if report.failed() == 0 && self.cancel.is_cancelled() {
            return Err(TaskweaveError::Cancelled(def.id.clone()));
        }

        Err(TaskweaveError::BatchFailed {
            task: def.id.clone(),
            failed: report.failed(),
            cancelled: report.cancelled(),
        })
    }

    async fn run_atomic(&self, def: &TaskDefinition, data: Option<&Value>) -> Result<()> {
        let template = def.command.as_deref().unwrap_or_default();
        let command = render_command(&def.id, template, data)?;

        if self.cancel.is_cancelled() {
            info!(task = %def.id, "cancellation requested; not starting task");
            return Err(TaskweaveError::Cancelled(def.id.clone()));
        }

        if self.mode != RenderMode::Silent {
            if let Some(msg) = &def.pre_msg {
                println!("{}", msg.as_str().cyan());
            }
        }

        let ctx = ExecContext::new(self.mode, self.cancel.clone()).with_forward(self.forward.clone());
        let result = self.executor.execute(def, &command, &ctx).await?;

        match result.into_error() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    fn announce_pipeline(&self, def: &TaskDefinition) {
        match self.mode {
            RenderMode::Live => println!("{}", format!("Pipeline: {}", def.name).cyan().bold()),
            RenderMode::Plain => println!("{}", plain::pipeline_started(&def.name)),
            RenderMode::Silent => {}
        }
    }
}

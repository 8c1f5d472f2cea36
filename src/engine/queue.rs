// src/engine/queue.rs

//! Bounded worker pool over a list of tasks.
//!
//! The pure bookkeeping lives in [`QueueBoard`] (state table, results and the
//! shared failed flag); [`run_queue`] is the async shell that feeds indices
//! to W worker loops and hands each started member to a [`MemberRunner`].
//!
//! Rules enforced by the board, always under the single board mutex:
//! - a member is started at most once;
//! - after a failure (without continue-on-error) queued members are marked
//!   cancelled instead of started;
//! - once the cancellation token fired, nothing new starts.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossterm::style::Stylize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::TaskDefinition;
use crate::engine::TaskId;
use crate::engine::backend::{MemberRun, MemberRunner};
use crate::engine::state::{TaskSnapshot, TaskState, TaskStatus};
use crate::exec::output::LineSink;
use crate::exec::process::ProcessOutcome;
use crate::exec::result::TaskResult;
use crate::report::live::{LiveStatusReporter, StatusSource};
use crate::report::plain;
use crate::report::style::{Tone, boxed, summary_line};
use crate::types::RenderMode;

/// One entry of a queue run, prepared before any worker starts.
#[derive(Debug, Clone)]
pub struct QueueMember {
    pub definition: TaskDefinition,
    /// Template-expanded command of an atomic member.
    pub command: Option<String>,
}

impl QueueMember {
    pub fn new(definition: TaskDefinition, command: Option<String>) -> Self {
        Self {
            definition,
            command,
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

/// Policy and presentation knobs for one queue run.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub workers: usize,
    pub continue_on_error: bool,
    pub tail_lines: usize,
    pub render_tick: Duration,
    pub show_tail: bool,
    pub mode: RenderMode,
}

/// What a worker should do with the index it just pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    Start,
    /// A sibling failed and continue-on-error is off.
    SkipAfterFailure,
    /// The cancellation token fired; the worker stops pulling.
    SkipCancelled,
}

/// Index-aligned state table plus the run-wide failed flag.
#[derive(Debug)]
pub struct QueueBoard {
    states: Vec<TaskState>,
    results: Vec<Option<TaskResult>>,
    failed: bool,
    continue_on_error: bool,
}

impl QueueBoard {
    pub fn new<'a>(
        members: impl IntoIterator<Item = (&'a str, &'a str)>,
        tail_lines: usize,
        continue_on_error: bool,
    ) -> Self {
        let states: Vec<TaskState> = members
            .into_iter()
            .map(|(id, name)| TaskState::new(id, name, tail_lines))
            .collect();
        let results = vec![None; states.len()];
        Self {
            states,
            results,
            failed: false,
            continue_on_error,
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn state(&self, index: usize) -> Option<&TaskState> {
        self.states.get(index)
    }

    pub fn states(&self) -> &[TaskState] {
        &self.states
    }

    /// Decide whether the member at `index` may start, and start it if so.
    pub fn try_start(&mut self, index: usize, cancelled: bool, now: Instant) -> StartDecision {
        let state = &mut self.states[index];
        if cancelled {
            state.cancel(now);
            return StartDecision::SkipCancelled;
        }
        if self.failed && !self.continue_on_error {
            state.cancel(now);
            return StartDecision::SkipAfterFailure;
        }
        if state.start(now) {
            StartDecision::Start
        } else {
            // Already left `Queued`; never start a member twice.
            StartDecision::SkipAfterFailure
        }
    }

    /// Record the result of a started member. A failure raises the shared
    /// flag in the same critical section.
    pub fn record(&mut self, index: usize, result: TaskResult, now: Instant) {
        let status = match result.outcome() {
            ProcessOutcome::Success => TaskStatus::Completed,
            ProcessOutcome::Failed(_) => TaskStatus::Failed,
            ProcessOutcome::Cancelled => TaskStatus::Cancelled,
        };
        if status == TaskStatus::Failed {
            self.failed = true;
        }
        self.states[index].finish(status, now);
        self.results[index] = Some(result);
    }

    pub fn push_tail(&mut self, index: usize, line: &str) {
        if let Some(state) = self.states.get_mut(index) {
            state.push_tail(line);
        }
    }

    /// Mark every still-queued member cancelled. Returns how many changed.
    pub fn cancel_remaining(&mut self, now: Instant) -> usize {
        self.states
            .iter_mut()
            .filter(|s| s.status() == TaskStatus::Queued)
            .map(|s| s.cancel(now))
            .filter(|changed| *changed)
            .count()
    }

    pub fn snapshots(&self, now: Instant) -> Vec<TaskSnapshot> {
        self.states.iter().map(|s| s.snapshot(now)).collect()
    }

    pub fn report(&self, wall_time: Duration) -> QueueReport {
        let now = Instant::now();
        let entries = self
            .states
            .iter()
            .zip(&self.results)
            .map(|(state, result)| QueueEntry {
                id: state.id().to_string(),
                name: state.name().to_string(),
                status: state.status(),
                elapsed: state.elapsed(now),
                result: result.clone(),
            })
            .collect();
        QueueReport {
            entries,
            wall_time,
        }
    }
}

impl StatusSource for Mutex<QueueBoard> {
    fn snapshot(&self) -> Vec<TaskSnapshot> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshots(Instant::now())
    }
}

/// Final state of one member.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
    pub elapsed: Option<Duration>,
    /// Present when the member was actually started.
    pub result: Option<TaskResult>,
}

/// Outcome of a whole queue run.
#[derive(Debug, Clone)]
pub struct QueueReport {
    pub entries: Vec<QueueEntry>,
    pub wall_time: Duration,
}

impl QueueReport {
    pub fn count(&self, status: TaskStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn completed(&self) -> usize {
        self.count(TaskStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskStatus::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(TaskStatus::Cancelled)
    }

    pub fn total(&self) -> usize {
        self.entries.len()
    }

    /// Members that were started.
    pub fn attempted(&self) -> usize {
        self.entries.iter().filter(|e| e.result.is_some()).count()
    }

    pub fn is_success(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.status == TaskStatus::Completed)
    }

    pub fn entry(&self, id: &str) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.entry(id).map(|e| e.status)
    }
}

/// Forwards a member's output lines into its tail on the board, and on to
/// an upstream sink when the queue itself runs nested.
#[derive(Clone)]
pub struct TailSink {
    board: Arc<Mutex<QueueBoard>>,
    index: usize,
    upstream: Option<LineSink>,
}

impl TailSink {
    pub fn new(board: Arc<Mutex<QueueBoard>>, index: usize, upstream: Option<LineSink>) -> Self {
        Self {
            board,
            index,
            upstream,
        }
    }

    pub fn push(&self, line: &str) {
        lock(&self.board).push_tail(self.index, line);
        if let Some(upstream) = &self.upstream {
            upstream(line);
        }
    }

    pub fn into_line_sink(self) -> LineSink {
        Arc::new(move |line: &str| self.push(line))
    }
}

struct QueueContext {
    board: Arc<Mutex<QueueBoard>>,
    cancel: CancellationToken,
    indices: tokio::sync::Mutex<mpsc::Receiver<usize>>,
    members: Vec<QueueMember>,
    upstream: Option<LineSink>,
    mode: RenderMode,
}

/// Run `members` on `opts.workers` concurrent workers and wait for all of
/// them. Member failures never abort in-flight siblings; only `cancel` does.
pub async fn run_queue(
    members: Vec<QueueMember>,
    runner: Arc<dyn MemberRunner>,
    opts: QueueOptions,
    cancel: CancellationToken,
    upstream: Option<LineSink>,
) -> QueueReport {
    let started = Instant::now();
    let total = members.len();

    let board = Arc::new(Mutex::new(QueueBoard::new(
        members.iter().map(|m| (m.id(), m.name())),
        opts.tail_lines,
        opts.continue_on_error,
    )));

    if total == 0 {
        return lock(&board).report(started.elapsed());
    }

    // Pre-load every index, then close the queue: an empty receive means
    // "drained, exit".
    let (tx, rx) = mpsc::channel::<usize>(total);
    for index in 0..total {
        if tx.send(index).await.is_err() {
            break;
        }
    }
    drop(tx);

    let workers = opts.workers.clamp(1, total);
    info!(
        members = total,
        workers,
        continue_on_error = opts.continue_on_error,
        "starting worker pool"
    );

    let ctx = Arc::new(QueueContext {
        board: Arc::clone(&board),
        cancel,
        indices: tokio::sync::Mutex::new(rx),
        members,
        upstream,
        mode: opts.mode,
    });

    let reporter = (opts.mode == RenderMode::Live).then(|| {
        LiveStatusReporter::spawn(
            board.clone(),
            opts.render_tick,
            opts.show_tail,
            Box::new(std::io::stdout()),
        )
    });

    let handles: Vec<_> = (0..workers)
        .map(|worker| {
            let ctx = Arc::clone(&ctx);
            let runner = Arc::clone(&runner);
            tokio::spawn(worker_loop(worker, ctx, runner))
        })
        .collect();

    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "worker task ended abnormally");
        }
    }

    let swept = lock(&board).cancel_remaining(Instant::now());
    if swept > 0 {
        debug!(swept, "marked members left in the queue as cancelled");
    }

    if let Some(reporter) = reporter {
        reporter.finish().await;
    }

    let report = lock(&board).report(started.elapsed());
    info!(
        completed = report.completed(),
        failed = report.failed(),
        cancelled = report.cancelled(),
        wall_ms = report.wall_time.as_millis() as u64,
        "worker pool finished"
    );

    if opts.mode != RenderMode::Silent {
        print_summary(&report);
    }

    report
}

async fn worker_loop(worker: usize, ctx: Arc<QueueContext>, runner: Arc<dyn MemberRunner>) {
    debug!(worker, "worker started");

    loop {
        let next = ctx.indices.lock().await.recv().await;
        let Some(index) = next else {
            break;
        };

        let decision = lock(&ctx.board).try_start(index, ctx.cancel.is_cancelled(), Instant::now());
        let member = &ctx.members[index];

        match decision {
            StartDecision::Start => {}
            StartDecision::SkipAfterFailure => {
                debug!(worker, index, task = %member.id(), "skipping member after failure");
                continue;
            }
            StartDecision::SkipCancelled => {
                debug!(worker, index, task = %member.id(), "cancellation observed; worker stops pulling");
                break;
            }
        }

        debug!(worker, index, task = %member.id(), "member started");
        if ctx.mode == RenderMode::Plain {
            println!("{}", plain::task_started(member.name()));
        }

        let sink = TailSink::new(Arc::clone(&ctx.board), index, ctx.upstream.clone());
        let result = runner
            .run_member(MemberRun {
                index,
                member: member.clone(),
                sink: sink.into_line_sink(),
                cancel: ctx.cancel.clone(),
            })
            .await;

        debug!(
            worker,
            index,
            task = %member.id(),
            success = result.success(),
            "member finished"
        );
        if ctx.mode == RenderMode::Plain {
            println!(
                "{}",
                plain::task_finished(member.name(), result.outcome(), result.elapsed())
            );
        }
        lock(&ctx.board).record(index, result, Instant::now());
    }

    debug!(worker, "worker exiting");
}

fn print_summary(report: &QueueReport) {
    println!();
    println!(
        "{}",
        summary_line(
            report.completed(),
            report.failed(),
            report.total(),
            report.wall_time
        )
    );
    println!();

    for entry in report.entries.iter().filter(|e| e.status == TaskStatus::Failed) {
        let output = entry.result.as_ref().map(|r| r.output()).unwrap_or_default();
        print!(
            "{}",
            boxed(&format!("Failure Log: {}", entry.name), output, Tone::Failure)
        );
    }

    if !report.is_success() {
        println!("\n{}", "PIPELINE FAILED".bold());
    }
}

fn lock(board: &Mutex<QueueBoard>) -> MutexGuard<'_, QueueBoard> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

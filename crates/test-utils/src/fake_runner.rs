use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use taskweave::engine::{MemberRun, MemberRunner};
use taskweave::exec::{ProcessOutcome, TaskResult};

/// Scripted behaviour of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Succeed,
    Fail(i32),
    /// Run until the cancellation token fires.
    WaitForCancel,
}

/// A fake member runner that:
/// - records which members were started, in start order
/// - tracks the highest number of members running at once
/// - finishes each member after its scripted delay with its scripted outcome
///   (or `Cancelled` if the token fires first).
#[derive(Debug, Default)]
pub struct FakeRunner {
    scripts: HashMap<String, Script>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    attempts: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<String>>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, id: &str, script: Script) -> Self {
        self.scripts.insert(id.to_string(), script);
        self
    }

    pub fn delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Members started so far, in start order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    /// Members that ran to their scripted end (not cancelled).
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl MemberRunner for FakeRunner {
    fn run_member(&self, run: MemberRun) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>> {
        Box::pin(async move {
            let id = run.member.id().to_string();
            let started = Instant::now();

            self.attempts.lock().unwrap().push(id.clone());
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);

            let script = self.scripts.get(&id).copied().unwrap_or(Script::Succeed);
            let delay = self.delays.get(&id).copied().unwrap_or(self.default_delay);

            (run.sink)(&format!("{id} running"));

            let outcome = match script {
                Script::WaitForCancel => {
                    run.cancel.cancelled().await;
                    ProcessOutcome::Cancelled
                }
                Script::Succeed | Script::Fail(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => match script {
                            Script::Fail(code) => ProcessOutcome::Failed(code),
                            _ => ProcessOutcome::Success,
                        },
                        _ = run.cancel.cancelled() => ProcessOutcome::Cancelled,
                    }
                }
            };

            if outcome != ProcessOutcome::Cancelled {
                self.finished.lock().unwrap().push(id.clone());
            }
            self.active.fetch_sub(1, Ordering::SeqCst);

            TaskResult::from_outcome(id.clone(), outcome, format!("{id} output\n"), started.elapsed())
        })
    }
}

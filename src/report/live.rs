// src/report/live.rs

//! Live status reporter.
//!
//! A background task samples a [`StatusSource`] on a fixed tick and redraws
//! the frame in place. Sampling copies the needed fields under the source's
//! lock and formats them after releasing it, so a slow terminal never stalls
//! the workers that update the state.

use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::engine::state::{TaskSnapshot, TaskState, TaskStatus};
use crate::report::frame::FrameWriter;
use crate::report::style::{status_line, tail_line};

/// Anything the reporter can take a consistent snapshot of.
pub trait StatusSource: Send + Sync {
    fn snapshot(&self) -> Vec<TaskSnapshot>;
}

impl StatusSource for Mutex<TaskState> {
    fn snapshot(&self) -> Vec<TaskSnapshot> {
        let state = self.lock().unwrap_or_else(PoisonError::into_inner);
        vec![state.snapshot(Instant::now())]
    }
}

/// Format one frame: a status row per task, with the tail of active tasks
/// underneath.
pub fn render_frame(snapshots: &[TaskSnapshot], tick: usize, show_tail: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshots.len());
    for snap in snapshots {
        lines.push(status_line(snap, tick));
        if show_tail && snap.status == TaskStatus::Active {
            lines.extend(snap.tail.iter().map(|l| tail_line(l)));
        }
    }
    lines
}

/// Handle to a running redraw loop.
pub struct LiveStatusReporter {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl LiveStatusReporter {
    /// Start redrawing `source` every `tick` into `out`.
    pub fn spawn(
        source: Arc<dyn StatusSource>,
        tick: Duration,
        show_tail: bool,
        mut out: Box<dyn Write + Send>,
    ) -> Self {
        let stop = CancellationToken::new();
        let stop_loop = stop.clone();

        let handle = tokio::spawn(async move {
            let mut frame = FrameWriter::new();
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = 0usize;

            loop {
                tokio::select! {
                    _ = stop_loop.cancelled() => break,
                    _ = interval.tick() => {
                        let lines = render_frame(&source.snapshot(), ticks, show_tail);
                        if let Err(e) = frame.draw(&mut out, &lines) {
                            debug!(error = %e, "failed to draw status frame");
                        }
                        ticks = ticks.wrapping_add(1);
                        trace!(lines = lines.len(), "status frame drawn");
                    }
                }
            }

            // The last tick may have raced the final state transition.
            let lines = render_frame(&source.snapshot(), ticks, show_tail);
            if let Err(e) = frame.draw(&mut out, &lines) {
                debug!(error = %e, "failed to draw final status frame");
            }
        });

        Self { stop, handle }
    }

    /// Stop the loop and wait for the final frame to be drawn.
    pub async fn finish(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            debug!(error = %e, "status reporter task ended abnormally");
        }
    }
}

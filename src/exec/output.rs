// src/exec/output.rs

//! Output capture for running commands.
//!
//! stdout and stderr are merged into one line stream. Every line goes into a
//! full buffer (used for failure diagnostics) and into a bounded tail (used by
//! the live renderer).

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Destination for merged output lines of a task.
pub type LineSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Fixed-capacity ring of the most recent output lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, evicting the oldest one when full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(|s| s.as_str())
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

/// Shared, append-only buffer holding every captured line.
#[derive(Debug, Clone, Default)]
pub struct CapturedOutput {
    inner: Arc<Mutex<String>>,
}

impl CapturedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buf.push_str(line);
        buf.push('\n');
    }

    pub fn contents(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Merge a child's stdout and stderr into a single stream of lines.
///
/// The returned receiver yields lines in arrival order and closes once both
/// pipes reach EOF.
pub fn merge_lines(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel::<String>(256);

    if let Some(stdout) = stdout {
        spawn_reader("stdout", stdout, tx.clone());
    }
    if let Some(stderr) = stderr {
        spawn_reader("stderr", stderr, tx.clone());
    }

    rx
}

fn spawn_reader<R>(stream: &'static str, reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(decode_line(&buf)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(stream, error = %e, "output read failed");
                    break;
                }
            }
        }
        trace!(stream, "output reader reached EOF");
    });
}

/// One raw output line without its terminator. Bytes that are not valid
/// UTF-8 become U+FFFD.
pub fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

// src/exec/process.rs

//! Process supervisor.
//!
//! Every non-interactive command runs through `<shell> -c` in its own process
//! group, so the command and everything it forks can be signalled together.
//! Cancellation is the only way a supervised child gets terminated:
//!
//! 1. `SIGTERM` to the whole group;
//! 2. after the grace period, `SIGKILL` to whatever is left of the group;
//! 3. if the group cannot be signalled (already gone), kill the single
//!    child handle instead.
//!
//! Grouped children do not see the terminal's SIGINT, so every live group is
//! also recorded process-wide; [`kill_live_groups`] is the last resort before
//! a hard exit.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// Classified end state of one supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Success,
    /// Non-zero exit; `-1` when the process was killed by a signal.
    Failed(i32),
    /// Terminated by the supervisor after the cancellation token fired.
    Cancelled,
}

impl ProcessOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            ProcessOutcome::Success
        } else {
            ProcessOutcome::Failed(status.code().unwrap_or(-1))
        }
    }

    pub fn is_success(self) -> bool {
        self == ProcessOutcome::Success
    }
}

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// stdout/stderr piped for capture, stdin closed, own process group.
    Piped,
    /// All streams inherited from the terminal; stays in the foreground
    /// process group so it can read from the TTY.
    Inherit,
}

/// A shell command plus the context it runs in.
#[derive(Debug, Clone, Default)]
pub struct ShellCommand {
    pub label: String,
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, cwd: Option<PathBuf>) -> Self {
        self.cwd = cwd;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Spawns shell commands and owns their termination policy.
#[derive(Debug, Clone)]
pub struct Supervisor {
    shell: String,
    grace: Duration,
}

impl Supervisor {
    pub fn new(shell: impl Into<String>, grace: Duration) -> Self {
        Self {
            shell: shell.into(),
            grace,
        }
    }

    /// Same shell with a different grace period.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Spawn `cmd` and return a handle that must be awaited with
    /// [`SupervisedChild::wait`].
    pub fn spawn(&self, cmd: &ShellCommand, stdio: StdioMode) -> Result<SupervisedChild> {
        let mut command = self.build_command(cmd);

        let grouped = match stdio {
            StdioMode::Piped => {
                command
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
                true
            }
            StdioMode::Inherit => {
                command
                    .stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
                false
            }
        };

        #[cfg(unix)]
        if grouped {
            command.process_group(0);
        }

        command.kill_on_drop(true);

        let child = command
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", cmd.label))?;

        info!(
            task = %cmd.label,
            pid = child.id(),
            grouped,
            cmd = %cmd.command,
            "spawned task process"
        );

        let grouped = grouped && cfg!(unix);
        let pgid = match (grouped, child.id()) {
            (true, Some(pid)) => {
                let pgid = pid as i32;
                live_groups().insert(pgid);
                Some(pgid)
            }
            _ => None,
        };

        Ok(SupervisedChild {
            child,
            label: cmd.label.clone(),
            grace: self.grace,
            grouped,
            pgid,
        })
    }

    fn build_command(&self, cmd: &ShellCommand) -> Command {
        // Build a shell command appropriate for the platform.
        let mut c = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&cmd.command);
            c
        } else {
            let mut c = Command::new(&self.shell);
            c.arg("-c").arg(&cmd.command);
            c
        };

        if let Some(dir) = &cmd.cwd {
            c.current_dir(dir);
        }
        for (k, v) in &cmd.env {
            c.env(k, v);
        }
        c
    }
}

/// A running child owned by the supervisor.
#[derive(Debug)]
pub struct SupervisedChild {
    child: Child,
    label: String,
    grace: Duration,
    grouped: bool,
    /// Entry in the live-group registry, removed on drop.
    pgid: Option<i32>,
}

impl Drop for SupervisedChild {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            live_groups().remove(&pgid);
        }
    }
}

impl SupervisedChild {
    /// OS process id, or `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Process group id of a grouped child (equal to its pid).
    pub fn process_group(&self) -> Option<i32> {
        if self.grouped {
            self.child.id().map(|pid| pid as i32)
        } else {
            None
        }
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Wait for the child to exit, or terminate it once `cancel` fires.
    pub async fn wait(&mut self, cancel: &CancellationToken) -> Result<ProcessOutcome> {
        tokio::select! {
            status_res = self.child.wait() => {
                let status = status_res.with_context(|| {
                    format!("waiting for process of task '{}'", self.label)
                })?;
                let outcome = ProcessOutcome::from_status(status);

                info!(
                    task = %self.label,
                    exit_code = status.code().unwrap_or(-1),
                    success = status.success(),
                    "task process exited"
                );

                Ok(outcome)
            }

            _ = cancel.cancelled() => {
                info!(
                    task = %self.label,
                    pid = self.child.id(),
                    "cancellation requested; terminating task process"
                );
                self.terminate().await?;
                Ok(ProcessOutcome::Cancelled)
            }
        }
    }

    /// Escalating termination: graceful signal, grace period, forced kill.
    async fn terminate(&mut self) -> Result<()> {
        let Some(pid) = self.child.id() else {
            debug!(task = %self.label, "process already reaped before termination");
            return Ok(());
        };

        #[cfg(unix)]
        {
            let target = if self.grouped {
                signal::group_of(pid)
            } else {
                Some(signal::Target::Process(pid as libc::pid_t))
            };

            if let Some(target) = target {
                if signal::send(target, libc::SIGTERM) {
                    return self.escalate(target).await;
                }
            }

            debug!(
                task = %self.label,
                pid,
                "could not signal process group; killing child handle"
            );
        }

        #[cfg(not(unix))]
        let _ = pid;

        if let Err(e) = self.child.kill().await {
            warn!(
                task = %self.label,
                error = %e,
                "failed to kill child process on cancellation"
            );
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn escalate(&mut self, target: signal::Target) -> Result<()> {
        let deadline = Instant::now() + self.grace;

        // The leader may exit before the rest of its group does.
        match timeout_at(deadline, self.child.wait()).await {
            Ok(status) => {
                let status = status.with_context(|| {
                    format!("waiting for process of task '{}'", self.label)
                })?;
                debug!(task = %self.label, ?status, "leader exited after SIGTERM");
            }
            Err(_) => {
                debug!(task = %self.label, "grace period elapsed with leader still running");
            }
        }

        while signal::alive(target) && Instant::now() < deadline {
            sleep(Duration::from_millis(25)).await;
        }

        if signal::alive(target) {
            warn!(
                task = %self.label,
                ?target,
                grace_ms = self.grace.as_millis() as u64,
                "process still alive after grace period; sending SIGKILL"
            );
            signal::send(target, libc::SIGKILL);
        }

        let status = self
            .child
            .wait()
            .await
            .with_context(|| format!("reaping process of task '{}'", self.label))?;
        debug!(task = %self.label, ?status, "task process reaped after cancellation");

        Ok(())
    }
}

/// Process groups of supervised children that are still owned by a handle.
static LIVE_GROUPS: Mutex<BTreeSet<i32>> = Mutex::new(BTreeSet::new());

fn live_groups() -> std::sync::MutexGuard<'static, BTreeSet<i32>> {
    LIVE_GROUPS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process groups currently registered by the supervisor.
pub fn live_group_ids() -> Vec<i32> {
    live_groups().iter().copied().collect()
}

/// SIGKILL every registered process group. Returns how many groups were
/// signalled.
pub fn kill_live_groups() -> usize {
    let groups = live_group_ids();
    let mut killed = 0;
    for pgid in groups {
        #[cfg(unix)]
        if signal::send(signal::Target::Group(pgid), libc::SIGKILL) {
            killed += 1;
        }
        #[cfg(not(unix))]
        let _ = pgid;
    }
    if killed > 0 {
        warn!(groups = killed, "killed remaining task process groups");
    }
    killed
}

#[cfg(unix)]
mod signal {
    /// What a termination signal is addressed to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Target {
        Group(libc::pid_t),
        Process(libc::pid_t),
    }

    /// Process group of `pid`, if the process still exists.
    pub fn group_of(pid: u32) -> Option<Target> {
        // SAFETY: getpgid only reads kernel process state.
        let pgid = unsafe { libc::getpgid(pid as libc::pid_t) };
        (pgid > 0).then_some(Target::Group(pgid))
    }

    /// Send `sig`; returns false when nothing could be signalled.
    pub fn send(target: Target, sig: libc::c_int) -> bool {
        // SAFETY: kill/killpg take plain integers and have no memory effects.
        let rc = unsafe {
            match target {
                Target::Group(pgid) => libc::killpg(pgid, sig),
                Target::Process(pid) => libc::kill(pid, sig),
            }
        };
        rc == 0
    }

    /// True while at least one process of the target exists.
    pub fn alive(target: Target) -> bool {
        send(target, 0)
    }
}

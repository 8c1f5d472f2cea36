#![cfg(unix)]

mod common;
use crate::common::{read_log, write_config};

use std::error::Error;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::tempdir;

use taskweave::engine::NESTED_ENV;

type TestResult = Result<(), Box<dyn Error>>;

const BIN: &str = env!("CARGO_BIN_EXE_taskweave");

fn taskweave(config: &Path, task: &str) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.arg("--config").arg(config).arg("--plain").arg(task).env_remove(NESTED_ENV);
    cmd
}

/// True while `pid` exists and is not a zombie.
#[cfg(target_os = "linux")]
fn process_alive(pid: i32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| {
            let (_, rest) = stat.rsplit_once(')')?;
            rest.split_whitespace().next().map(|state| state != "Z")
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence.
    unsafe { libc::kill(pid, 0) == 0 }
}

fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while started.elapsed() < limit {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(25));
    }
    done()
}

#[test]
fn composite_members_run_in_a_reexecuted_process() -> TestResult {
    let dir = tempdir()?;
    let log_path = dir.path().join("run.log");
    let log = log_path.display();
    let config = write_config(
        dir.path(),
        &format!(
            r#"
[config]
nested_isolation = "process"

[task.x]
command = "echo x >> '{log}'"

[task.y]
command = "echo y >> '{log}'"

[task.z]
command = "echo z >> '{log}'"

[task.sub]
tasks = ["x", "y"]

[task.all]
type = "batch"
tasks = ["sub", "z"]
parallel = true
workers = 2
"#
        ),
    );

    let output = taskweave(&config, "all").output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stdout: {stdout}");

    let mut ran = read_log(&log_path);
    ran.sort();
    assert_eq!(ran, vec!["x", "y", "z"]);

    // Pool members report per task in plain mode.
    assert!(stdout.contains("[sub] ⟳ started"), "stdout: {stdout}");
    assert!(stdout.contains("[sub] ✓ completed"), "stdout: {stdout}");
    assert!(stdout.contains("[z] ✓ completed"), "stdout: {stdout}");
    Ok(())
}

#[test]
fn failing_reexecuted_member_fails_the_batch() -> TestResult {
    let dir = tempdir()?;
    let config = write_config(
        dir.path(),
        r#"
[config]
nested_isolation = "process"

[task.bad]
command = "echo broken; exit 3"

[task.sub]
tasks = ["bad"]

[task.all]
type = "batch"
tasks = ["sub"]
parallel = true
"#,
    );

    let output = taskweave(&config, "all").output()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("[sub] ✕ failed"), "stdout: {stdout}");
    Ok(())
}

#[test]
fn terminating_the_parent_reaches_grandchildren_that_ignore_sigterm() -> TestResult {
    let dir = tempdir()?;
    let pidfile = dir.path().join("stubborn.pid");
    let config = write_config(
        dir.path(),
        &format!(
            r#"
[config]
nested_isolation = "process"
grace_period_ms = 300

[task.stubborn]
command = "trap '' TERM; echo $$ > '{}'; exec sleep 30"

[task.wrap]
tasks = ["stubborn"]

[task.all]
type = "batch"
tasks = ["wrap"]
parallel = true
"#,
            pidfile.display()
        ),
    );

    let mut parent = taskweave(&config, "all")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let mut grandchild = None;
    let started = wait_until(Duration::from_secs(10), || {
        grandchild = std::fs::read_to_string(&pidfile)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok());
        grandchild.is_some()
    });
    let Some(grandchild) = grandchild.filter(|_| started) else {
        let _ = parent.kill();
        return Err("nested task never started".into());
    };
    // Let the shell's `exec` replace it before signalling.
    std::thread::sleep(Duration::from_millis(200));

    // SAFETY: kill takes plain integers; the pid is our own child.
    assert_eq!(unsafe { libc::kill(parent.id() as i32, libc::SIGTERM) }, 0);

    let mut exited = None;
    let finished = wait_until(Duration::from_secs(10), || {
        exited = parent.try_wait().ok().flatten();
        exited.is_some()
    });
    if !finished {
        let _ = parent.kill();
    }
    assert!(finished, "parent did not exit after SIGTERM");
    assert!(exited.is_some_and(|status| !status.success()));

    assert!(
        wait_until(Duration::from_secs(3), || !process_alive(grandchild)),
        "grandchild {grandchild} survived cancellation"
    );
    Ok(())
}

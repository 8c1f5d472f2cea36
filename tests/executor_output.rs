#![cfg(unix)]

mod common;
use crate::common::{fast_settings, init_tracing, with_timeout};

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use taskweave::errors::TaskweaveError;
use taskweave::exec::output::decode_line;
use taskweave::exec::{ExecContext, Executor, LineSink, ProcessOutcome, render_command};
use taskweave::types::RenderMode;
use taskweave_test_utils::atomic_definition;

type TestResult = Result<(), Box<dyn Error>>;

fn executor() -> Executor {
    Executor::from_settings(&fast_settings())
}

fn collecting_sink() -> (LineSink, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = Arc::clone(&lines);
    let sink: LineSink = Arc::new(move |line: &str| sink_lines.lock().unwrap().push(line.to_string()));
    (sink, lines)
}

#[tokio::test]
async fn echo_round_trip_captures_exact_output() -> TestResult {
    init_tracing();
    let def = atomic_definition("echo", "echo fixed-string");
    let ctx = ExecContext::new(RenderMode::Silent, CancellationToken::new());

    let result = executor().execute(&def, "echo fixed-string", &ctx).await?;

    assert!(result.success());
    assert_eq!(result.output(), "fixed-string\n");
    assert_eq!(result.id(), "echo");
    assert!(result.error().is_none());
    Ok(())
}

#[tokio::test]
async fn failure_keeps_full_merged_output() -> TestResult {
    let cmd = "for i in 1 2 3 4 5 6 7 8; do echo out-$i; done; echo oops 1>&2; exit 4";
    let def = atomic_definition("bad", cmd);
    let ctx = ExecContext::new(RenderMode::Silent, CancellationToken::new());

    let result = executor().execute(&def, cmd, &ctx).await?;

    assert_eq!(result.outcome(), ProcessOutcome::Failed(4));
    let lines: Vec<_> = result.output().lines().collect();
    assert_eq!(lines.len(), 9, "tail size must not limit the full buffer");
    assert!(lines.contains(&"out-1"));
    assert!(lines.contains(&"out-8"));
    assert!(lines.contains(&"oops"));
    assert!(matches!(
        result.into_error(),
        Some(TaskweaveError::TaskFailed { code: 4, .. })
    ));
    Ok(())
}

#[tokio::test]
async fn lines_are_forwarded_to_the_sink_in_order() -> TestResult {
    let (sink, lines) = collecting_sink();
    let def = atomic_definition("fwd", "");
    let ctx = ExecContext::new(RenderMode::Silent, CancellationToken::new()).with_forward(Some(sink));

    executor().execute(&def, "echo one; echo two; echo three", &ctx).await?;

    assert_eq!(*lines.lock().unwrap(), vec!["one", "two", "three"]);
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_output_is_kept_and_reading_continues() -> TestResult {
    let cmd = r"printf 'caf\351\n'; sleep 0.3; echo after; echo after2";
    let def = atomic_definition("latin1", cmd);
    let ctx = ExecContext::new(RenderMode::Silent, CancellationToken::new());

    let result = with_timeout(executor().execute(&def, cmd, &ctx)).await?;

    assert_eq!(result.outcome(), ProcessOutcome::Success);
    assert_eq!(result.output(), "caf\u{FFFD}\nafter\nafter2\n");
    Ok(())
}

#[test]
fn decode_line_strips_terminators_and_replaces_bad_bytes() {
    assert_eq!(decode_line(b"plain\n"), "plain");
    assert_eq!(decode_line(b"crlf\r\n"), "crlf");
    assert_eq!(decode_line(b"no newline"), "no newline");
    assert_eq!(decode_line(b"caf\xe9\n"), "caf\u{FFFD}");
}

#[tokio::test]
async fn runs_in_the_task_working_directory() -> TestResult {
    let dir = tempdir()?;
    let mut def = atomic_definition("pwd", "pwd -P");
    def.cwd = Some(dir.path().to_path_buf());
    let ctx = ExecContext::new(RenderMode::Silent, CancellationToken::new());

    let result = executor().execute(&def, "pwd -P", &ctx).await?;

    let expected = dir.path().canonicalize()?;
    assert_eq!(result.output().trim(), expected.to_string_lossy());
    Ok(())
}

#[tokio::test]
async fn cancellation_is_reported_distinctly() -> TestResult {
    init_tracing();
    let token = CancellationToken::new();
    let def = atomic_definition("slow", "sleep 30");
    let ctx = ExecContext::new(RenderMode::Silent, token.clone());

    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
    });

    let started = Instant::now();
    let result = with_timeout(executor().execute(&def, "echo started; sleep 30", &ctx)).await?;

    assert_eq!(result.outcome(), ProcessOutcome::Cancelled);
    assert!(!result.success());
    assert_eq!(result.error(), Some("cancelled"));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.into_error().is_some_and(|e| e.is_cancellation()));
    Ok(())
}

#[tokio::test]
async fn background_grandchild_holding_pipes_does_not_hang() -> TestResult {
    let def = atomic_definition("bg", "");
    let ctx = ExecContext::new(RenderMode::Silent, CancellationToken::new());

    let started = Instant::now();
    let result = with_timeout(executor().execute(&def, "sleep 3 & echo done", &ctx)).await?;

    assert!(result.success());
    assert!(result.output().contains("done"));
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

#[tokio::test]
async fn plain_mode_runs_and_reports_without_a_terminal() -> TestResult {
    let def = atomic_definition("plain", "");
    let ctx = ExecContext::new(RenderMode::Plain, CancellationToken::new());

    let ok = executor().execute(&def, "echo plain-ok", &ctx).await?;
    assert!(ok.success());

    let bad = executor().execute(&def, "echo plain-bad; exit 1", &ctx).await?;
    assert_eq!(bad.outcome(), ProcessOutcome::Failed(1));
    assert_eq!(bad.output(), "plain-bad\n");
    Ok(())
}

#[test]
fn templates_expand_against_caller_data_only() -> TestResult {
    let data = json!({ "env": "prod", "region": { "name": "eu" } });

    assert_eq!(
        render_command("deploy", "deploy --env {{ env }} --region {{ region.name }}", Some(&data))?,
        "deploy --env prod --region eu"
    );

    // Without data the string is handed through untouched.
    assert_eq!(
        render_command("deploy", "awk '{{print $1}}'", None)?,
        "awk '{{print $1}}'"
    );
    assert_eq!(render_command("deploy", "", Some(&data))?, "");

    let err = render_command("deploy", "deploy {{ env ", Some(&data)).unwrap_err();
    assert!(matches!(err, TaskweaveError::Template { ref task, .. } if task == "deploy"));
    assert!(err.is_configuration());
    Ok(())
}

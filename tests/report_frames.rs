mod common;
use crate::common::{SharedBuffer, init_tracing, with_timeout};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use taskweave::engine::{TaskSnapshot, TaskState, TaskStatus};
use taskweave::report::style::{elapsed_column, status_line, summary_line, tail_line};
use taskweave::report::{FrameWriter, LiveStatusReporter, Tone, boxed, render_frame, strip_ansi};

fn snap(name: &str, status: TaskStatus, tail: &[&str]) -> TaskSnapshot {
    TaskSnapshot {
        name: name.to_string(),
        status,
        elapsed: Some(Duration::from_millis(1500)),
        tail: tail.iter().map(|s| s.to_string()).collect(),
    }
}

/// Count "cursor up" escape sequences (ESC [ 1 A).
fn cursor_ups(s: &str) -> usize {
    s.matches("\x1b[1A").count()
}

#[test]
fn frame_writer_erases_exactly_the_previous_frame() {
    let mut out: Vec<u8> = Vec::new();
    let mut frame = FrameWriter::new();

    frame.draw(&mut out, &["a".to_string(), "b".to_string(), "c".to_string()]).unwrap();
    assert_eq!(frame.lines_drawn(), 3);
    assert_eq!(cursor_ups(&String::from_utf8_lossy(&out)), 0, "first frame erases nothing");

    out.clear();
    frame.draw(&mut out, &["x".to_string()]).unwrap();
    let text = String::from_utf8_lossy(&out).into_owned();
    assert_eq!(cursor_ups(&text), 3);
    assert!(text.ends_with("x\n"));
    assert_eq!(frame.lines_drawn(), 1);

    out.clear();
    frame.draw(&mut out, &["p".to_string(), "q".to_string()]).unwrap();
    assert_eq!(cursor_ups(&String::from_utf8_lossy(&out)), 1);

    out.clear();
    frame.clear(&mut out).unwrap();
    assert_eq!(cursor_ups(&String::from_utf8_lossy(&out)), 2);
    assert_eq!(frame.lines_drawn(), 0);
}

#[test]
fn status_line_pads_names_and_formats_elapsed() {
    let line = strip_ansi(&status_line(&snap("lint", TaskStatus::Completed, &[]), 0));
    assert!(line.contains(&format!("lint {} ", ".".repeat(34))), "{line}");
    assert!(line.contains("✅"));
    assert!(line.ends_with("  1.5s"), "{line}");

    let queued = strip_ansi(&status_line(&snap("build", TaskStatus::Queued, &[]), 0));
    assert!(queued.contains("🕒"));
    assert!(queued.ends_with("--.-s"));

    let long_name = "x".repeat(50);
    let line = strip_ansi(&status_line(&snap(&long_name, TaskStatus::Failed, &[]), 0));
    assert!(line.contains(&format!("{long_name} ..")));
    assert!(line.contains("❌"));
}

#[test]
fn elapsed_column_hides_durations_of_unstarted_and_cancelled_tasks() {
    let d = Some(Duration::from_millis(12_340));
    assert_eq!(elapsed_column(TaskStatus::Completed, d), " 12.3s");
    assert_eq!(elapsed_column(TaskStatus::Active, Some(Duration::from_millis(200))), "  0.2s");
    assert_eq!(elapsed_column(TaskStatus::Cancelled, d), "  --.-s");
    assert_eq!(elapsed_column(TaskStatus::Queued, None), "  --.-s");
}

#[test]
fn tail_lines_are_stripped_and_truncated() {
    let colored = "\x1b[31merror\x1b[0m: boom";
    assert_eq!(strip_ansi(&tail_line(colored)), "  │ error: boom");

    let long = "y".repeat(120);
    let line = strip_ansi(&tail_line(&long));
    assert_eq!(line, format!("  │ {}...", "y".repeat(82)));
}

#[test]
fn render_frame_shows_tails_under_active_rows_only() {
    let snaps = vec![
        snap("a", TaskStatus::Active, &["a1", "a2"]),
        snap("b", TaskStatus::Completed, &["stale"]),
        snap("c", TaskStatus::Queued, &[]),
    ];

    let lines = render_frame(&snaps, 3, true);
    assert_eq!(lines.len(), 5);
    assert_eq!(strip_ansi(&lines[1]), "  │ a1");
    assert_eq!(strip_ansi(&lines[2]), "  │ a2");

    let quiet = render_frame(&snaps, 3, false);
    assert_eq!(quiet.len(), 3);
}

#[test]
fn boxed_output_frames_every_line() {
    let text = strip_ansi(&boxed("Failure Log: lint", "line one\nline two\n", Tone::Failure));
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("Failure Log: lint"));
    assert_eq!(lines[1], "  │ line one");
    assert_eq!(lines[2], "  │ line two");
    assert!(lines[3].starts_with("  └"));
}

#[test]
fn summary_line_lists_counts_and_wall_time() {
    let ok = strip_ansi(&summary_line(3, 0, 3, Duration::from_millis(2500)));
    assert_eq!(ok, "  ● 3 completed | ● 3 total | ⏱ 2.5s");

    let failed = strip_ansi(&summary_line(1, 1, 3, Duration::from_millis(400)));
    assert_eq!(failed, "  ● 1 completed | ● 1 failed | ● 3 total | ⏱ 0.4s");
}

#[tokio::test]
async fn live_reporter_draws_final_state_after_finish() {
    init_tracing();
    let state = Arc::new(Mutex::new(TaskState::new("build", "Build", 5)));
    state.lock().unwrap().start(Instant::now());
    state.lock().unwrap().push_tail("compiling");

    let buffer = SharedBuffer::new();
    let reporter = LiveStatusReporter::spawn(
        state.clone(),
        Duration::from_millis(10),
        true,
        Box::new(buffer.clone()),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(strip_ansi(&buffer.contents()).contains("│ compiling"));

    // Finish right before stopping: the final frame must still show it.
    state
        .lock()
        .unwrap()
        .finish(TaskStatus::Completed, Instant::now());
    with_timeout(reporter.finish()).await;

    let out = strip_ansi(&buffer.contents());
    let last_frame = out.lines().last().unwrap_or_default().to_string();
    assert!(last_frame.contains("Build"), "{last_frame}");
    assert!(last_frame.contains("✅"), "{last_frame}");
}

#[test]
fn plain_lines_carry_the_task_name_and_outcome() {
    use taskweave::exec::ProcessOutcome;
    use taskweave::report::plain::{pipeline_started, task_finished, task_started};

    assert_eq!(pipeline_started("CI"), "[CI] ⟳ pipeline");
    assert_eq!(task_started("lint"), "[lint] ⟳ started");
    assert_eq!(
        task_finished("lint", ProcessOutcome::Success, Duration::from_millis(1300)),
        "[lint] ✓ completed in 1.3s"
    );
    assert_eq!(
        task_finished("lint", ProcessOutcome::Failed(2), Duration::from_millis(300)),
        "[lint] ✕ failed with exit code 2 after 0.3s"
    );
    assert!(task_finished("lint", ProcessOutcome::Cancelled, Duration::ZERO).contains("cancelled"));
}

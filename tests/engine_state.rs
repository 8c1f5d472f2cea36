mod common;

use std::time::{Duration, Instant};

use taskweave::engine::{QueueBoard, StartDecision, TaskState, TaskStatus, VisitedSet};
use taskweave::exec::{ProcessOutcome, TailBuffer, TaskResult};

fn result(id: &str, outcome: ProcessOutcome) -> TaskResult {
    TaskResult::from_outcome(id, outcome, String::new(), Duration::from_millis(5))
}

#[test]
fn task_state_moves_queued_active_terminal() {
    let t0 = Instant::now();
    let mut state = TaskState::new("lint", "Lint", 3);
    assert_eq!(state.status(), TaskStatus::Queued);
    assert_eq!(state.elapsed(t0), None);

    assert!(state.start(t0));
    assert_eq!(state.status(), TaskStatus::Active);
    assert!(!state.start(t0), "an active task cannot start again");
    assert_eq!(
        state.elapsed(t0 + Duration::from_millis(40)),
        Some(Duration::from_millis(40))
    );

    assert!(state.finish(TaskStatus::Completed, t0 + Duration::from_millis(100)));
    assert_eq!(state.status(), TaskStatus::Completed);
    // Frozen once terminal.
    assert_eq!(
        state.elapsed(t0 + Duration::from_secs(10)),
        Some(Duration::from_millis(100))
    );
}

#[test]
fn terminal_states_are_sticky() {
    let now = Instant::now();
    let mut state = TaskState::new("a", "a", 2);
    state.start(now);
    assert!(state.finish(TaskStatus::Failed, now));

    assert!(!state.finish(TaskStatus::Completed, now));
    assert!(!state.cancel(now));
    assert!(!state.start(now));
    assert_eq!(state.status(), TaskStatus::Failed);

    let mut state = TaskState::new("b", "b", 2);
    assert!(!state.finish(TaskStatus::Active, now), "Active is not terminal");
    assert!(state.cancel(now));
    assert_eq!(state.status(), TaskStatus::Cancelled);
    assert_eq!(state.elapsed(now), None, "never started");
}

#[test]
fn tail_only_fills_while_active_and_clears_on_finish() {
    let now = Instant::now();
    let mut state = TaskState::new("a", "a", 2);

    state.push_tail("before start");
    assert!(state.tail().is_empty());

    state.start(now);
    for line in ["one", "two", "three"] {
        state.push_tail(line);
    }
    assert_eq!(state.tail().to_vec(), vec!["two", "three"]);
    assert_eq!(state.snapshot(now).tail, vec!["two", "three"]);

    state.finish(TaskStatus::Completed, now);
    assert!(state.tail().is_empty());
    state.push_tail("after finish");
    assert!(state.tail().is_empty());
}

#[test]
fn tail_buffer_keeps_latest_lines_within_capacity() {
    let mut tail = TailBuffer::new(5);
    for i in 0..12 {
        tail.push(format!("line {i}"));
        assert!(tail.len() <= 5);
    }
    assert_eq!(
        tail.iter().collect::<Vec<_>>(),
        vec!["line 7", "line 8", "line 9", "line 10", "line 11"]
    );

    let mut none = TailBuffer::new(0);
    none.push("dropped");
    assert!(none.is_empty());
}

#[test]
fn board_cancels_queued_members_after_failure_without_continue_on_error() {
    let now = Instant::now();
    let mut board = QueueBoard::new([("ok", "ok"), ("bad", "bad"), ("ok2", "ok2")], 5, false);

    assert_eq!(board.try_start(0, false, now), StartDecision::Start);
    board.record(0, result("ok", ProcessOutcome::Success), now);
    assert!(!board.failed());

    assert_eq!(board.try_start(1, false, now), StartDecision::Start);
    board.record(1, result("bad", ProcessOutcome::Failed(2)), now);
    assert!(board.failed());

    assert_eq!(board.try_start(2, false, now), StartDecision::SkipAfterFailure);

    let report = board.report(Duration::from_millis(10));
    assert_eq!(report.status_of("ok"), Some(TaskStatus::Completed));
    assert_eq!(report.status_of("bad"), Some(TaskStatus::Failed));
    assert_eq!(report.status_of("ok2"), Some(TaskStatus::Cancelled));
    assert_eq!(report.attempted(), 2);
    assert!(!report.is_success());
}

#[test]
fn board_keeps_starting_members_with_continue_on_error() {
    let now = Instant::now();
    let mut board = QueueBoard::new([("bad", "bad"), ("ok", "ok")], 5, true);

    board.try_start(0, false, now);
    board.record(0, result("bad", ProcessOutcome::Failed(1)), now);

    assert_eq!(board.try_start(1, false, now), StartDecision::Start);
    board.record(1, result("ok", ProcessOutcome::Success), now);

    let report = board.report(Duration::ZERO);
    assert_eq!(report.completed(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.attempted(), 2);
}

#[test]
fn board_never_starts_after_cancellation_and_sweeps_leftovers() {
    let now = Instant::now();
    let mut board = QueueBoard::new([("a", "a"), ("b", "b"), ("c", "c")], 5, true);

    assert_eq!(board.try_start(0, false, now), StartDecision::Start);
    assert_eq!(board.try_start(1, true, now), StartDecision::SkipCancelled);
    assert_eq!(board.state(1).map(|s| s.status()), Some(TaskStatus::Cancelled));

    // A cancelled member does not raise the failed flag.
    board.record(0, result("a", ProcessOutcome::Cancelled), now);
    assert!(!board.failed());

    assert_eq!(board.cancel_remaining(now), 1);
    assert!(board.states().iter().all(|s| s.status() == TaskStatus::Cancelled));
    assert_eq!(board.report(Duration::ZERO).attempted(), 1);
}

#[test]
fn board_never_starts_a_member_twice() {
    let now = Instant::now();
    let mut board = QueueBoard::new([("a", "a")], 5, true);
    assert_eq!(board.try_start(0, false, now), StartDecision::Start);
    assert_ne!(board.try_start(0, false, now), StartDecision::Start);
}

#[test]
fn visited_set_reports_first_insertion_only() {
    let mut visited = VisitedSet::new();
    assert!(visited.is_empty());
    assert!(visited.insert("setup"));
    assert!(!visited.insert("setup"));
    assert!(visited.contains("setup"));
    assert!(!visited.contains("lint"));
    assert_eq!(visited.len(), 1);
}

#[test]
fn task_result_classifies_outcomes() {
    let ok = result("a", ProcessOutcome::Success);
    assert!(ok.success());
    assert!(ok.error().is_none());
    assert!(ok.into_error().is_none());

    let failed = result("b", ProcessOutcome::Failed(3));
    assert!(!failed.success());
    assert_eq!(failed.error(), Some("command exited with status 3"));
    let err = failed.into_error().unwrap();
    assert!(matches!(err, taskweave::errors::TaskweaveError::TaskFailed { code: 3, .. }));

    let cancelled = result("c", ProcessOutcome::Cancelled);
    assert!(cancelled.into_error().unwrap().is_cancellation());
}

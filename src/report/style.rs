// src/report/style.rs

//! Text formatting shared by the live and plain renderers.

use std::sync::LazyLock;
use std::time::Duration;

use crossterm::style::Stylize;
use regex::Regex;

use crate::engine::state::{TaskSnapshot, TaskStatus};

/// Braille spinner frames for active rows.
pub const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Column the status glyph is aligned to.
const NAME_COLUMN: usize = 38;

/// Tail lines wider than this are truncated with `...`.
const TAIL_WIDTH: usize = 85;

static ANSI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07]*\x07")
        .expect("ANSI escape pattern is valid")
});

/// Remove terminal escape sequences from `s`.
pub fn strip_ansi(s: &str) -> String {
    ANSI_RE.replace_all(s, "").into_owned()
}

pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER[tick % SPINNER.len()]
}

/// Elapsed column: `%5.1fs`, or a placeholder for tasks without a
/// meaningful duration.
pub fn elapsed_column(status: TaskStatus, elapsed: Option<Duration>) -> String {
    match (status, elapsed) {
        (TaskStatus::Queued | TaskStatus::Cancelled, _) | (_, None) => "  --.-s".to_string(),
        (_, Some(d)) => format!("{:5.1}s", d.as_secs_f64()),
    }
}

/// One status row: icon, dotted name, status glyph and elapsed time.
pub fn status_line(snap: &TaskSnapshot, tick: usize) -> String {
    let pad = NAME_COLUMN
        .saturating_sub(snap.name.chars().count())
        .max(2);
    let dots = ".".repeat(pad).dark_grey();
    let elapsed = elapsed_column(snap.status, snap.elapsed);

    let (icon, glyph, elapsed) = match snap.status {
        TaskStatus::Completed => ("•".green(), "✅".green().bold(), elapsed.stylize()),
        TaskStatus::Failed => ("•".red(), "❌".red().bold(), elapsed.stylize()),
        TaskStatus::Active => (
            spinner_frame(tick).blue(),
            "⏳".blue().bold(),
            elapsed.stylize(),
        ),
        TaskStatus::Cancelled => ("•".dark_grey(), "⛔".dark_grey(), elapsed.dark_grey()),
        TaskStatus::Queued => ("○".dark_grey(), "🕒".dark_grey(), elapsed.dark_grey()),
    };

    format!(" {icon}  {} {dots} {glyph}   {elapsed}", snap.name)
}

/// One indented, ANSI-free output line under an active row.
pub fn tail_line(line: &str) -> String {
    let clean = strip_ansi(line);
    let clean = if clean.chars().count() > TAIL_WIDTH {
        let mut cut: String = clean.chars().take(TAIL_WIDTH - 3).collect();
        cut.push_str("...");
        cut
    } else {
        clean
    };
    format!("  │ {clean}").dark_grey().to_string()
}

/// Border colour of a [`boxed`] block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Failure,
}

/// Frame `content` in a titled box.
pub fn boxed(title: &str, content: &str, tone: Tone) -> String {
    let paint = |s: String| match tone {
        Tone::Info => s.cyan().to_string(),
        Tone::Failure => s.red().to_string(),
    };

    let rule = "─".repeat(NAME_COLUMN.saturating_sub(title.chars().count()).max(4));
    let mut out = String::new();
    out.push_str(&paint(format!("  ┌─ {title} {rule}")));
    out.push('\n');
    for line in content.trim_end_matches('\n').lines() {
        out.push_str(&paint("  │ ".to_string()));
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&paint(format!("  └{}", "─".repeat(title.chars().count() + rule.chars().count() + 3))));
    out.push('\n');
    out
}

/// End-of-batch summary row.
pub fn summary_line(completed: usize, failed: usize, total: usize, wall: Duration) -> String {
    let mut out = format!("  {} {completed} completed", "●".green());
    if failed > 0 {
        out.push_str(&format!(" | {} {failed} failed", "●".red()));
    }
    out.push_str(&format!(
        " | {} {total} total | {} {:.1}s",
        "●".blue(),
        "⏱".dark_grey(),
        wall.as_secs_f64()
    ));
    out
}

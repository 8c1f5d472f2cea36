// src/report/mod.rs

//! Terminal presentation of task progress.
//!
//! - [`live`] redraws a status frame on a fixed tick.
//! - [`frame`] tracks and erases the previously drawn frame.
//! - [`style`] formats rows, tails, boxes and summaries.
//! - [`plain`] formats prefixed log lines for nested and non-TTY runs.

pub mod frame;
pub mod live;
pub mod plain;
pub mod style;

pub use frame::FrameWriter;
pub use live::{LiveStatusReporter, StatusSource, render_frame};
pub use style::{Tone, boxed, strip_ansi};

// src/report/frame.rs

use std::io::{self, Write};

use crossterm::cursor::MoveUp;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

/// Redraws a block of lines in place.
///
/// Remembers how many lines the previous frame occupied and erases exactly
/// that many (cursor up + clear line, once per line) before drawing the next
/// one. Frames may grow or shrink as tails appear and disappear.
#[derive(Debug, Default)]
pub struct FrameWriter {
    lines_drawn: usize,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines the last frame occupied.
    pub fn lines_drawn(&self) -> usize {
        self.lines_drawn
    }

    /// Erase the previous frame and draw `lines`.
    pub fn draw<W: Write>(&mut self, out: &mut W, lines: &[String]) -> io::Result<()> {
        self.erase(out)?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        self.lines_drawn = lines.len();
        out.flush()
    }

    /// Erase the previous frame without drawing a new one.
    pub fn clear<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        self.erase(out)?;
        self.lines_drawn = 0;
        out.flush()
    }

    fn erase<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for _ in 0..self.lines_drawn {
            queue!(out, MoveUp(1), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }
}

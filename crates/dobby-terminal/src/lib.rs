//! Terminal abstraction: raw mode, cursor motion, ANSI style generation, and
//! key decoding (spec §1 "external collaborators", kept thin per §10 of
//! `SPEC_FULL.md`).

pub mod capabilities;
pub mod key;
pub mod style;

pub use capabilities::{AnsiMode, Capabilities};
pub use key::{TermEvent, TermKey};

use anyhow::Result;
use crossterm::event::EventStream;
use crossterm::{cursor, execute, terminal};
use std::io::{stdout, Write};
use tokio_stream::StreamExt;

/// Owns raw-mode state and the async crossterm event stream. Entering and
/// leaving are idempotent and mirrored by `Drop` so a panic or early return
/// still restores the terminal (the same discipline as the backend's
/// `enter`/`leave`/`Drop` trio in the teacher's terminal crate).
pub struct Terminal {
    entered: bool,
    events: EventStream,
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal {
    pub fn new() -> Self {
        Self {
            entered: false,
            events: EventStream::new(),
        }
    }

    pub fn enter(&mut self) -> Result<()> {
        if !self.entered {
            terminal::enable_raw_mode()?;
            execute!(stdout(), cursor::Hide)?;
            self.entered = true;
        }
        Ok(())
    }

    pub fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), cursor::Show)?;
            terminal::disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    pub fn size(&self) -> Result<(u16, u16)> {
        Ok(terminal::size()?)
    }

    /// Awaits the next terminal event, decoded into the engine's four-way
    /// shape. `Ok(None)` means the underlying stream closed (stdin EOF).
    pub async fn next_event(&mut self) -> Result<Option<TermEvent>> {
        match self.events.next().await {
            Some(Ok(ev)) => Ok(Some(key::decode(ev))),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Redraws one full terminal row at an absolute position. The renderer
    /// calls this once per drawdown row and once for the prompt line.
    pub fn write_row(&self, row: u16, text: &str) -> Result<()> {
        let mut out = stdout();
        execute!(
            out,
            cursor::MoveTo(0, row),
            terminal::Clear(terminal::ClearType::CurrentLine)
        )?;
        write!(out, "{text}")?;
        out.flush()?;
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

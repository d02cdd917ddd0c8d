//! The interactive read-dispatch loop.
//!
//! Lines come from a `LineReader` (a `rustyline` editor in the binary, scripted
//! input in tests). Each non-empty line is dispatched against the shared session
//! under its lock, so exactly one command runs at a time and shutdown can never
//! interleave with a command in progress.

use super::session::{Reply, Session};
use crate::db::Backend;
use crate::error::Result;
use crate::logger::Logger;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

const PROMPT: &str = "> ";

/// One result of asking the reader for input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadEvent {
    Line(String),
    /// The input stream ended (Ctrl-D).
    Eof,
    /// The user pressed Ctrl-C at the prompt.
    Interrupted,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    EndOfInput,
    Interrupted,
    ExitCommand,
    /// The stop flag was raised from outside the loop.
    Stopped,
}

/// A blocking source of input lines.
pub trait LineReader {
    fn read_line(&mut self) -> Result<ReadEvent>;
}

/// `rustyline`-backed reader with in-memory history, optionally persisted to a file.
pub struct RustylineReader {
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl RustylineReader {
    pub fn new(history: Option<PathBuf>) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if let Some(path) = &history {
            // A missing history file is normal on first run.
            if let Err(e) = editor.load_history(path) {
                debug!("No history loaded from {}: {}", path.display(), e);
            }
        }
        Ok(Self { editor, history })
    }

    /// Adds `line` to the history and writes the history file straight away, so nothing
    /// is lost if the process ends while the editor is still waiting for input.
    fn remember(&mut self, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        self.editor.add_history_entry(line)?;
        if let Some(path) = &self.history {
            if let Err(e) = self.editor.save_history(path) {
                warn!("Failed to save history to {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

impl LineReader for RustylineReader {
    fn read_line(&mut self) -> Result<ReadEvent> {
        match self.editor.readline(PROMPT) {
            Ok(line) => {
                self.remember(&line)?;
                Ok(ReadEvent::Line(line))
            },
            Err(ReadlineError::Eof) => Ok(ReadEvent::Eof),
            Err(ReadlineError::Interrupted) => Ok(ReadEvent::Interrupted),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reads and dispatches lines until end of input, an interrupt, `exit`, or `stop` is raised.
///
/// Command failures are reported through the logger's warning level and the loop continues.
///
/// # Errors
///
/// Only a failure of the reader itself ends the loop with an error.
pub fn run_loop<B, R>(
    session: &Mutex<Session<B>>,
    reader: &mut R,
    stop: &AtomicBool,
    logger: &Logger,
) -> Result<LoopExit>
where
    B: Backend,
    R: LineReader + ?Sized,
{
    loop {
        if stop.load(Ordering::SeqCst) {
            return Ok(LoopExit::Stopped);
        }

        let line = match reader.read_line()? {
            ReadEvent::Line(line) => line,
            ReadEvent::Eof => return Ok(LoopExit::EndOfInput),
            ReadEvent::Interrupted => return Ok(LoopExit::Interrupted),
        };

        // The stop flag may have been raised while blocked on input.
        if stop.load(Ordering::SeqCst) {
            return Ok(LoopExit::Stopped);
        }
        if line.trim().is_empty() {
            continue;
        }

        let outcome = session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispatch(&line);

        match outcome {
            Ok(Reply::Silent) => {},
            Ok(Reply::Text(text)) => println!("{}", text),
            Ok(Reply::Exit) => {
                println!("{}", "Exiting PolarysDB CLI. Goodbye!".green());
                return Ok(LoopExit::ExitCommand);
            },
            Err(e) => logger.warn(format!("Error: {}", e)),
        }
    }
}

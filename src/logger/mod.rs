//! Process-wide leveled session logger.
//!
//! A `Logger` is built from an immutable `LoggerConfig` and shared behind an `Arc`
//! between the interactive loop and the shutdown path. Sinks (console, file, or
//! both) are constructed exactly once, on the first `init` or log call, no matter
//! how many threads race to get there. Each record is formatted into a single line
//! `<TAG>: YYYY/MM/DD HH:MM:SS <message>` and written whole to every active sink.
//! Console tags are coloured only when `colored` detects a terminal; file lines
//! always carry the ANSI-coloured tag.

mod level;

pub use level::*;

use crate::error::{AppError, Result};
use chrono::Local;
use once_cell::sync::OnceCell;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

/// Logger configuration. Supplied once at construction; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    /// Path to the log file. Required when `to_file` is set.
    pub file_path: Option<PathBuf>,
    /// Records below this level produce no output.
    pub min_level: Level,
    pub to_console: bool,
    pub to_file: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            file_path: None,
            min_level: Level::Info,
            to_console: true,
            to_file: false,
        }
    }
}

/// Console destinations handed to the logger when its sinks are built.
pub(crate) struct ConsoleStreams {
    pub out: Box<dyn Write + Send>,
    pub err: Box<dyn Write + Send>,
}

type ConsoleFactory = Box<dyn Fn() -> ConsoleStreams + Send + Sync>;

struct FileSink {
    writer: NonBlocking,
    // Dropping the guard flushes pending lines and stops the writer thread.
    _guard: WorkerGuard,
}

struct Sinks {
    out: Option<Mutex<Box<dyn Write + Send>>>,
    err: Option<Mutex<Box<dyn Write + Send>>>,
    file: Mutex<Option<FileSink>>,
}

impl Sinks {
    fn build(config: &LoggerConfig, console: &ConsoleFactory) -> Result<Self> {
        let file = if config.to_file {
            let path = config.file_path.as_ref().ok_or_else(|| {
                AppError::Logger("file sink enabled but no log file path configured".to_string())
            })?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::Logger(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
            let handle = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    AppError::Logger(format!("failed to open log file {}: {}", path.display(), e))
                })?;
            let (writer, guard) = NonBlockingBuilder::default().lossy(false).finish(handle);
            Some(FileSink {
                writer,
                _guard: guard,
            })
        } else {
            None
        };

        let (out, err) = if config.to_console {
            let streams = console();
            (Some(Mutex::new(streams.out)), Some(Mutex::new(streams.err)))
        } else {
            (None, None)
        };

        Ok(Self {
            out,
            err,
            file: Mutex::new(file),
        })
    }

    fn write(&self, level: Level, message: &str) {
        let stamp = timestamp();
        let line = format_record(level.tag(), &stamp, message);
        let console = if level.uses_stderr() {
            &self.err
        } else {
            &self.out
        };
        if let Some(stream) = console {
            let mut stream = stream.lock().unwrap_or_else(PoisonError::into_inner);
            // A console that cannot be written to has nowhere to report the failure.
            let _ = stream.write_all(line.as_bytes()).and_then(|_| stream.flush());
        }

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = file.as_mut() {
            let line = format_record(level.file_tag(), &stamp, message);
            if let Err(e) = sink.writer.write_all(line.as_bytes()) {
                eprintln!("failed to write to log file: {}", e);
            }
        }
    }
}

/// Leveled logger with console and file sinks.
pub struct Logger {
    config: LoggerConfig,
    console: ConsoleFactory,
    sinks: OnceCell<Sinks>,
}

impl Logger {
    /// Creates a logger writing to the process stdout/stderr. No sink is built until `init`.
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_console(config, || ConsoleStreams {
            out: Box::new(io::stdout()),
            err: Box::new(io::stderr()),
        })
    }

    pub(crate) fn with_console<F>(config: LoggerConfig, console: F) -> Self
    where
        F: Fn() -> ConsoleStreams + Send + Sync + 'static,
    {
        Self {
            config,
            console: Box::new(console),
            sinks: OnceCell::new(),
        }
    }

    /// Builds the sinks. Only the first successful call does any work; later calls are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Logger` if the log file cannot be opened.
    pub fn init(&self) -> Result<()> {
        self.sinks().map(|_| ())
    }

    fn sinks(&self) -> Result<&Sinks> {
        self.sinks
            .get_or_try_init(|| Sinks::build(&self.config, &self.console))
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.emit(Level::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.emit(Level::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.emit(Level::Error, message.as_ref());
    }

    /// Logs at `Fatal`, closes the logger and terminates the process with status 1.
    pub fn fatal(&self, message: impl AsRef<str>) -> ! {
        self.emit(Level::Fatal, message.as_ref());
        self.close();
        std::process::exit(1)
    }

    fn emit(&self, level: Level, message: &str) {
        if level < self.config.min_level {
            return;
        }
        match self.sinks() {
            Ok(sinks) => sinks.write(level, message),
            Err(e) => eprintln!("{} ({})", format_record(level.tag(), &timestamp(), message).trim_end(), e),
        }
    }

    /// Flushes and releases the file sink. Safe to call without a file sink and more than once.
    pub fn close(&self) {
        let Some(sinks) = self.sinks.get() else {
            return;
        };
        for stream in [&sinks.out, &sinks.err].into_iter().flatten() {
            let _ = stream.lock().unwrap_or_else(PoisonError::into_inner).flush();
        }
        let released = sinks
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(released);
    }
}

fn timestamp() -> String {
    Local::now().format("%Y/%m/%d %H:%M:%S").to_string()
}

fn format_record(tag: impl fmt::Display, stamp: &str, message: &str) -> String {
    format!("{} {} {}\n", tag, stamp, message)
}

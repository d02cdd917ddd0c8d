use clap::ValueEnum;
use colored::{Color, ColoredString, Colorize};
use std::fmt;
use std::str::FromStr;

/// Severity of a session log record. Ordered: `Info < Warn < Error < Fatal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum Level {
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Level::Info => Color::Blue,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
            Level::Fatal => Color::Magenta,
        }
    }

    /// The `INFO:`-style console prefix. Colour follows `colored`'s terminal detection.
    pub fn tag(&self) -> ColoredString {
        format!("{}:", self.as_str()).color(self.color())
    }

    /// The prefix written to the log file: always wrapped in the level's ANSI colour,
    /// whatever stdout happens to be attached to.
    pub fn file_tag(&self) -> String {
        format!("\x1b[{}m{}:\x1b[0m", self.color().to_fg_str(), self.as_str())
    }

    /// Info and Warn go to stdout, Error and Fatal to stderr.
    pub(crate) fn uses_stderr(&self) -> bool {
        *self >= Level::Error
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(format!(
                "invalid log level '{}', expected one of: info, warn, error, fatal",
                other
            )),
        }
    }
}

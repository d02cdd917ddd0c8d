//! Start-up configuration.
//!
//! Values come from the environment (after loading an optional `.env` file) and
//! are then overridden by command-line flags.

use crate::cli::Cli;
use crate::error::{AppError, Result};
use crate::logger::{Level, LoggerConfig};
use std::env;
use std::path::PathBuf;

pub const LOG_FILE_VAR: &str = "POLARYSDB_LOG_FILE";
pub const LOG_LEVEL_VAR: &str = "POLARYSDB_LOG_LEVEL";
pub const LOG_CONSOLE_VAR: &str = "POLARYSDB_LOG_CONSOLE";
pub const HISTORY_VAR: &str = "POLARYSDB_HISTORY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub logger: LoggerConfig,
    pub history: Option<PathBuf>,
}

impl Config {
    /// Loads `.env`, reads the environment, and applies `cli` overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        dotenv::dotenv().ok();
        let mut config = Self::from_env()?;
        config.apply(cli);
        Ok(config)
    }

    /// Reads configuration from `POLARYSDB_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable holds an unparseable value.
    pub fn from_env() -> Result<Self> {
        let file_path = non_empty_var(LOG_FILE_VAR).map(PathBuf::from);

        let min_level = match non_empty_var(LOG_LEVEL_VAR) {
            Some(raw) => raw
                .parse::<Level>()
                .map_err(|e| AppError::Config(format!("{}: {}", LOG_LEVEL_VAR, e)))?,
            None => Level::Info,
        };

        let to_console = match non_empty_var(LOG_CONSOLE_VAR) {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| AppError::Config(format!("{}: expected a boolean, got '{}'", LOG_CONSOLE_VAR, raw)))?,
            None => true,
        };

        Ok(Self {
            logger: LoggerConfig {
                to_file: file_path.is_some(),
                file_path,
                min_level,
                to_console,
            },
            history: non_empty_var(HISTORY_VAR).map(PathBuf::from),
        })
    }

    /// Flags take precedence over the environment.
    pub fn apply(&mut self, cli: &Cli) {
        if let Some(path) = &cli.log_file {
            self.logger.file_path = Some(path.clone());
            self.logger.to_file = true;
        }
        if let Some(level) = cli.log_level {
            self.logger.min_level = level;
        }
        if cli.quiet {
            self.logger.to_console = false;
        }
        if let Some(path) = &cli.history {
            self.history = Some(path.clone());
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

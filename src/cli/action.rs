//! Routes a line of free-form text into a typed `Action`.
//!
//! Tokens are whitespace separated. The first names the command; the rest must
//! match the command's declared argument count exactly.

use super::registry::{self, CommandKind};
use crate::error::{AppError, Result};

/// A validated command with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Init { key: String, path: String },
    Export { key: String, path: String },
    Import { key: String, path: String },
    ExportEncrypted { key: String, path: String },
    ImportEncrypted { key: String, path: String },
    ChangeKey { old: String, new: String },
    NewKey,
    KeyFrom { input: String },
    Exit,
    Version,
    Help,
}

impl Action {
    /// The registered command name this action was parsed from.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Init { .. } => "init",
            Action::Export { .. } => "export",
            Action::Import { .. } => "import",
            Action::ExportEncrypted { .. } => "export-encrypted",
            Action::ImportEncrypted { .. } => "import-encrypted",
            Action::ChangeKey { .. } => "change-key",
            Action::NewKey => "new-key",
            Action::KeyFrom { .. } => "key-from",
            Action::Exit => "exit",
            Action::Version => "version",
            Action::Help => "help",
        }
    }

    /// Whether the action needs an open database handle.
    pub fn requires_handle(&self) -> bool {
        matches!(
            self,
            Action::Export { .. }
                | Action::Import { .. }
                | Action::ExportEncrypted { .. }
                | Action::ImportEncrypted { .. }
                | Action::ChangeKey { .. }
        )
    }
}

pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Parses tokens into an `Action`.
///
/// # Errors
///
/// `AppError::UnknownCommand` if the name is not registered, `AppError::Usage`
/// (with the expected argument list) if the argument count is wrong.
pub fn parse(tokens: &[&str]) -> Result<Action> {
    let (name, args) = tokens
        .split_first()
        .ok_or_else(|| AppError::UnknownCommand(String::new()))?;
    let command = registry::lookup(name).ok_or_else(|| AppError::UnknownCommand(name.to_string()))?;

    if args.len() != command.arity() {
        return Err(AppError::Usage(command.usage()));
    }

    let arg = |i: usize| args[i].to_string();
    let action = match command.kind {
        CommandKind::Init => Action::Init { key: arg(0), path: arg(1) },
        CommandKind::Export => Action::Export { key: arg(0), path: arg(1) },
        CommandKind::Import => Action::Import { key: arg(0), path: arg(1) },
        CommandKind::ExportEncrypted => Action::ExportEncrypted { key: arg(0), path: arg(1) },
        CommandKind::ImportEncrypted => Action::ImportEncrypted { key: arg(0), path: arg(1) },
        CommandKind::ChangeKey => Action::ChangeKey { old: arg(0), new: arg(1) },
        CommandKind::NewKey => Action::NewKey,
        CommandKind::KeyFrom => Action::KeyFrom { input: arg(0) },
        CommandKind::Exit => Action::Exit,
        CommandKind::Version => Action::Version,
        CommandKind::Help => Action::Help,
    };
    Ok(action)
}

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

/// Identifies a registered command independently of its spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Init,
    Export,
    Import,
    ExportEncrypted,
    ImportEncrypted,
    ChangeKey,
    NewKey,
    KeyFrom,
    Exit,
    Version,
    Help,
}

/// A command the prompt understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub name: &'static str,
    pub description: &'static str,
    /// Names of the expected arguments, in order.
    pub args: &'static [&'static str],
}

impl Command {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Usage line, e.g. `init <key> <path>`.
    pub fn usage(&self) -> String {
        self.args
            .iter()
            .fold(self.name.to_string(), |mut line, arg| {
                line.push_str(&format!(" <{}>", arg));
                line
            })
    }
}

/// Every command, in the order `help` lists them.
pub const COMMANDS: [Command; 11] = [
    Command {
        kind: CommandKind::Init,
        name: "init",
        description: "Initialize database",
        args: &["key", "path"],
    },
    Command {
        kind: CommandKind::Export,
        name: "export",
        description: "Export data to a file .json",
        args: &["key", "path"],
    },
    Command {
        kind: CommandKind::Import,
        name: "import",
        description: "Import data from a file .json",
        args: &["key", "path"],
    },
    Command {
        kind: CommandKind::ExportEncrypted,
        name: "export-encrypted",
        description: "Export encrypted data to a file .json",
        args: &["key", "path"],
    },
    Command {
        kind: CommandKind::ImportEncrypted,
        name: "import-encrypted",
        description: "Import encrypted data from a file .json",
        args: &["key", "path"],
    },
    Command {
        kind: CommandKind::ChangeKey,
        name: "change-key",
        description: "Re-encrypt the database under a new key",
        args: &["old", "new"],
    },
    Command {
        kind: CommandKind::NewKey,
        name: "new-key",
        description: "Generate a new random key",
        args: &[],
    },
    Command {
        kind: CommandKind::KeyFrom,
        name: "key-from",
        description: "Derive a key from a string",
        args: &["string"],
    },
    Command {
        kind: CommandKind::Exit,
        name: "exit",
        description: "Close the database and exit",
        args: &[],
    },
    Command {
        kind: CommandKind::Version,
        name: "version",
        description: "Show CLI version",
        args: &[],
    },
    Command {
        kind: CommandKind::Help,
        name: "help",
        description: "Show help",
        args: &[],
    },
];

pub fn lookup(name: &str) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.name == name)
}

pub fn all() -> &'static [Command] {
    &COMMANDS
}

/// Renders the help table: one row per command in registration order.
pub fn help_table() -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Disabled)
        .set_header(vec!["Command", "Arguments", "Description"]);

    for command in all() {
        let args = command
            .args
            .iter()
            .map(|a| format!("<{}>", a))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![command.name.to_string(), args, command.description.to_string()]);
    }

    table.to_string()
}

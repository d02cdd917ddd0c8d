use crate::logger::Level;
use clap::Parser;
use std::path::PathBuf;

/// Interactive shell for PolarysDB encrypted databases.
///
/// Start-up options override the matching `POLARYSDB_*` environment variables.
#[derive(Parser, Debug, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Append session log records to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Minimum level of session log records to emit
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<Level>,

    /// Do not write session log records to the console
    #[arg(short, long)]
    pub quiet: bool,

    /// Load and save prompt history in this file
    #[arg(long, value_name = "PATH")]
    pub history: Option<PathBuf>,
}

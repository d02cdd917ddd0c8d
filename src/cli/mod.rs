//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Includes the command registry, parsing of prompt input into typed actions,
//! the session state machine, the interactive loop, start-up arguments and
//! terminal restoration.

mod action;
mod args;
mod registry;
mod session;
mod shell;
mod terminal;

pub use action::*;
pub use args::*;
pub use registry::*;
pub use session::*;
pub use shell::*;
pub use terminal::*;

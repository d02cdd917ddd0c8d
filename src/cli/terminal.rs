//! Snapshot of the controlling terminal's settings.
//!
//! The line editor switches stdin to raw mode while it waits for input. If the process
//! is stopped by a signal during that wait, the editor never gets to switch it back, so
//! `main` restores the snapshot taken before the editor started.

#[cfg(unix)]
use nix::sys::termios::{tcgetattr, tcsetattr, SetArg, Termios};
#[cfg(unix)]
use std::os::unix::io::AsRawFd;
#[cfg(unix)]
use tracing::{debug, warn};

/// Terminal attributes of stdin, captured before the prompt starts.
pub struct TerminalState {
    #[cfg(unix)]
    saved: Option<Termios>,
}

impl TerminalState {
    /// Records the current attributes. When stdin is not a terminal there is nothing to record.
    pub fn capture() -> Self {
        #[cfg(unix)]
        {
            let saved = match tcgetattr(std::io::stdin().as_raw_fd()) {
                Ok(termios) => Some(termios),
                Err(e) => {
                    debug!("Not capturing terminal settings: {}", e);
                    None
                },
            };
            Self { saved }
        }

        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Applies the captured attributes again. A no-op when nothing was captured.
    pub fn restore(&self) {
        #[cfg(unix)]
        {
            if let Some(saved) = &self.saved {
                if let Err(e) = tcsetattr(std::io::stdin().as_raw_fd(), SetArg::TCSANOW, saved) {
                    warn!("Failed to restore terminal settings: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_is_repeatable() {
        let state = TerminalState::capture();
        state.restore();
        state.restore();
    }
}

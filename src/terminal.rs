//! Reading a pasted token from the terminal without echoing it
//!
//! On a terminal the token is read through an inquire password prompt, which
//! runs in raw mode and so is not held to the kernel's canonical line limit
//! (1024 bytes on macOS, shorter than an ID token plus refresh token).
//! Anywhere else a plain line read is used.

use crate::error::{LoginError, Result};
use inquire::{InquireError, Password, PasswordDisplayMode};
use std::io::{self, BufRead, IsTerminal, Write};
use tracing::warn;

/// Source of the secret line typed or pasted by the operator
pub trait SecretReader {
    fn read_secret(&mut self, prompt: &str) -> Result<String>;
}

/// How stdin is read, decided once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalInput {
    /// Hidden password prompt; the terminal is restored on return or Ctrl-C
    Hidden,
    /// Plain line read
    Canonical,
}

impl TerminalInput {
    pub fn detect() -> Self {
        if io::stdin().is_terminal() {
            TerminalInput::Hidden
        } else {
            TerminalInput::Canonical
        }
    }
}

impl SecretReader for TerminalInput {
    fn read_secret(&mut self, prompt: &str) -> Result<String> {
        if *self == TerminalInput::Hidden {
            let answer = Password::new(prompt.trim_end())
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Hidden)
                .prompt();
            match answer {
                Ok(line) => return Ok(line.trim().to_string()),
                Err(e) => match prompt_failure(e) {
                    Some(err) => return Err(err),
                    None => {
                        warn!("no terminal for a hidden prompt, reading the token as typed");
                        *self = TerminalInput::Canonical;
                    }
                },
            }
        }

        let mut stderr = io::stderr();
        let _ = write!(stderr, "{}", prompt);
        let _ = stderr.flush();
        read_line(&mut io::stdin().lock()).map_err(LoginError::InputFailed)
    }
}

/// Error for a failed prompt, or `None` when a plain read should be used instead
fn prompt_failure(err: InquireError) -> Option<LoginError> {
    match err {
        InquireError::NotTTY => None,
        InquireError::OperationInterrupted => Some(LoginError::Interrupted),
        InquireError::OperationCanceled => Some(LoginError::Cancelled),
        InquireError::IO(e) => Some(LoginError::InputFailed(e)),
        other => Some(LoginError::InputFailed(io::Error::new(
            io::ErrorKind::Other,
            other.to_string(),
        ))),
    }
}

/// Read one line and trim surrounding whitespace; EOF yields ""
pub fn read_line<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut buf = String::new();
    reader.read_line(&mut buf)?;
    Ok(buf.trim().to_string())
}

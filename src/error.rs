//! Process-level error type.
//!
//! Every failure that reaches `main` is an [`AppError`]: a message for the
//! user plus the exit code the process should terminate with.
//!
//! Exit code conventions:
//!
//! - `2` — input/config/usage problems (bad JSON, invalid settings, unknown
//!   template keys, file I/O)
//! - `3` — not enough measurements to fit a phase
//! - `4` — numeric failures (fit divergence, unreachable thresholds when the
//!   caller demanded a date, non-finite values)
//!
//! The numeric engine reports typed errors (`FitError`, `InvertError`,
//! `NotesError`); those convert into `AppError` at the app boundary via
//! `From` impls next to their definitions.

/// Exit code for input/config/usage errors.
pub const EXIT_INPUT: u8 = 2;
/// Exit code for insufficient data.
pub const EXIT_DATA: u8 = 3;
/// Exit code for numeric failures.
pub const EXIT_NUMERIC: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

//! Process exit handling.

use std::process::{ExitCode, Termination};

/// A convenient alias for this crate's fallible operations; library
/// errors are wrapped in `anyhow` at the binary boundary.
pub type Result<T, E = anyhow::Error> = std::result::Result<T, E>;

/// The process's outcome, printing any error before exiting non-zero.
pub enum Exit {
    Success,
    Failure(anyhow::Error),
}

impl Termination for Exit {
    fn report(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failure(err) => {
                eprintln!("error: {err:#}");
                ExitCode::FAILURE
            }
        }
    }
}

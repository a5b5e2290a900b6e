//! Error conditions that map to specific process exit codes.
//!
//! Everything else travels as a plain `anyhow::Error` and exits with 1.

use thiserror::Error;

/// Classified fatal conditions recovered in `main` via `downcast_ref`.
#[derive(Debug, Error)]
pub enum DistError {
    /// Malformed command line. The message is printed above the usage text.
    #[error("{0}")]
    Usage(String),

    /// `--help` was requested.
    #[error("help requested")]
    Help,

    /// An orchestrator invocation exited unsuccessfully.
    #[error("{step} failed with exit code {code}")]
    BuildFailed { step: String, code: i32 },
}

impl DistError {
    /// Exit code the process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            DistError::Usage(_) | DistError::Help => 1,
            DistError::BuildFailed { code, .. } => {
                if *code == 0 {
                    1
                } else {
                    *code
                }
            }
        }
    }
}

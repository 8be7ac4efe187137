//! Error types for the learning loop and its collaborators.
//!
//! Each enum covers one concern. Per-iteration failures are swallowed at
//! the worker boundary; these types exist so call sites can log precisely
//! and so the few genuinely fatal paths stay distinguishable.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while executing a synthesized command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The shell could not be spawned at all.
    #[error("failed to spawn /bin/sh: {0}")]
    Spawn(#[source] std::io::Error),

    /// The child's exit status could not be collected.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),

    /// The child survived the full termination escalation.
    #[error("child process survived SIGTERM and {kill_attempts} SIGKILL attempt(s)")]
    Unkillable { kill_attempts: u32 },
}

impl ExecError {
    /// Whether the next iteration could plausibly succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::Wait(_))
    }
}

/// Errors raised while loading or saving persisted state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

//! Process-wide termination flag.
//!
//! SIGINT and SIGTERM raise a single sticky flag; workers, executors and
//! the tuner poll it at their suspension points and drain out. SIGPIPE is
//! ignored so a command closing its end of a pipe cannot take the agent
//! down with it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

/// Cloneable handle to the sticky termination flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. It never resets.
    pub fn trigger(&self) {
        self.inner.store(true, Ordering::Release);
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }
}

/// Wire SIGINT and SIGTERM to the flag and ignore SIGPIPE.
pub fn install_signal_handlers(flag: &ShutdownFlag) {
    ignore_sigpipe();

    let interrupt_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            interrupt_flag.trigger();
        }
    });

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            let terminate_flag = flag.clone();
            tokio::spawn(async move {
                if terminate.recv().await.is_some() {
                    info!("termination requested, shutting down");
                    terminate_flag.trigger();
                }
            });
        }
        Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
    }
}

fn ignore_sigpipe() {
    // SAFETY: resetting a signal disposition has no aliasing concerns.
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
}

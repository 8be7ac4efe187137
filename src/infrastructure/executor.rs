//! Bounded-runtime execution of synthesized shell commands.
//!
//! Every command runs as `/bin/sh -c <line>` in its own process group so
//! the whole subtree can be signalled at once. The capture loop drains
//! stdout and stderr on a fixed tick, reaps the child without blocking,
//! and escalates from SIGTERM to repeated SIGKILL once the wall-clock
//! budget is spent or the termination flag is raised.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::domain::error::ExecError;
use crate::infrastructure::shutdown::ShutdownFlag;

#[derive(Debug, Clone)]
pub struct ShellExecutorConfig {
    /// Wall-clock budget before termination starts.
    pub runtime: Duration,
    /// SIGKILL attempts after the initial SIGTERM.
    pub kill_attempts: u32,
    /// Capture loop tick.
    pub poll_interval: Duration,
    /// Upper bound on captured bytes; anything beyond is discarded.
    pub max_capture_bytes: usize,
}

impl Default for ShellExecutorConfig {
    fn default() -> Self {
        Self {
            runtime: Duration::from_secs(10),
            kill_attempts: 3,
            poll_interval: Duration::from_millis(100),
            max_capture_bytes: 4 * 1024 * 1024,
        }
    }
}

pub struct ShellExecutor {
    config: ShellExecutorConfig,
    shutdown: ShutdownFlag,
}

impl ShellExecutor {
    pub fn new(config: ShellExecutorConfig, shutdown: ShutdownFlag) -> Self {
        Self { config, shutdown }
    }

    /// Execute `command_line` and return whatever it wrote to stdout and
    /// stderr, possibly empty, possibly truncated at the capture cap.
    ///
    /// A child that outlives the runtime budget (or a raised termination
    /// flag) is signalled as a process group, first with SIGTERM, then
    /// with up to `kill_attempts` SIGKILLs; the captured prefix is still
    /// returned once it dies. The immediate child is always reaped before
    /// this returns.
    pub async fn execute(&self, command_line: &str) -> Result<Vec<u8>, ExecError> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(ExecError::Spawn)?;

        // The child is its own process-group leader, so its pid doubles as
        // the group id to signal.
        let pgid = child.id();

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let mut captured = Vec::new();
        let mut out_buf = [0u8; 4096];
        let mut err_buf = [0u8; 4096];

        let started = Instant::now();
        let mut kill_stage: u32 = 0;
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                read = read_some(&mut stdout, &mut out_buf) => {
                    self.absorb(&mut captured, &out_buf, read, &mut stdout);
                }
                read = read_some(&mut stderr, &mut err_buf) => {
                    self.absorb(&mut captured, &err_buf, read, &mut stderr);
                }
                _ = ticker.tick() => {
                    match child.try_wait() {
                        Ok(Some(status)) => {
                            self.drain_stream(&mut captured, &mut stdout).await;
                            self.drain_stream(&mut captured, &mut stderr).await;
                            debug!(
                                exit = ?status.code(),
                                bytes = captured.len(),
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "child finished"
                            );
                            return Ok(captured);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            signal_group(pgid, libc::SIGKILL);
                            let _ = child.wait().await;
                            return Err(ExecError::Wait(e));
                        }
                    }

                    let over_budget = started.elapsed() >= self.config.runtime;
                    if over_budget || self.shutdown.is_triggered() {
                        if kill_stage == 0 {
                            debug!(command = %command_line, "runtime budget spent, sending SIGTERM");
                            signal_group(pgid, libc::SIGTERM);
                            kill_stage = 1;
                        } else if kill_stage <= self.config.kill_attempts {
                            debug!(attempt = kill_stage, "child still alive, sending SIGKILL");
                            signal_group(pgid, libc::SIGKILL);
                            kill_stage += 1;
                        } else {
                            warn!(command = %command_line, "giving up on unkillable child");
                            let _ = child.kill().await;
                            let _ = child.wait().await;
                            return Err(ExecError::Unkillable {
                                kill_attempts: self.config.kill_attempts,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Fold one read result into the capture buffer, closing the stream
    /// slot on EOF or error.
    fn absorb<S>(
        &self,
        captured: &mut Vec<u8>,
        buf: &[u8],
        read: std::io::Result<usize>,
        stream: &mut Option<S>,
    ) {
        match read {
            Ok(0) => *stream = None,
            Ok(n) => append_capped(captured, &buf[..n], self.config.max_capture_bytes),
            Err(e) => {
                debug!(error = %e, "pipe read failed, treating as closed");
                *stream = None;
            }
        }
    }

    /// Read a stream to EOF after the child has been reaped.
    async fn drain_stream<S>(&self, captured: &mut Vec<u8>, stream: &mut Option<S>)
    where
        S: AsyncReadExt + Unpin,
    {
        let Some(inner) = stream.as_mut() else { return };
        let mut buf = [0u8; 4096];
        loop {
            match inner.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => append_capped(captured, &buf[..n], self.config.max_capture_bytes),
            }
        }
        *stream = None;
    }
}

/// Read from an optional stream; pends forever on a closed slot so the
/// select loop falls through to the ticker.
async fn read_some<S>(stream: &mut Option<S>, buf: &mut [u8]) -> std::io::Result<usize>
where
    S: AsyncReadExt + Unpin,
{
    match stream.as_mut() {
        Some(inner) => inner.read(buf).await,
        None => std::future::pending().await,
    }
}

fn append_capped(captured: &mut Vec<u8>, chunk: &[u8], cap: usize) {
    let room = cap.saturating_sub(captured.len());
    if room == 0 {
        return;
    }
    let take = chunk.len().min(room);
    captured.extend_from_slice(&chunk[..take]);
}

/// Signal the whole process group rooted at the child.
fn signal_group(pgid: Option<u32>, sig: libc::c_int) {
    let Some(pgid) = pgid else { return };
    // SAFETY: killpg with a valid signal number; failure (already-dead
    // group) is harmless and intentionally ignored.
    unsafe {
        libc::killpg(pgid as libc::pid_t, sig);
    }
}

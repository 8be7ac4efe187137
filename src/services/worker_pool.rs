//! The worker pool driving the learning loop.
//!
//! Each worker runs the synthesize -> execute -> learn -> trend pipeline
//! until the termination flag is raised. Admission is gated by a counting
//! semaphore sized to the configured concurrency; a worker holds its permit
//! for its whole lifetime.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::domain::trend::TrendTracker;
use crate::domain::vocabulary::Vocabulary;
use crate::infrastructure::executor::ShellExecutor;
use crate::infrastructure::shutdown::ShutdownFlag;
use crate::services::learning::LearningUpdater;
use crate::services::synthesizer::CommandSynthesizer;

/// Maximum bytes of command output echoed into the logs.
const LOG_OUTPUT_PREVIEW: usize = 200;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of workers to launch; also the semaphore size.
    pub workers: usize,
    /// Backoff when synthesis yields nothing.
    pub idle_backoff: Duration,
    /// Slice length of the interruptible semaphore acquire.
    pub acquire_slice: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            idle_backoff: Duration::from_millis(50),
            acquire_slice: Duration::from_millis(200),
        }
    }
}

pub struct WorkerPool {
    synthesizer: Arc<CommandSynthesizer>,
    updater: Arc<LearningUpdater>,
    executor: Arc<ShellExecutor>,
    vocabulary: Arc<Mutex<Vocabulary>>,
    tracker: Arc<TrendTracker>,
    shutdown: ShutdownFlag,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        synthesizer: Arc<CommandSynthesizer>,
        updater: Arc<LearningUpdater>,
        executor: Arc<ShellExecutor>,
        vocabulary: Arc<Mutex<Vocabulary>>,
        tracker: Arc<TrendTracker>,
        shutdown: ShutdownFlag,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            synthesizer,
            updater,
            executor,
            vocabulary,
            tracker,
            shutdown,
            config,
        }
    }

    /// Launch the configured workers and wait for all of them to exit.
    ///
    /// Workers exit when the termination flag is raised; this method
    /// returns only after every worker has been joined.
    pub async fn run(self: Arc<Self>) {
        let workers = self.config.workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));

        info!(workers, "launching worker pool");

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let pool = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, semaphore).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked");
            }
        }

        info!("worker pool drained");
    }

    async fn worker_loop(&self, worker_id: usize, semaphore: Arc<Semaphore>) {
        let Some(_permit) = self.acquire_interruptible(semaphore).await else {
            return;
        };

        debug!(worker = worker_id, "worker started");
        let mut rng = StdRng::from_entropy();

        while !self.shutdown.is_triggered() {
            let command = self.synthesizer.synthesize(&mut rng);
            if command.is_empty() {
                tokio::time::sleep(self.config.idle_backoff).await;
                continue;
            }

            let line = self.vocabulary.lock().unwrap().render_command(&command);
            if line.is_empty() {
                continue;
            }

            info!(worker = worker_id, command = %line, "executing");

            match self.executor.execute(&line).await {
                Ok(output) => {
                    let reward = self.updater.learn(&output, &command);
                    self.tracker.push(reward);
                    debug!(
                        worker = worker_id,
                        reward,
                        moving_average = self.tracker.mean(),
                        output_bytes = output.len(),
                        preview = %preview(&output, LOG_OUTPUT_PREVIEW),
                        "iteration complete"
                    );
                }
                Err(e) => {
                    warn!(worker = worker_id, error = %e, "execution failed");
                }
            }
        }

        debug!(worker = worker_id, "worker stopping");
    }

    /// Acquire a permit in bounded slices so a raised termination flag is
    /// noticed even while the semaphore is exhausted.
    async fn acquire_interruptible(
        &self,
        semaphore: Arc<Semaphore>,
    ) -> Option<OwnedSemaphorePermit> {
        loop {
            if self.shutdown.is_triggered() {
                return None;
            }
            match timeout(
                self.config.acquire_slice,
                Arc::clone(&semaphore).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => return Some(permit),
                Ok(Err(_closed)) => return None,
                Err(_elapsed) => continue,
            }
        }
    }
}

/// Compact printable preview of captured output for logging.
fn preview(bytes: &[u8], max: usize) -> String {
    let mut out = String::new();
    for &b in bytes.iter().take(max) {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            0x20..=0x7e => out.push(b as char),
            _ => {
                let _ = write!(out, "\\x{b:02X}");
            }
        }
    }
    out
}

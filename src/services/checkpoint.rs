//! Periodic persistence of the learned state.
//!
//! Learning runs indefinitely, so waiting for shutdown to write the
//! database loses everything on a crash or power cut. The checkpointer
//! saves the full state on a fixed interval; the final save at shutdown
//! still happens in the run sequence.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, warn};

use crate::domain::observations::ObservationLog;
use crate::domain::vocabulary::Vocabulary;
use crate::infrastructure::shutdown::ShutdownFlag;
use crate::infrastructure::store::{self, StorePaths};

#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Interval between saves. Zero disables the daemon.
    pub interval: Duration,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

pub struct Checkpointer {
    vocabulary: Arc<Mutex<Vocabulary>>,
    observations: Arc<Mutex<ObservationLog>>,
    paths: StorePaths,
    shutdown: ShutdownFlag,
    config: CheckpointConfig,
}

impl Checkpointer {
    pub fn new(
        vocabulary: Arc<Mutex<Vocabulary>>,
        observations: Arc<Mutex<ObservationLog>>,
        paths: StorePaths,
        shutdown: ShutdownFlag,
        config: CheckpointConfig,
    ) -> Self {
        Self {
            vocabulary,
            observations,
            paths,
            shutdown,
            config,
        }
    }

    /// Save on every interval until the termination flag is raised.
    ///
    /// A failed save is logged and retried at the next interval; it never
    /// stops the loop.
    pub async fn run(&self) {
        if self.config.interval.is_zero() {
            debug!("checkpointing disabled");
            return;
        }

        let mut ticker = interval(self.config.interval);
        // The first tick completes immediately; skip it so the initial
        // save does not race startup seeding.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if self.shutdown.is_triggered() {
                break;
            }
            self.save_once();
        }

        debug!("checkpointer stopped");
    }

    /// One save pass. Locks are taken in log-then-vocabulary order.
    pub fn save_once(&self) {
        let observations = self.observations.lock().unwrap();
        let vocabulary = self.vocabulary.lock().unwrap();
        match store::save(&vocabulary, &observations, &self.paths) {
            Ok(()) => debug!(
                tokens = vocabulary.len(),
                associations = vocabulary.assoc().len(),
                observations = observations.len(),
                "checkpoint written"
            ),
            Err(e) => warn!(error = %e, "checkpoint failed"),
        }
    }
}

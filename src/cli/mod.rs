//! Command-line interface and the agent's run sequence.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use crate::domain::observations::ObservationLog;
use crate::domain::settings::SynthesisSettings;
use crate::domain::trend::TrendTracker;
use crate::domain::vocabulary::Vocabulary;
use crate::infrastructure::executor::{ShellExecutor, ShellExecutorConfig};
use crate::infrastructure::logging::{self, LogFormat};
use crate::infrastructure::seed::{self, SeedOptions};
use crate::infrastructure::shutdown::{self, ShutdownFlag};
use crate::infrastructure::store::{self, StorePaths};
use crate::services::checkpoint::{CheckpointConfig, Checkpointer};
use crate::services::config::Config;
use crate::services::learning::LearningUpdater;
use crate::services::synthesizer::CommandSynthesizer;
use crate::services::tuner::{Tuner, TunerConfig};
use crate::services::worker_pool::{WorkerPool, WorkerPoolConfig};

#[derive(Parser)]
#[command(name = "forager")]
#[command(about = "Forager - an exploratory agent that learns to drive a shell", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Initial command argument length
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Initial vocabulary sampling scope (percent)
    #[arg(short, long)]
    pub scope: Option<u32>,

    /// Directory holding persisted state
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the agent until a termination signal arrives.
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).context("loading configuration")?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate().context("validating configuration")?;

    let _log_guard = logging::init(&config.logging).context("initializing logging")?;

    let shutdown = ShutdownFlag::new();
    shutdown::install_signal_handlers(&shutdown);

    // Load persisted state; a failed load is a warning, not a refusal to run.
    let paths = StorePaths {
        tokens: config.store.data_dir.join(&config.store.tokens_file),
        values: config.store.data_dir.join(&config.store.values_file),
        observations: config.store.data_dir.join(&config.store.observations_file),
    };
    let mut vocabulary = Vocabulary::new();
    let mut observations = ObservationLog::new();
    match store::load(&mut vocabulary, &mut observations, &paths) {
        Ok(report) => info!(
            tokens = report.tokens,
            associations = report.associations,
            observations = report.observations,
            "persisted state loaded"
        ),
        Err(e) => warn!(error = %e, "failed to load persisted state, starting empty"),
    }

    let vocabulary = Arc::new(Mutex::new(vocabulary));
    let observations = Arc::new(Mutex::new(observations));

    if vocabulary.lock().unwrap().is_empty() {
        let options = SeedOptions {
            max_per_dir: config.seed.max_per_dir,
            dir_timeout: Duration::from_secs(config.seed.dir_timeout_secs),
            skip_symlinks: config.seed.skip_symlinks,
        };
        let added = seed::seed_from_path(&vocabulary, config.seed.path_override.as_deref(), &options);
        info!(added, "seeded vocabulary from the search path");
    }
    info!(
        words = vocabulary.lock().unwrap().len(),
        "vocabulary ready"
    );

    let settings = Arc::new(SynthesisSettings::new(
        config.synthesis.limits(),
        config.synthesis.initial_length,
        config.synthesis.initial_scope,
    ));
    let tracker = Arc::new(TrendTracker::new(config.learning.trend_window));

    let executor = Arc::new(ShellExecutor::new(
        ShellExecutorConfig {
            runtime: Duration::from_secs(config.executor.runtime_secs),
            kill_attempts: config.executor.kill_attempts,
            poll_interval: Duration::from_millis(config.executor.poll_interval_ms),
            max_capture_bytes: config.executor.max_capture_bytes,
        },
        shutdown.clone(),
    ));
    let synthesizer = Arc::new(CommandSynthesizer::new(
        Arc::clone(&vocabulary),
        Arc::clone(&settings),
    ));
    let updater = Arc::new(LearningUpdater::new(
        Arc::clone(&vocabulary),
        Arc::clone(&observations),
        config.learning.clone(),
    ));

    let pool = Arc::new(WorkerPool::new(
        synthesizer,
        updater,
        executor,
        Arc::clone(&vocabulary),
        Arc::clone(&tracker),
        shutdown.clone(),
        WorkerPoolConfig {
            workers: config.effective_workers(),
            idle_backoff: Duration::from_millis(config.pool.idle_backoff_ms),
            acquire_slice: Duration::from_millis(config.pool.acquire_slice_ms),
        },
    ));

    let tuner = Tuner::new(
        Arc::clone(&settings),
        Arc::clone(&tracker),
        shutdown.clone(),
        TunerConfig::with_interval(Duration::from_millis(config.tuner.interval_ms)),
    );
    let tuner_handle = tokio::spawn(async move { tuner.run().await });

    let checkpointer = Checkpointer::new(
        Arc::clone(&vocabulary),
        Arc::clone(&observations),
        paths.clone(),
        shutdown.clone(),
        CheckpointConfig {
            interval: Duration::from_secs(config.store.checkpoint_interval_secs),
        },
    );
    let checkpoint_handle = tokio::spawn(async move { checkpointer.run().await });

    info!(
        workers = config.effective_workers(),
        length = settings.snapshot().length,
        scope = settings.snapshot().scope,
        "forager running, press Ctrl-C to stop"
    );

    pool.run().await;
    if let Err(e) = tuner_handle.await {
        warn!(error = %e, "tuner task failed");
    }
    if let Err(e) = checkpoint_handle.await {
        warn!(error = %e, "checkpointer task failed");
    }

    // Persist everything learned this run.
    {
        let observations = observations.lock().unwrap();
        let vocabulary = vocabulary.lock().unwrap();
        if let Err(e) = store::save(&vocabulary, &observations, &paths) {
            warn!(error = %e, "failed to persist state");
        } else {
            info!(
                tokens = vocabulary.len(),
                associations = vocabulary.assoc().len(),
                observations = observations.len(),
                "state persisted"
            );
        }
    }

    info!(
        moving_average = tracker.mean(),
        trend = tracker.verdict().as_str(),
        "shutdown complete"
    );
    Ok(())
}

/// Fold CLI flags over the file configuration, clamping into bounds.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(workers) = cli.workers {
        config.pool.workers = workers.clamp(1, config.pool.max_workers);
    }
    if let Some(length) = cli.length {
        config.synthesis.initial_length =
            length.clamp(config.synthesis.cmd_min, config.synthesis.cmd_max);
    }
    if let Some(scope) = cli.scope {
        config.synthesis.initial_scope =
            scope.clamp(config.synthesis.scope_min, config.synthesis.scope_max);
    }
    if let Some(ref data_dir) = cli.data_dir {
        config.store.data_dir = data_dir.clone();
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json {
        config.logging.format = LogFormat::Json;
    }
}

//! Configuration management for the forager agent.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::settings::SynthesisLimits;
use crate::infrastructure::logging::LogConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed for {field}: {reason}")]
    ValidationError { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub synthesis: SynthesisConfig,
    pub learning: LearningConfig,
    pub executor: ExecutorConfig,
    pub pool: PoolConfig,
    pub tuner: TunerSectionConfig,
    pub seed: SeedConfig,
    pub store: StoreConfig,
    pub logging: LogConfig,
}

/// Bounds and starting point for command synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Minimum argument count of a synthesized command.
    pub cmd_min: usize,
    /// Maximum argument count of a synthesized command.
    pub cmd_max: usize,
    /// Minimum sampling scope, percent of the vocabulary.
    pub scope_min: u32,
    /// Maximum sampling scope, percent of the vocabulary.
    pub scope_max: u32,
    /// Command length at startup (before the tuner takes over).
    pub initial_length: usize,
    /// Sampling scope at startup.
    pub initial_scope: u32,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            cmd_min: 1,
            cmd_max: 10,
            scope_min: 1,
            scope_max: 100,
            initial_length: 1,
            initial_scope: 50,
        }
    }
}

impl SynthesisConfig {
    pub fn limits(&self) -> SynthesisLimits {
        SynthesisLimits {
            cmd_min: self.cmd_min,
            cmd_max: self.cmd_max,
            scope_min: self.scope_min,
            scope_max: self.scope_max,
        }
    }
}

/// Reward shaping and redundancy judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Reward applied when an observation is novel.
    pub reward: i64,
    /// Penalty applied when an observation is redundant.
    pub penalty: i64,
    /// Similarity percentage at or above which a line is redundant.
    pub redundancy_threshold: f32,
    /// Whether redundant lines are still appended to the observation log.
    pub store_redundant: bool,
    /// Window size of the learning trend tracker.
    pub trend_window: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            reward: 10,
            penalty: 1,
            redundancy_threshold: 75.0,
            store_redundant: true,
            trend_window: 10,
        }
    }
}

/// Child-process execution budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock seconds a child may run before termination starts.
    pub runtime_secs: u64,
    /// SIGKILL attempts after the initial SIGTERM.
    pub kill_attempts: u32,
    /// Poll tick of the capture loop, milliseconds.
    pub poll_interval_ms: u64,
    /// Upper bound on captured output; excess bytes are discarded.
    pub max_capture_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            runtime_secs: 10,
            kill_attempts: 3,
            poll_interval_ms: 100,
            max_capture_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Worker concurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Hard cap on concurrent workers.
    pub max_workers: usize,
    /// Workers to launch (clamped to `1..=max_workers`).
    pub workers: usize,
    /// Backoff when synthesis yields nothing, milliseconds.
    pub idle_backoff_ms: u64,
    /// Slice length of the interruptible semaphore wait, milliseconds.
    pub acquire_slice_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            workers: 8,
            idle_backoff_ms: 50,
            acquire_slice_ms: 200,
        }
    }
}

/// Trend tuner cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSectionConfig {
    /// Interval between length adjustments, milliseconds.
    pub interval_ms: u64,
}

impl Default for TunerSectionConfig {
    fn default() -> Self {
        Self { interval_ms: 1500 }
    }
}

/// Vocabulary seeding from the executable search path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Cap on words added per scanned directory (0 = unlimited).
    pub max_per_dir: usize,
    /// Give up on a single directory after this many seconds (0 = none).
    pub dir_timeout_secs: u64,
    /// Skip symbolic links while scanning.
    pub skip_symlinks: bool,
    /// Colon-separated directory list overriding the PATH variable.
    pub path_override: Option<String>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            max_per_dir: 5000,
            dir_timeout_secs: 8,
            skip_symlinks: true,
            path_override: None,
        }
    }
}

/// On-disk layout of persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the three state files.
    pub data_dir: PathBuf,
    pub tokens_file: String,
    pub values_file: String,
    pub observations_file: String,
    /// Seconds between periodic checkpoints (0 disables them).
    pub checkpoint_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tokens_file: "tokens.txt".to_string(),
            values_file: "values.tsv".to_string(),
            observations_file: "observations.txt".to_string(),
            checkpoint_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.synthesis.cmd_min == 0 {
            return Err(ConfigError::ValidationError {
                field: "synthesis.cmd_min".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.synthesis.cmd_min > self.synthesis.cmd_max {
            return Err(ConfigError::ValidationError {
                field: "synthesis.cmd_min".to_string(),
                reason: "must not exceed cmd_max".to_string(),
            });
        }
        if self.synthesis.scope_min == 0
            || self.synthesis.scope_max > 100
            || self.synthesis.scope_min > self.synthesis.scope_max
        {
            return Err(ConfigError::ValidationError {
                field: "synthesis.scope_min".to_string(),
                reason: "scope bounds must satisfy 1 <= min <= max <= 100".to_string(),
            });
        }
        if self.learning.penalty < 0 || self.learning.reward < 0 {
            return Err(ConfigError::ValidationError {
                field: "learning.reward".to_string(),
                reason: "reward and penalty are magnitudes and must be non-negative".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&self.learning.redundancy_threshold) {
            return Err(ConfigError::ValidationError {
                field: "learning.redundancy_threshold".to_string(),
                reason: "must be a percentage in 0..=100".to_string(),
            });
        }
        if self.learning.trend_window == 0 {
            return Err(ConfigError::ValidationError {
                field: "learning.trend_window".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.executor.runtime_secs == 0 {
            return Err(ConfigError::ValidationError {
                field: "executor.runtime_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.executor.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                field: "executor.poll_interval_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.pool.max_workers == 0 {
            return Err(ConfigError::ValidationError {
                field: "pool.max_workers".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tuner.interval_ms == 0 {
            return Err(ConfigError::ValidationError {
                field: "tuner.interval_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Effective worker count: the configured value clamped to the cap.
    pub fn effective_workers(&self) -> usize {
        self.pool.workers.clamp(1, self.pool.max_workers)
    }
}

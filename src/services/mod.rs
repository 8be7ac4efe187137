//! Behavioral layer: configuration, command synthesis, learning updates,
//! the worker pool and the trend tuner.

pub mod checkpoint;
pub mod config;
pub mod learning;
pub mod synthesizer;
pub mod tuner;
pub mod worker_pool;

pub use checkpoint::{CheckpointConfig, Checkpointer};
pub use config::{Config, ConfigError};
pub use learning::LearningUpdater;
pub use synthesizer::CommandSynthesizer;
pub use tuner::{Tuner, TunerConfig};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};

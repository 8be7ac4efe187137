//! Forager - an exploratory agent that learns to drive a shell.

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::error::{ExecError, StoreError};
pub use services::config::{Config, ConfigError};

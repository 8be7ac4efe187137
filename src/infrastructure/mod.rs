//! Process, filesystem and signal plumbing.

pub mod executor;
pub mod logging;
pub mod seed;
pub mod shutdown;
pub mod store;

pub use executor::{ShellExecutor, ShellExecutorConfig};
pub use shutdown::ShutdownFlag;

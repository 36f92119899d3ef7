//! CLI command implementations.

pub mod build;
pub mod clean;
pub mod task;
pub mod watch;

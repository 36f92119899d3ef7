//! User-facing reports for transformation failures.

use crate::pipeline::Task;

/// Receives non-fatal failures from pipelines.
///
/// A failing file is reported here and skipped; the rest of the batch keeps
/// going.
pub trait Notifier: Send + Sync {
    /// Report that a file in `task` could not be transformed.
    fn transform_failed(&self, task: Task, message: &str);
}

/// Notifier that writes failures to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn transform_failed(&self, task: Task, message: &str) {
        tracing::error!("Error {}: {}", task, message);
    }
}

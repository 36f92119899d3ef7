//! Single pipeline commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use trowel_pipelines::{LogNotifier, Task};

use crate::config::Project;

/// Run one pipeline once.
///
/// Files that fail to transform are logged; the command still succeeds.
pub fn run(project: &Project, task: Task) -> Result<()> {
    let pipelines = project.pipelines(Arc::new(LogNotifier));
    let report = pipelines
        .run(task)
        .with_context(|| format!("{} failed", task))?;

    if !report.is_clean() {
        tracing::warn!("{}: {} files could not be processed", task, report.failed);
    }

    Ok(())
}

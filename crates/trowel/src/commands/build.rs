//! Full build command.

use std::sync::Arc;

use anyhow::{Context, Result};
use trowel_pipelines::{clean, release, LogNotifier};

use crate::config::Project;

/// Clean the distribution, run every pipeline in order, then bundle.
///
/// Files that fail to transform are left out of the bundle and logged.
pub fn run(project: &Project) -> Result<()> {
    tracing::info!("Building {}...", project.root.display());

    let paths = project.paths();
    clean(&project.resolve(&paths.dist_dir))?;

    let pipelines = project.pipelines(Arc::new(LogNotifier));
    let reports = pipelines.run_all().context("Build failed")?;

    let failed: usize = reports.iter().map(|r| r.failed).sum();
    let duration_ms: u64 = reports.iter().map(|r| r.duration_ms).sum();

    let bundle = release(&project.root, paths).context("Failed to assemble distribution")?;

    for pattern in &bundle.empty_patterns {
        tracing::debug!("Nothing matched {}", pattern);
    }

    tracing::info!(
        "Bundled {} files in {}ms",
        bundle.copied,
        duration_ms
    );
    tracing::info!("Output: {}", bundle.output_dir.display());

    if failed > 0 {
        tracing::warn!("{} files could not be processed", failed);
    }

    Ok(())
}

//! Distribution cleanup command.

use anyhow::Result;
use trowel_pipelines::clean;

use crate::config::Project;

/// Remove the distribution directory.
pub fn run(project: &Project) -> Result<()> {
    let dist = project.resolve(&project.paths().dist_dir);

    if !clean(&dist)? {
        tracing::info!("{} is already clean", dist.display());
    }

    Ok(())
}

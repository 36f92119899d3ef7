//! Watch command: initial build, then the development server.

use std::sync::Arc;

use anyhow::{Context, Result};
use trowel_server::{DevServer, DevServerConfig, HubNotifier, ReloadHub};

use crate::config::Project;

/// Run every pipeline once, then watch and serve until interrupted.
pub async fn run(project: Project, port: Option<u16>, open: bool) -> Result<()> {
    let hub = ReloadHub::new();
    let pipelines = Arc::new(project.pipelines(Arc::new(HubNotifier::new(hub.clone()))));

    let initial = Arc::clone(&pipelines);
    tokio::task::spawn_blocking(move || initial.run_all())
        .await
        .context("Initial build did not complete")?
        .context("Initial build failed")?;

    let settings = &project.config.server;
    let config = DevServerConfig {
        port: port.unwrap_or(settings.port),
        host: settings.host.clone(),
        open: open && settings.open,
    };

    tracing::info!("Starting development server on port {}", config.port);
    DevServer::new(config, pipelines, hub).start().await?;

    Ok(())
}

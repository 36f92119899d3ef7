//! Project configuration (trowel.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use trowel_pipelines::{Notifier, PathTable, Pipelines};

/// Configuration file structure (trowel.toml).
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub paths: PathTable,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_open")]
    pub open: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            open: default_open(),
        }
    }
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_open() -> bool {
    true
}

/// Load configuration if the file exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());
    Ok(config)
}

/// A project root together with its configuration.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: ConfigFile,
}

impl Project {
    /// Load the project at `root`. A relative config path is resolved against
    /// the root.
    pub fn load(root: PathBuf, config: &Path) -> Result<Self> {
        let config = load_config(&root.join(config))?;
        Ok(Self { root, config })
    }

    pub fn paths(&self) -> &PathTable {
        &self.config.paths
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn pipelines(&self, notifier: Arc<dyn Notifier>) -> Pipelines {
        Pipelines::new(&self.root, self.config.paths.clone(), notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_means_defaults() {
        let temp = tempdir().unwrap();
        let project = Project::load(temp.path().to_path_buf(), Path::new("trowel.toml")).unwrap();

        assert_eq!(project.config, ConfigFile::default());
        assert_eq!(project.config.server.port, 3000);
        assert_eq!(project.paths().dist_dir, "dist");
    }

    #[test]
    fn sections_override_only_what_they_name() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("trowel.toml"),
            "[paths]\ndist_dir = \"public\"\n\n[server]\nport = 8080\nopen = false\n",
        )
        .unwrap();

        let project = Project::load(temp.path().to_path_buf(), Path::new("trowel.toml")).unwrap();

        assert_eq!(project.paths().dist_dir, "public");
        assert_eq!(project.paths().serve_root, "app");
        assert_eq!(project.config.server.port, 8080);
        assert_eq!(project.config.server.host, "127.0.0.1");
        assert!(!project.config.server.open);
        assert_eq!(project.resolve("public"), temp.path().join("public"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("trowel.toml"), "[server]\nport = \"many\"\n").unwrap();

        let err = load_config(&temp.path().join("trowel.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}

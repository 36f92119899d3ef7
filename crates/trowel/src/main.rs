//! Trowel CLI - asset pipelines and live-reload development for static sites.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use trowel_pipelines::Task;

mod commands;
mod config;

use config::Project;

#[derive(Parser)]
#[command(name = "trowel")]
#[command(about = "Asset pipelines and live-reload development for static sites")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to trowel.toml config file, relative to the project root
    #[arg(short, long, global = true, default_value = "trowel.toml")]
    config: PathBuf,

    /// Project root
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile, prefix and minify stylesheets
    Styles,

    /// Encode raster images to AVIF and WebP, copy SVGs
    Images,

    /// Convert fonts to WOFF and WOFF2
    Fonts,

    /// Expand component includes in pages
    Pages,

    /// Concatenate and minify scripts
    Scripts,

    /// Build everything, then watch sources and serve with live reload
    #[command(visible_alias = "dev")]
    Watch {
        /// Port to listen on (defaults to config or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not open browser
        #[arg(long)]
        no_open: bool,
    },

    /// Clean, run every pipeline and assemble the distribution
    Build,

    /// Remove the distribution directory
    Clean,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let project = Project::load(cli.root, &cli.config)?;

    match cli.command {
        Commands::Styles => commands::task::run(&project, Task::Styles)?,
        Commands::Images => commands::task::run(&project, Task::Images)?,
        Commands::Fonts => commands::task::run(&project, Task::Fonts)?,
        Commands::Pages => commands::task::run(&project, Task::Pages)?,
        Commands::Scripts => commands::task::run(&project, Task::Scripts)?,
        Commands::Watch { port, no_open } => {
            commands::watch::run(project, port, !no_open).await?;
        }
        Commands::Build => commands::build::run(&project)?,
        Commands::Clean => commands::clean::run(&project)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_is_an_alias_for_watch() {
        let cli = Cli::try_parse_from(["trowel", "dev", "--port", "8080", "--no-open"]).unwrap();

        match cli.command {
            Commands::Watch { port, no_open } => {
                assert_eq!(port, Some(8080));
                assert!(no_open);
            }
            _ => panic!("Expected watch command"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from(["trowel", "build", "--root", "site", "-v"]).unwrap();

        assert!(matches!(cli.command, Commands::Build));
        assert_eq!(cli.root, PathBuf::from("site"));
        assert_eq!(cli.config, PathBuf::from("trowel.toml"));
        assert!(cli.verbose);
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Cli::try_parse_from(["trowel", "deploy"]).is_err());
    }
}

//! CLI command definitions using clap.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use epha_core::{Config, ResolutionStrategy};

/// epha - annotation synchronization controller
#[derive(Parser, Debug)]
#[command(name = "epha")]
#[command(version)]
#[command(about = "Merges declared annotations onto Kubernetes resources")]
#[command(
    long_about = "epha watches AnnotatedObject resources and merges the annotations they declare onto the Deployments, ReplicaSets, or arbitrary resources they target."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller until interrupted
    Run {
        /// Path to a TOML configuration file
        #[arg(short, long, env = "EPHA_CONFIG")]
        config: Option<PathBuf>,

        /// Only watch AnnotatedObjects in this namespace
        #[arg(short, long)]
        namespace: Option<String>,

        /// Target resolution strategy
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<ResolutionStrategy>,
    },

    /// Print the AnnotatedObject CustomResourceDefinition as YAML
    Crd,
}

/// Assemble the effective configuration: defaults, then the file, then
/// `EPHA_*` environment variables, then command-line flags.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn resolve_config(
    path: Option<&Path>,
    namespace: Option<String>,
    strategy: Option<ResolutionStrategy>,
) -> epha_core::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env()?;

    if let Some(namespace) = namespace {
        config = config.with_namespace(namespace);
    }
    if let Some(strategy) = strategy {
        config = config.with_strategy(strategy);
    }

    config.validate()?;
    Ok(config)
}

fn parse_strategy(value: &str) -> Result<ResolutionStrategy, String> {
    value.parse().map_err(|e: epha_core::Error| e.to_string())
}

//! # epha - controller entry point
//!
//! `epha run` connects to the cluster (kubeconfig or in-cluster service
//! account) and reconciles `AnnotatedObject`s until SIGINT/SIGTERM.
//! `epha crd` prints the CustomResourceDefinition for installation.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use kube::{Client, CustomResourceExt};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use epha::cli::{Cli, Commands, resolve_config};
use epha::controller;
use epha_core::AnnotatedObject;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crd => print_crd(),
        Commands::Run {
            config,
            namespace,
            strategy,
        } => {
            let config = resolve_config(config.as_deref(), namespace, strategy)
                .context("Invalid configuration")?;

            init_tracing(&config.log_filter);

            let start_time = Instant::now();
            info!("epha starting...");

            let client = Client::try_default().await.context(
                "Failed to create Kubernetes client. Check KUBECONFIG or the in-cluster service account",
            )?;
            info!("Kubernetes client ready in {:?}", start_time.elapsed());

            controller::run(client, config)
                .await
                .context("Controller failed")?;

            info!("epha stopped gracefully");
            Ok(())
        }
    }
}

/// Initialize tracing subscriber; `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn print_crd() -> Result<()> {
    let manifest = serde_yaml::to_string(&AnnotatedObject::crd())
        .context("Failed to serialize CustomResourceDefinition")?;
    print!("{manifest}");
    Ok(())
}

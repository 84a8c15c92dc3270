// Copyright (c) 2025 - Cowboy AI, Inc.
//! Formation CLI
//!
//! Synthesizes, deploys, destroys and provisions projects against AWS.
//!
//! Run with: cargo run --bin formation --features aws -- deploy --project web.json staging
//!
//! Settings come from `FORMATION_*` environment variables (see
//! `FormationConfig::from_env`) and credentials from the standard AWS chain.

use anyhow::{Context, Result};
use aws_config::{BehaviorVersion, Region};
use cim_formation::{
    deploy::render, stack::CloudFormationService, storage::S3Store, DeployOptions, DestroyOptions,
    Formation, FormationConfig, Project, Target,
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "formation", version, about = "Declarative stack deployment")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct ProjectArgs {
    /// Project description (JSON)
    #[arg(long, env = "FORMATION_PROJECT")]
    project: PathBuf,

    /// Deployment target, e.g. staging
    target: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the main template without touching any remote service
    Synth {
        /// Project description (JSON)
        #[arg(long, env = "FORMATION_PROJECT")]
        project: PathBuf,
    },
    /// Publish artifacts and converge the stack
    Deploy {
        #[command(flatten)]
        args: ProjectArgs,

        /// Wait for the stack to become ready
        #[arg(long)]
        wait: bool,

        /// Confirm changes to a protected target
        #[arg(long)]
        yes: bool,
    },
    /// Delete the stack and its published artifacts
    Destroy {
        #[command(flatten)]
        args: ProjectArgs,

        /// Confirm changes to a protected target
        #[arg(long)]
        yes: bool,
    },
    /// Run the configuration-management pipeline
    Provision {
        #[command(flatten)]
        args: ProjectArgs,
    },
}

fn load_project(path: &Path) -> Result<Project> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse project file {}", path.display()))
}

async fn connect(config: &FormationConfig, project: &Project) -> Formation {
    let region = project
        .region
        .clone()
        .unwrap_or_else(|| config.region.clone());
    info!("🔌 Loading AWS configuration for {}", region);

    let sdk_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region))
        .load()
        .await;

    let formation = Formation::new(
        Arc::new(S3Store::from_conf(&sdk_config)),
        Arc::new(CloudFormationService::from_conf(&sdk_config)),
        config.clone(),
    );

    let cancel = formation.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });

    formation
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = FormationConfig::from_env().context("Invalid FORMATION_* configuration")?;

    match cli.command {
        Command::Synth { project } => {
            let project = load_project(&project)?;
            let region = project.region.as_deref().unwrap_or(&config.region);
            print!("{}", render(&project, region)?);
        }
        Command::Deploy { args, wait, yes } => {
            let project = load_project(&args.project)?;
            let target = Target::new(args.target)?;
            let formation = connect(&config, &project).await;

            let report = formation
                .deploy(
                    &project,
                    &target,
                    DeployOptions {
                        wait,
                        confirm_protected: yes,
                    },
                )
                .await?;
            info!(
                "✅ {} converged: {} ({} artifacts)",
                report.stack_name,
                report.convergence.state,
                report.artifacts.len()
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Destroy { args, yes } => {
            let project = load_project(&args.project)?;
            let target = Target::new(args.target)?;
            let formation = connect(&config, &project).await;

            let report = formation
                .destroy(&project, &target, DestroyOptions { confirm_protected: yes })
                .await?;
            info!(
                "🗑️  {} deleted, {} artifacts removed, {} hosts deregistered",
                report.stack_name,
                report.removed.len(),
                report.deregistered.len()
            );
        }
        Command::Provision { args } => {
            let project = load_project(&args.project)?;
            let target = Target::new(args.target)?;
            let formation = connect(&config, &project).await;

            let report = formation.provision(&project, &target).await?;
            info!(
                "✅ Provisioned {} hosts in {}",
                report.hosts.len(),
                report.environment
            );
        }
    }

    Ok(())
}

use crate::bridge::{bridge_for, BridgeContext};
use crate::config::loader::BridgeConfig;
use crate::config::types::{BridgeError, Result as BridgeResult};
use crate::core::service::Service;
use crate::core::status::ServiceStatus;
use crate::registry::json::JsonRegistry;
use crate::runtime::docker::DockerCli;
use crate::safety::volumes::VolumeLayout;
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to bridge.json (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and configure the helper sandboxes for an owner
    Setup {
        /// Owning sandbox name
        #[arg(long)]
        owner: String,
    },
    /// Launch the display proxy pair and record its handles
    Start {
        /// Owning sandbox name
        #[arg(long)]
        owner: String,
    },
    /// Stop the recorded proxy processes and remove their volumes
    Stop {
        /// Owning sandbox name
        #[arg(long)]
        owner: String,
    },
    /// Remove ephemeral bridge volumes
    Cleanup {
        /// Owning sandbox name
        #[arg(long)]
        owner: String,
    },
    /// Show bridge configuration and recorded process handles
    Status {
        /// Owning sandbox name
        #[arg(long)]
        owner: String,
    },
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = execute(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
    Ok(())
}

/// `<volumes-dir>/<bridge>/<owner>/status.json`, next to the owner lock.
fn status_path(config: &BridgeConfig, bridge: &dyn Service) -> PathBuf {
    VolumeLayout::new(&config.volumes_dir, bridge.name())
        .owner_dir(bridge.owner())
        .join("status.json")
}

fn execute(cli: Cli) -> BridgeResult<()> {
    let config = BridgeConfig::load_or_default(cli.config.as_deref())?;
    debug!("Using config: {:?}", config);

    let registry = Arc::new(JsonRegistry::open(&config.registry_path)?);
    let runtime = Arc::new(DockerCli::new(&config.docker_binary));
    let ctx = BridgeContext::new(config, registry, runtime);

    match cli.command {
        Commands::Setup { owner } => {
            let bridge = bridge_for(&owner, &ctx)?;
            bridge.setup()?;
            eprintln!("Bridge '{}' set up for {}", bridge.name(), owner);
        }
        Commands::Start { owner } => {
            let bridge = bridge_for(&owner, &ctx)?;
            let path = status_path(&ctx.config, bridge.as_ref());
            let mut status = ServiceStatus::load(&path)?;
            if !status.is_empty() {
                // Handles from an earlier start that was never stopped.
                return Err(BridgeError::AlreadyRunning { owner });
            }

            let result = bridge.start(&mut status);
            if !status.is_empty() {
                status.save(&path)?;
            }
            result?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Stop { owner } => {
            let bridge = bridge_for(&owner, &ctx)?;
            let path = status_path(&ctx.config, bridge.as_ref());
            let mut status = ServiceStatus::load(&path)?;
            bridge.stop(&mut status)?;
            ServiceStatus::discard(&path);
            eprintln!("Bridge for {} stopped", owner);
        }
        Commands::Cleanup { owner } => {
            let bridge = bridge_for(&owner, &ctx)?;
            bridge.clean_up();
            eprintln!("Bridge volumes for {} removed", owner);
        }
        Commands::Status { owner } => {
            let bridge = bridge_for(&owner, &ctx)?;
            let status = ServiceStatus::load(&status_path(&ctx.config, bridge.as_ref()))?;
            let report = serde_json::json!({
                "owner": owner,
                "bridge": bridge.name(),
                "state": bridge.state().to_string(),
                "setup": bridge.is_setup(),
                "handles": status,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

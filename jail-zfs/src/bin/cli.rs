// SPDX-License-Identifier: GPL-3.0-only

//! CLI wrapper around jail-zfs library for testing and manual operations

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use jail_types::TracingSink;
use jail_zfs::{DestroyOptions, VolumeBackend, VolumeManager, ZfsCli};

/// Volume lifecycle operations for jail datasets
#[derive(Parser)]
#[command(name = "jail-zfs-cli")]
#[command(about = "CLI tool for jail volume operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a volume and its descendants
    List {
        /// Volume name, e.g. tank/iocage/jails
        volume: String,
    },
    /// Create a volume including missing ancestors
    Create {
        volume: String,
    },
    /// Clone a volume subtree through a temporary snapshot
    Clone {
        source: String,
        target: String,
        /// Replace the target if it already exists
        #[arg(long)]
        force: bool,
    },
    /// Promote a volume and all descendant clones
    Promote {
        volume: String,
    },
    /// Destroy a volume and its children
    Destroy {
        volume: String,
        /// Keep the volume's snapshots (fails if there are any)
        #[arg(long)]
        keep_snapshots: bool,
        /// Also delete the snapshot the volume was cloned from
        #[arg(long)]
        origin_snapshot: bool,
    },
    /// List snapshots of a volume
    Snapshots {
        volume: String,
    },
    /// Rename a snapshot on a volume and its descendants
    RenameSnapshot {
        /// Snapshot as volume@name
        snapshot: String,
        new_name: String,
    },
}

fn main() -> Result<()> {
    // Initialize tracing to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let manager = VolumeManager::new(Arc::new(ZfsCli::new()?)).with_events(Arc::new(TracingSink));

    match cli.command {
        Commands::List { volume } => {
            let mut volumes = vec![manager.get_volume(&volume)?];
            for child in manager.children_recursive(&volume)? {
                volumes.push(manager.get_volume(&child)?);
            }
            println!("{}", serde_json::to_string(&volumes)?);
        }
        Commands::Create { volume } => {
            let info = manager.create_volume(&volume)?;
            println!("{}", serde_json::to_string(&info)?);
        }
        Commands::Clone {
            source,
            target,
            force,
        } => {
            let cloned = manager.clone_volume(&source, &target, force)?;
            println!("{}", serde_json::to_string(&cloned)?);
        }
        Commands::Promote { volume } => {
            let promoted = manager.promote_volume(&volume)?;
            println!("{}", serde_json::to_string(&promoted)?);
        }
        Commands::Destroy {
            volume,
            keep_snapshots,
            origin_snapshot,
        } => {
            let options = DestroyOptions {
                delete_snapshots: !keep_snapshots,
                delete_origin_snapshot: origin_snapshot,
            };
            manager.destroy_volume(&volume, options)?;
            println!("{{\"success\": true}}");
        }
        Commands::Snapshots { volume } => {
            let snapshots = manager.backend().snapshots(&volume)?;
            println!("{}", serde_json::to_string(&snapshots)?);
        }
        Commands::RenameSnapshot { snapshot, new_name } => {
            manager.rename_snapshot_recursive(&snapshot, &new_name)?;
            println!("{{\"success\": true}}");
        }
    }

    Ok(())
}

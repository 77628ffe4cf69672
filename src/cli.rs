use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "port-selector")]
#[command(version)]
#[command(about = "Stable TCP ports for development directories")]
pub struct Cli {
    /// Allocation name within the directory (e.g. web, api, db)
    #[arg(short, long, global = true, default_value = "main")]
    pub name: String,

    /// Directory to allocate for (defaults to the current directory)
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// Directory holding config.yaml and allocations.yaml
    #[arg(long, global = true, env = "PORT_SELECTOR_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Print the port for this directory, allocating one if needed [default]
    Get,
    /// List all allocations
    #[command(alias = "ls")]
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Lock this directory's port, or a specific port, to this directory
    Lock {
        /// Port to lock (defaults to the directory's current port)
        port: Option<u16>,

        /// Take the port over from another directory
        #[arg(short, long)]
        force: bool,
    },
    /// Unlock this directory's ports, or a specific port
    Unlock {
        /// Port to unlock (defaults to every port of this directory and name)
        port: Option<u16>,
    },
    /// Remove allocations for this directory and name
    Forget {
        /// Remove every allocation of every directory
        #[arg(long, conflicts_with = "port")]
        all: bool,

        /// Remove the allocation of this port only
        #[arg(long)]
        port: Option<u16>,
    },
    /// Record busy ports in the configured range that have no allocation
    Scan,
    /// Reclaim unlocked allocations idle longer than allocationTTL
    Expire,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Get
    }
}

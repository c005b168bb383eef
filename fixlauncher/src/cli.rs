pub use clap::Parser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Launcher data directory (defaults to the platform location)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List versions that can be installed
    Versions,

    /// Download or verify a version without starting it
    Install {
        /// Version selector, e.g. `evacuation`, `release:1.20.1`, `fabric:1.21.4`
        version: Option<String>,
    },

    /// Install if needed and start the game
    Launch {
        /// Version selector; the saved selection when omitted
        version: Option<String>,

        /// Player name for this launch
        #[arg(long)]
        player: Option<String>,

        /// Heap size in GB
        #[arg(long)]
        ram: Option<u32>,

        /// Stay attached until the game exits
        #[arg(long)]
        wait: bool,
    },

    /// Check and repair the survival build's files
    Repair,

    /// Manage mods of a profile
    Mods {
        #[command(subcommand)]
        command: ModsCommands,
    },

    /// Show accumulated play time
    Playtime,
}

#[derive(Subcommand)]
pub enum ModsCommands {
    /// List installed mods and known conflicts
    List {
        version: Option<String>,
    },
    /// Enable a mod by file name
    Enable {
        file_name: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Disable a mod by file name
    Disable {
        file_name: String,
        #[arg(long)]
        version: Option<String>,
    },
    /// Delete a mod by file name
    Delete {
        file_name: String,
        #[arg(long)]
        version: Option<String>,
    },
}

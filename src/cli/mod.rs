//! Command-line surface.
//!
//! - [`Cli`]: clap argument definitions
//! - [`CommandController`]: runs commands against the settings, the config
//!   file and the assignment engine

pub mod controller;

pub use controller::CommandController;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Directory (inside the vault) holding `vaultid.yaml` unless `--config-dir` is given.
pub const DEFAULT_CONFIG_DIR: &str = ".vaultid";

#[derive(Parser, Debug)]
#[command(name = "vaultid", version, about = "Give every note in a markdown vault a stable ID", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Vault root directory
    #[arg(long, global = true, default_value = ".")]
    pub vault: Utf8PathBuf,

    /// Directory holding vaultid.yaml [default: <vault>/.vaultid]
    #[arg(long, global = true)]
    pub config_dir: Option<Utf8PathBuf>,

    /// Directory for rotating log files [default: <config-dir>/logs]
    #[arg(long, global = true)]
    pub log_dir: Option<Utf8PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Do not echo logs to the console
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    pub fn config_dir(&self) -> Utf8PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(|| self.vault.join(DEFAULT_CONFIG_DIR))
    }

    pub fn log_dir(&self) -> Utf8PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.config_dir().join("logs"))
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Add an ID to all notes
    AssignAll,

    /// Add an ID to one note if it has none
    Assign {
        /// Note path relative to the vault root
        path: String,
    },

    /// Rename the ID key, moving existing IDs to the new key first
    SetKey {
        /// New front matter key
        key: String,
    },

    /// Replace the ignore patterns (regular expressions matched against note paths)
    SetIgnore {
        /// Patterns; pass none to clear the list
        patterns: Vec<String>,

        /// Read patterns from a file, one per line
        #[arg(long, conflicts_with = "patterns")]
        file: Option<Utf8PathBuf>,
    },

    /// Print the effective settings
    ShowConfig {
        /// Fail instead of falling back to defaults when the settings file is broken
        #[arg(long)]
        strict: bool,
    },

    /// Assign IDs to notes as they are created or edited, until Ctrl-C
    Watch {
        /// Run assign-all once before watching
        #[arg(long)]
        initial_scan: bool,
    },
}

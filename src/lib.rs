// vaultid - Stable identifiers for markdown notes
//
// This is the library crate containing the identifier assignment and key
// migration logic plus the vault, settings and watcher collaborators.
// The binary crate (main.rs) provides the CLI entry point.

pub mod cli;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod watcher;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::Metrics;
pub use models::{Document, Metadata, Settings};
pub use services::{AssignOutcome, AssignmentEngine, BatchReport, ExclusionFilter, MigrationReport};
pub use state::{SettingsChange, SettingsManager};
pub use store::{DocumentStore, MemoryStore, StoreError, VaultStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

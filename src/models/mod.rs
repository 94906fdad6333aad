//! Data models for vaultid.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`Settings`]: The persisted configuration (`vaultid.yaml`): identifier key name,
//!   ignore patterns and write concurrency
//! - [`Document`]: A handle to one note in the vault, identified by its vault-relative path
//! - [`Metadata`]: The front matter mapping of a document
//!
//! # Architecture Note
//!
//! The models are designed to be:
//! - **Serializable**: `Settings` derives `Serialize`/`Deserialize` for YAML persistence
//! - **Explicit**: core operations take `&Settings` as a parameter; the shared copy lives
//!   in [`SettingsManager`](crate::state::SettingsManager)

pub mod config;
pub mod document;

pub use config::{DEFAULT_ID_KEY, DEFAULT_MAX_CONCURRENT_WRITES, Settings, is_blank_pattern};
pub use document::{Document, Metadata, has_truthy_value, is_truthy};

//! Services module - Identifier assignment and key migration.
//!
//! This module contains the core logic of vaultid. The services are
//! **framework-agnostic**: they know nothing about the CLI, the watcher or the
//! filesystem, and reach documents only through a
//! [`DocumentStore`](crate::store::DocumentStore).
//!
//! # Components
//!
//! - [`identifier`]: generates time-sortable unique identifiers (UUIDv7)
//! - [`exclusion`]: [`ExclusionFilter`], the compiled ignore patterns deciding
//!   which paths are in scope
//! - [`assignment`]: [`AssignmentEngine`], which
//!   - writes an identifier to a document that lacks one (`assign_if_missing`)
//!   - catches up a whole vault (`assign_all`)
//!   - moves identifiers when the key name changes (`migrate_key`)
//!
//! # Usage Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use vaultid::{AssignmentEngine, Settings, VaultStore};
//!
//! let store = Arc::new(VaultStore::new("my-vault"));
//! let engine = AssignmentEngine::new(store);
//!
//! let report = engine.assign_all(&Settings::default()).await?;
//! println!("{}", report.summary());
//!
//! engine.migrate_key("id", "uid").await?;
//! ```

pub mod assignment;
pub mod exclusion;
pub mod identifier;

pub use assignment::{
    AssignError, AssignOutcome, AssignmentEngine, BatchReport, DocumentFailure, ExclusionReason,
    MigrationReport, rename_key,
};
pub use exclusion::{ExclusionFilter, InvalidPattern, is_ignored};

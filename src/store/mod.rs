//! Document storage collaborators.
//!
//! The assignment engine never touches files directly. It talks to a
//! [`DocumentStore`], which provides three things:
//!
//! - a snapshot listing of every managed document
//! - a read of a document's current front matter
//! - a scoped read-modify-write of that front matter ([`DocumentStore::process_metadata`])
//!
//! # Implementations
//!
//! - [`VaultStore`]: markdown files under a directory, YAML front matter, atomic
//!   writes and a per-document lock so overlapping read-modify-writes on the
//!   same note are serialized
//! - [`MemoryStore`]: an in-memory store with write counters and fault
//!   injection, for tests and dry runs

pub mod front_matter;
pub mod memory;
pub mod vault;

pub use memory::MemoryStore;
pub use vault::VaultStore;

use crate::models::{Document, Metadata};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Mutation applied inside a scoped read-modify-write.
///
/// Receives the freshly read front matter (empty if the document has none)
/// and edits it in place.
pub type MetadataMutator = Box<dyn FnOnce(&mut Metadata) + Send>;

/// Errors raised by document stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document path escapes the vault: {0}")]
    OutsideVault(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid front matter in {path}: {message}")]
    InvalidFrontMatter { path: String, message: String },

    #[error("Failed to write front matter for {path}: {message}")]
    Write { path: String, message: String },
}

/// Source of documents and their front matter.
///
/// Implementations must make `process_metadata` atomic with respect to other
/// `process_metadata` calls on the same document: read the latest state, apply
/// the mutator, write back, release on every exit path.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Snapshot of all managed documents at call time.
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError>;

    /// Current front matter, `None` if the document has none.
    async fn read_metadata(&self, doc: &Document) -> Result<Option<Metadata>, StoreError>;

    /// Scoped read-modify-write of the document's front matter.
    async fn process_metadata(
        &self,
        doc: &Document,
        mutator: MetadataMutator,
    ) -> Result<(), StoreError>;
}

use super::{DocumentStore, MetadataMutator, StoreError};
use crate::models::{Document, Metadata};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// In-memory document store.
///
/// Documents keep insertion order. Front matter is `None` for documents
/// without a metadata block. Writes for selected paths can be made to fail to
/// exercise error handling in bulk operations.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<IndexMap<String, Option<Metadata>>>,
    failing_writes: Mutex<HashSet<String>>,
    writes: AtomicUsize,
    write_attempts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_document(self, path: impl Into<String>, metadata: Option<Metadata>) -> Self {
        self.insert(path, metadata);
        self
    }

    /// Insert or replace a document.
    pub fn insert(&self, path: impl Into<String>, metadata: Option<Metadata>) {
        self.documents().insert(path.into(), metadata);
    }

    /// Current front matter of `path`; outer `None` if the document does not exist.
    pub fn metadata(&self, path: &str) -> Option<Option<Metadata>> {
        self.documents().get(path).cloned()
    }

    /// Make every `process_metadata` call on `path` fail.
    pub fn fail_writes_for(&self, path: impl Into<String>) {
        self.failing_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into());
    }

    /// Number of successful read-modify-writes.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of read-modify-writes attempted, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts.load(Ordering::Relaxed)
    }

    fn documents(&self) -> MutexGuard<'_, IndexMap<String, Option<Metadata>>> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_fails(&self, path: &str) -> bool {
        self.failing_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(path)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self.documents().keys().map(Document::new).collect())
    }

    async fn read_metadata(&self, doc: &Document) -> Result<Option<Metadata>, StoreError> {
        self.documents()
            .get(doc.path())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(doc.path.clone()))
    }

    async fn process_metadata(
        &self,
        doc: &Document,
        mutator: MetadataMutator,
    ) -> Result<(), StoreError> {
        self.write_attempts.fetch_add(1, Ordering::Relaxed);

        if self.write_fails(doc.path()) {
            return Err(StoreError::Write {
                path: doc.path.clone(),
                message: "injected write failure".to_string(),
            });
        }

        // Held across the mutation: one read-modify-write at a time.
        let mut documents = self.documents();
        let slot = documents
            .get_mut(doc.path())
            .ok_or_else(|| StoreError::NotFound(doc.path.clone()))?;

        let mut metadata = slot.clone().unwrap_or_default();
        mutator(&mut metadata);
        *slot = Some(metadata);

        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

use crate::metrics::Metrics;
use crate::models::{Document, Metadata, Settings, has_truthy_value, is_truthy};
use crate::services::exclusion::{ExclusionFilter, InvalidPattern};
use crate::services::identifier;
use crate::store::{DocumentStore, StoreError};
use serde_yaml_ng::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Errors from single-document assignment and from listing the collection
#[derive(Error, Debug)]
pub enum AssignError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a document was left out of assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// The path matched an ignore pattern.
    Matched,
    /// The ignore patterns failed to compile; every document is excluded.
    InvalidPattern(InvalidPattern),
}

/// Result of [`AssignmentEngine::assign_if_missing`] for one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignOutcome {
    /// A fresh identifier was written.
    Assigned(String),
    /// The document already had a truthy value under the key.
    AlreadyPresent,
    /// The document is out of scope.
    Excluded(ExclusionReason),
}

/// A document a bulk operation could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub path: String,
    pub message: String,
}

/// Summary of [`AssignmentEngine::assign_all`]
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub total: usize,
    pub assigned: usize,
    pub already_present: usize,
    pub excluded: usize,
    pub failures: Vec<DocumentFailure>,
    /// Set when the ignore patterns did not compile; nothing was written.
    pub invalid_pattern: Option<InvalidPattern>,
    pub duration: Duration,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} notes: {} assigned, {} already had an ID, {} ignored, {} failed",
            self.total,
            self.assigned,
            self.already_present,
            self.excluded,
            self.failures.len()
        );
        if let Some(invalid) = &self.invalid_pattern {
            summary.push_str(&format!(" ({invalid})"));
        }
        summary
    }
}

/// Summary of [`AssignmentEngine::migrate_key`]
#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub untouched: usize,
    pub failures: Vec<DocumentFailure>,
    pub duration: Duration,
}

impl MigrationReport {
    pub fn summary(&self) -> String {
        format!(
            "{} notes: {} migrated, {} untouched, {} failed",
            self.total,
            self.migrated,
            self.untouched,
            self.failures.len()
        )
    }
}

/// Assigns identifiers to documents and migrates them between keys.
///
/// The engine owns a handle to the document store and nothing else: settings
/// are passed into every call, so a caller decides which snapshot applies.
///
/// # Bulk operations
///
/// `assign_all` and `migrate_key` take a snapshot of the collection, spawn one
/// task per document on a [`JoinSet`] and wait for all of them. Completion
/// order is unspecified. A failure in one task is recorded in the report and
/// never stops the others. A semaphore caps the number of documents in flight.
pub struct AssignmentEngine<S: DocumentStore> {
    store: Arc<S>,
    metrics: Arc<Metrics>,
    concurrency: usize,
}

impl<S: DocumentStore> Clone for AssignmentEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
            concurrency: self.concurrency,
        }
    }
}

impl<S: DocumentStore> AssignmentEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            metrics: Arc::new(Metrics::new()),
            concurrency: crate::models::DEFAULT_MAX_CONCURRENT_WRITES,
        }
    }

    /// Share a metrics instance with the caller.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Limit the number of documents processed at once by bulk operations.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Write a fresh identifier to `doc` if it is in scope and has none.
    ///
    /// Store failures propagate. Malformed ignore patterns do not: they are
    /// logged and the document is treated as excluded.
    pub async fn assign_if_missing(
        &self,
        doc: &Document,
        settings: &Settings,
    ) -> Result<AssignOutcome, AssignError> {
        let filter = match ExclusionFilter::from_settings(settings) {
            Ok(filter) => filter,
            Err(invalid) => {
                tracing::warn!("{}; not assigning an ID to {}", invalid, doc);
                self.metrics.record_excluded();
                return Ok(AssignOutcome::Excluded(ExclusionReason::InvalidPattern(
                    invalid,
                )));
            }
        };

        let outcome = assign_document(self.store.as_ref(), doc, &filter, &settings.id_key).await?;
        self.metrics.record_outcome(&outcome);
        Ok(outcome)
    }

    /// Run [`assign_if_missing`](Self::assign_if_missing) over every document.
    ///
    /// The ignore patterns are compiled once. If they are malformed the error is
    /// reported once and no document is touched.
    pub async fn assign_all(&self, settings: &Settings) -> Result<BatchReport, AssignError> {
        let start = Instant::now();
        let documents = self.store.list_documents().await?;
        let mut report = BatchReport {
            total: documents.len(),
            ..BatchReport::default()
        };

        let filter = match ExclusionFilter::from_settings(settings) {
            Ok(filter) => Arc::new(filter),
            Err(invalid) => {
                tracing::error!(
                    "{}; skipping all {} notes until the pattern is fixed",
                    invalid,
                    documents.len()
                );
                report.excluded = documents.len();
                self.metrics.record_excluded_count(documents.len());
                report.invalid_pattern = Some(invalid);
                report.duration = start.elapsed();
                return Ok(report);
            }
        };

        tracing::info!(
            "Assigning IDs under key {:?} to {} notes ({} ignore patterns)",
            settings.id_key,
            documents.len(),
            filter.len()
        );

        let id_key: Arc<str> = Arc::from(settings.id_key.as_str());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for doc in documents {
            let store = Arc::clone(&self.store);
            let filter = Arc::clone(&filter);
            let id_key = Arc::clone(&id_key);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = assign_document(store.as_ref(), &doc, &filter, &id_key).await;
                (doc, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    self.metrics.record_outcome(&outcome);
                    match outcome {
                        AssignOutcome::Assigned(_) => report.assigned += 1,
                        AssignOutcome::AlreadyPresent => report.already_present += 1,
                        AssignOutcome::Excluded(_) => report.excluded += 1,
                    }
                }
                Ok((doc, Err(e))) => {
                    tracing::error!("Failed to assign an ID to {}: {}", doc, e);
                    self.metrics.record_failed();
                    report.failures.push(DocumentFailure {
                        path: doc.path,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                    self.metrics.record_failed();
                    report.failures.push(DocumentFailure {
                        path: String::new(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.duration = start.elapsed();
        tracing::info!("Assign all finished: {}", report.summary());
        Ok(report)
    }

    /// Move identifiers from `old_key` to `new_key` across the collection.
    ///
    /// Only documents with a truthy value under `old_key` are rewritten; the
    /// value is copied unchanged and `old_key` removed. Ignore patterns do not
    /// apply. Same-key calls return immediately without listing documents.
    pub async fn migrate_key(
        &self,
        old_key: &str,
        new_key: &str,
    ) -> Result<MigrationReport, AssignError> {
        if old_key == new_key {
            tracing::debug!("ID key unchanged ({:?}), nothing to migrate", old_key);
            return Ok(MigrationReport::default());
        }

        let start = Instant::now();
        let documents = self.store.list_documents().await?;
        let mut report = MigrationReport {
            total: documents.len(),
            ..MigrationReport::default()
        };

        tracing::info!(
            "Migrating IDs from {:?} to {:?} across {} notes",
            old_key,
            new_key,
            documents.len()
        );

        let old_key: Arc<str> = Arc::from(old_key);
        let new_key: Arc<str> = Arc::from(new_key);
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for doc in documents {
            let store = Arc::clone(&self.store);
            let old_key = Arc::clone(&old_key);
            let new_key = Arc::clone(&new_key);
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = migrate_document(store.as_ref(), &doc, &old_key, &new_key).await;
                (doc, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(true))) => {
                    self.metrics.record_migrated();
                    report.migrated += 1;
                }
                Ok((_, Ok(false))) => report.untouched += 1,
                Ok((doc, Err(e))) => {
                    tracing::error!("Failed to migrate ID in {}: {}", doc, e);
                    self.metrics.record_failed();
                    report.failures.push(DocumentFailure {
                        path: doc.path,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::error!("Task join error: {}", e);
                    self.metrics.record_failed();
                    report.failures.push(DocumentFailure {
                        path: String::new(),
                        message: e.to_string(),
                    });
                }
            }
        }

        report.duration = start.elapsed();
        tracing::info!("Key migration finished: {}", report.summary());
        Ok(report)
    }
}

/// Per-document assignment with an already compiled filter.
async fn assign_document<S: DocumentStore + ?Sized>(
    store: &S,
    doc: &Document,
    filter: &ExclusionFilter,
    id_key: &str,
) -> Result<AssignOutcome, StoreError> {
    if filter.is_ignored(doc.path()) {
        tracing::trace!("Ignoring {}", doc);
        return Ok(AssignOutcome::Excluded(ExclusionReason::Matched));
    }

    let metadata = store.read_metadata(doc).await?;
    if metadata
        .as_ref()
        .is_some_and(|metadata| has_truthy_value(metadata, id_key))
    {
        return Ok(AssignOutcome::AlreadyPresent);
    }

    let id = identifier::generate();
    let written = Arc::new(AtomicBool::new(false));
    let mutator = {
        let written = Arc::clone(&written);
        let key = id_key.to_string();
        let value = id.clone();
        Box::new(move |metadata: &mut Metadata| {
            // Re-checked on the fresh block: an overlapping call may have won.
            if has_truthy_value(metadata, &key) {
                return;
            }
            metadata.insert(Value::String(key), Value::String(value));
            written.store(true, Ordering::Release);
        })
    };

    store.process_metadata(doc, mutator).await?;

    if written.load(Ordering::Acquire) {
        tracing::debug!("Assigned {} to {}", id, doc);
        Ok(AssignOutcome::Assigned(id))
    } else {
        Ok(AssignOutcome::AlreadyPresent)
    }
}

/// Per-document key migration. Returns whether the document was rewritten.
async fn migrate_document<S: DocumentStore + ?Sized>(
    store: &S,
    doc: &Document,
    old_key: &str,
    new_key: &str,
) -> Result<bool, StoreError> {
    let metadata = store.read_metadata(doc).await?;
    if !metadata
        .as_ref()
        .is_some_and(|metadata| has_truthy_value(metadata, old_key))
    {
        return Ok(false);
    }

    let moved = Arc::new(AtomicBool::new(false));
    let mutator = {
        let moved = Arc::clone(&moved);
        let old_key = old_key.to_string();
        let new_key = new_key.to_string();
        Box::new(move |metadata: &mut Metadata| {
            if rename_key(metadata, &old_key, &new_key) {
                moved.store(true, Ordering::Release);
            }
        })
    };

    store.process_metadata(doc, mutator).await?;
    Ok(moved.load(Ordering::Acquire))
}

/// Rename `old_key` to `new_key` in place, keeping the entry's position.
///
/// Does nothing unless `old_key` holds a truthy value. Any existing `new_key`
/// entry is dropped, wherever it sits, and replaced by the moved value.
pub fn rename_key(metadata: &mut Metadata, old_key: &str, new_key: &str) -> bool {
    if old_key == new_key {
        return false;
    }
    let Some(value) = metadata.get(old_key) else {
        return false;
    };
    if !is_truthy(value) {
        return false;
    }

    let entries = std::mem::take(metadata);
    *metadata = entries
        .into_iter()
        .filter_map(|(key, value)| {
            if key.as_str() == Some(new_key) {
                None
            } else if key.as_str() == Some(old_key) {
                Some((Value::String(new_key.to_string()), value))
            } else {
                Some((key, value))
            }
        })
        .collect();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn metadata(yaml: &str) -> Metadata {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    fn settings(ignore: &str) -> Settings {
        Settings {
            ignore_file_regex: ignore.to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_rename_key_keeps_position() {
        let mut m = metadata("title: T\nid: X\ntags: [a]\n");
        assert!(rename_key(&mut m, "id", "uid"));

        let keys: Vec<_> = m.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["title", "uid", "tags"]);
        assert_eq!(m.get("uid"), Some(&Value::from("X")));
    }

    #[test]
    fn test_rename_key_overwrites_existing_target() {
        let mut m = metadata("uid: stale\nid: X\n");
        assert!(rename_key(&mut m, "id", "uid"));

        assert_eq!(m.len(), 1);
        assert_eq!(m.get("uid"), Some(&Value::from("X")));
    }

    #[test]
    fn test_rename_key_overwrites_later_target() {
        let mut m = metadata("title: T\nid: X\nuid: stale\n");
        assert!(rename_key(&mut m, "id", "uid"));

        let keys: Vec<_> = m.keys().filter_map(Value::as_str).collect();
        assert_eq!(keys, vec!["title", "uid"]);
        assert_eq!(m.get("uid"), Some(&Value::from("X")));
    }

    #[test]
    fn test_rename_key_same_key_is_noop() {
        let mut m = metadata("id: X\n");
        assert!(!rename_key(&mut m, "id", "id"));
        assert_eq!(m, metadata("id: X\n"));
    }

    #[test]
    fn test_rename_key_ignores_falsy() {
        let mut m = metadata("id: ''\n");
        assert!(!rename_key(&mut m, "id", "uid"));
        assert!(m.get("uid").is_none());
    }

    #[tokio::test]
    async fn test_assign_if_missing_writes_identifier() {
        let store = Arc::new(MemoryStore::new().with_document("a.md", None));
        let engine = AssignmentEngine::new(Arc::clone(&store));

        let outcome = engine
            .assign_if_missing(&Document::new("a.md"), &Settings::default())
            .await
            .unwrap();

        let AssignOutcome::Assigned(id) = outcome else {
            panic!("expected assignment, got {outcome:?}");
        };
        let stored = store.metadata("a.md").unwrap().unwrap();
        assert_eq!(stored.get("id"), Some(&Value::String(id)));
    }

    #[tokio::test]
    async fn test_empty_value_is_regenerated() {
        let store = Arc::new(MemoryStore::new().with_document("a.md", Some(metadata("id: ''\n"))));
        let engine = AssignmentEngine::new(Arc::clone(&store));

        let outcome = engine
            .assign_if_missing(&Document::new("a.md"), &Settings::default())
            .await
            .unwrap();

        assert!(matches!(outcome, AssignOutcome::Assigned(_)));
        let stored = store.metadata("a.md").unwrap().unwrap();
        assert!(has_truthy_value(&stored, "id"));
    }

    #[tokio::test]
    async fn test_invalid_pattern_fails_safe() {
        let store = Arc::new(MemoryStore::new().with_document("a.md", None));
        let engine = AssignmentEngine::new(Arc::clone(&store));

        let outcome = engine
            .assign_if_missing(&Document::new("a.md"), &settings("(unclosed"))
            .await
            .unwrap();

        match outcome {
            AssignOutcome::Excluded(ExclusionReason::InvalidPattern(invalid)) => {
                assert_eq!(invalid.pattern, "(unclosed");
            }
            other => panic!("expected fail-safe exclusion, got {other:?}"),
        }
        assert_eq!(store.write_attempts(), 0);
    }

    #[tokio::test]
    async fn test_assign_all_invalid_pattern_touches_nothing() {
        let store = Arc::new(
            MemoryStore::new()
                .with_document("a.md", None)
                .with_document("b.md", None),
        );
        let engine = AssignmentEngine::new(Arc::clone(&store));

        let report = engine.assign_all(&settings("^ok/\n[bad")).await.unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.excluded, 2);
        assert_eq!(report.assigned, 0);
        assert_eq!(report.invalid_pattern.unwrap().pattern, "[bad");
        assert_eq!(store.write_attempts(), 0);
        assert_eq!(engine.metrics().snapshot().excluded, 2);
    }

    #[tokio::test]
    async fn test_migrate_same_key_is_noop() {
        let store = Arc::new(MemoryStore::new().with_document("a.md", Some(metadata("id: X\n"))));
        let engine = AssignmentEngine::new(Arc::clone(&store));

        let report = engine.migrate_key("id", "id").await.unwrap();

        assert_eq!(report.total, 0);
        assert_eq!(store.write_attempts(), 0);
        assert_eq!(store.metadata("a.md").unwrap(), Some(metadata("id: X\n")));
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let store = Arc::new(
            MemoryStore::new()
                .with_document("a.md", None)
                .with_document("b.md", Some(metadata("id: X\n"))),
        );
        let engine = AssignmentEngine::new(Arc::clone(&store)).with_concurrency(1);

        engine.assign_all(&Settings::default()).await.unwrap();

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.assigned, 1);
        assert_eq!(snapshot.already_present, 1);
    }
}

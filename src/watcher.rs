//! File system watcher for vault changes.
//!
//! Watches the vault directory and forwards every created or modified note as
//! a [`Document`] on a tokio channel. The command layer runs
//! `assign_if_missing` for each one, so notes get an ID as soon as they are
//! saved.
//!
//! Backends report absolute paths, usually canonical ones (FSEvents resolves
//! symlinks), while the vault root may be given as `.` or through a symlink.
//! Event paths are therefore matched against the canonical root as well as
//! the root as configured.

use crate::models::Document;
use crate::store::VaultStore;
use crate::store::vault::document_for_path;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// File system watcher for a vault.
///
/// Dropping the watcher stops notifications and closes the channel.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    root: Utf8PathBuf,
}

impl VaultWatcher {
    /// Start watching `store`'s root recursively.
    ///
    /// # Returns
    /// The watcher and the receiving end of the document channel
    pub fn new(store: Arc<VaultStore>) -> Result<(Self, mpsc::UnboundedReceiver<Document>)> {
        let roots = watch_roots(store.root());
        let root = roots[0].clone();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    for doc in documents_for_event(&roots, &event) {
                        if event_tx.send(doc).is_err() {
                            debug!("Document channel closed, dropping event");
                            return;
                        }
                    }
                }
                Err(e) => warn!("File watcher error: {}", e),
            }
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(root.as_std_path(), RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch vault: {}", root))?;

        info!("Started watching vault at {}", root);

        Ok((
            Self {
                _watcher: watcher,
                root,
            },
            event_rx,
        ))
    }

    /// Canonical vault root being watched.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

/// Roots event paths are matched against, canonical first.
fn watch_roots(root: &Utf8Path) -> Vec<Utf8PathBuf> {
    let mut roots = Vec::with_capacity(2);
    match root.canonicalize_utf8() {
        Ok(canonical) => roots.push(canonical),
        Err(e) => warn!("Cannot resolve vault root {}: {}", root, e),
    }
    if roots.first().map(Utf8PathBuf::as_path) != Some(root) {
        roots.push(root.to_path_buf());
    }
    roots
}

/// Whether an event kind can leave a note without an ID.
fn is_relevant_kind(kind: &EventKind) -> bool {
    matches!(kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Documents touched by a notify event.
fn documents_for_event(roots: &[Utf8PathBuf], event: &Event) -> Vec<Document> {
    if !is_relevant_kind(&event.kind) {
        return Vec::new();
    }

    let mut documents: Vec<Document> = event
        .paths
        .iter()
        .filter_map(|path| Utf8Path::from_path(path))
        .filter_map(|path| {
            let doc = roots
                .iter()
                .find_map(|root| document_for_path(root, path));
            if doc.is_none() {
                trace!("Ignoring change outside the managed notes: {}", path);
            }
            doc
        })
        .collect();
    documents.dedup();
    documents
}

use super::{DocumentStore, MetadataMutator, StoreError, front_matter};
use crate::models::{Document, Metadata};
use async_trait::async_trait;
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use walkdir::{DirEntry, WalkDir};

/// Extension of managed documents.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Markdown vault on disk.
///
/// Every `*.md` file below `root` is a document, except those inside hidden
/// directories (`.obsidian`, `.git`, `.trash`, the vaultid config directory).
/// Front matter is YAML between `---` lines at the top of the file.
///
/// # Write model
///
/// - `process_metadata` holds a per-document async lock across read, mutate
///   and write, so overlapping read-modify-writes on one note are serialized
///   while different notes proceed independently.
/// - Files are only rewritten when the mutation changed the mapping.
/// - Writes go to a hidden sibling temp file which is then renamed over the
///   original.
#[derive(Debug)]
pub struct VaultStore {
    root: Utf8PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VaultStore {
    pub fn new<P: AsRef<Utf8Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute path of a document, rejecting paths that leave the vault.
    pub fn resolve(&self, doc: &Document) -> Result<Utf8PathBuf, StoreError> {
        let relative = Utf8Path::new(doc.path());
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Utf8Component::Normal(_) | Utf8Component::CurDir));
        if escapes || doc.path().is_empty() {
            return Err(StoreError::OutsideVault(doc.path.clone()));
        }
        Ok(self.root.join(relative))
    }

    /// Document handle for an absolute path inside the vault, if it is a managed document.
    pub fn document_for_path(&self, path: &Utf8Path) -> Option<Document> {
        document_for_path(&self.root, path)
    }

    fn lock_for(&self, doc: &Document) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(locks.entry(doc.path.clone()).or_default())
    }

    async fn read_content(&self, doc: &Document) -> Result<String, StoreError> {
        let path = self.resolve(doc)?;
        tokio::fs::read_to_string(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(doc.path.clone())
            } else {
                StoreError::Io { path, source }
            }
        })
    }

    async fn write_content(&self, doc: &Document, content: &str) -> Result<(), StoreError> {
        let path = self.resolve(doc)?;
        let file_name = path.file_name().unwrap_or(doc.path());
        let temp_path = path.with_file_name(format!(".{file_name}.vaultid-tmp"));

        if let Err(source) = tokio::fs::write(&temp_path, content).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io {
                path: temp_path,
                source,
            });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Io { path, source });
        }

        tracing::debug!("Wrote front matter for {}", doc);
        Ok(())
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Document handle for `path` if it lies under `root` and is a managed note.
pub(crate) fn document_for_path(root: &Utf8Path, path: &Utf8Path) -> Option<Document> {
    let relative = path.strip_prefix(root).ok()?;
    if relative.extension() != Some(DOCUMENT_EXTENSION) {
        return None;
    }

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Utf8Component::Normal(part) if !part.starts_with('.') => parts.push(part),
            _ => return None,
        }
    }
    Some(Document::new(parts.join("/")))
}

fn walk_documents(root: &Utf8Path) -> Vec<Document> {
    let mut documents: Vec<Document> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable vault entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| match Utf8PathBuf::from_path_buf(entry.into_path()) {
            Ok(path) => document_for_path(root, &path),
            Err(path) => {
                tracing::warn!("Skipping non UTF-8 path: {}", path.display());
                None
            }
        })
        .collect();

    documents.sort();
    documents
}

#[async_trait]
impl DocumentStore for VaultStore {
    async fn list_documents(&self) -> Result<Vec<Document>, StoreError> {
        let root = self.root.clone();
        let documents = tokio::task::spawn_blocking(move || walk_documents(&root))
            .await
            .map_err(|e| StoreError::Io {
                path: self.root.clone(),
                source: std::io::Error::other(e),
            })?;

        tracing::debug!("Listed {} documents under {}", documents.len(), self.root);
        Ok(documents)
    }

    async fn read_metadata(&self, doc: &Document) -> Result<Option<Metadata>, StoreError> {
        let content = self.read_content(doc).await?;
        match front_matter::split(&content).front_matter {
            Some(yaml) => front_matter::parse(yaml).map(Some).map_err(|message| {
                StoreError::InvalidFrontMatter {
                    path: doc.path.clone(),
                    message,
                }
            }),
            None => Ok(None),
        }
    }

    async fn process_metadata(
        &self,
        doc: &Document,
        mutator: MetadataMutator,
    ) -> Result<(), StoreError> {
        let lock = self.lock_for(doc);
        let _guard = lock.lock().await;

        let content = self.read_content(doc).await?;
        let split = front_matter::split(&content);
        let original = match split.front_matter {
            Some(yaml) => {
                front_matter::parse(yaml).map_err(|message| StoreError::InvalidFrontMatter {
                    path: doc.path.clone(),
                    message,
                })?
            }
            None => Metadata::new(),
        };

        let mut metadata = original.clone();
        mutator(&mut metadata);

        if metadata == original {
            tracing::trace!("No front matter change for {}", doc);
            return Ok(());
        }

        let rendered =
            front_matter::render(&metadata, split.body).map_err(|message| StoreError::Write {
                path: doc.path.clone(),
                message,
            })?;

        self.write_content(doc, &rendered).await
    }
}

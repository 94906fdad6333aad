// Command Controller - Bridges the CLI with settings and the assignment engine
//
// This module contains the CommandController which coordinates between:
// - SettingsManager (current settings)
// - ConfigManager (vaultid.yaml on disk)
// - AssignmentEngine (per-document and bulk operations)
// - VaultWatcher (change notifications)
//
// Every command takes one settings snapshot and hands it to the engine.

use crate::config::ConfigManager;
use crate::models::{Document, Settings, is_blank_pattern};
use crate::services::{
    AssignOutcome, AssignmentEngine, BatchReport, ExclusionFilter, MigrationReport,
};
use crate::state::SettingsManager;
use crate::store::{DocumentStore, VaultStore};
use crate::watcher::VaultWatcher;
use anyhow::{Context, Result, bail};
use camino::Utf8Path;
use std::fs;
use std::sync::Arc;

/// Runs CLI commands against a document store
///
/// # Example
/// ```ignore
/// let config_manager = ConfigManager::new("vault/.vaultid")?;
/// let settings_manager = SettingsManager::new(config_manager.load_settings_or_default());
/// let engine = AssignmentEngine::new(Arc::new(VaultStore::new("vault")));
///
/// let controller = CommandController::new(settings_manager, config_manager, engine);
/// let report = controller.assign_all().await?;
/// ```
pub struct CommandController<S: DocumentStore> {
    /// Current settings, snapshotted per command
    settings_manager: SettingsManager,

    /// Persists settings edits
    config_manager: ConfigManager,

    engine: AssignmentEngine<S>,
}

impl<S: DocumentStore> CommandController<S> {
    pub fn new(
        settings_manager: SettingsManager,
        config_manager: ConfigManager,
        engine: AssignmentEngine<S>,
    ) -> Self {
        Self {
            settings_manager,
            config_manager,
            engine,
        }
    }

    pub fn settings_manager(&self) -> &SettingsManager {
        &self.settings_manager
    }

    pub fn engine(&self) -> &AssignmentEngine<S> {
        &self.engine
    }

    /// Add an ID to every note in scope.
    pub async fn assign_all(&self) -> Result<BatchReport> {
        let settings = self.settings_manager.snapshot();
        self.engine
            .assign_all(&settings)
            .await
            .context("Failed to list notes")
    }

    /// Add an ID to one note. Store errors are returned to the caller.
    pub async fn assign(&self, path: &str) -> Result<AssignOutcome> {
        let doc = Document::new(normalize_path(path));
        let settings = self.settings_manager.snapshot();
        self.engine
            .assign_if_missing(&doc, &settings)
            .await
            .with_context(|| format!("Failed to assign an ID to {}", doc))
    }

    /// Rename the ID key.
    ///
    /// Existing IDs are moved to the new key first, then the new key is
    /// recorded and saved. Per-note migration failures are reported but do not
    /// stop the key from changing.
    pub async fn set_id_key(&self, new_key: &str) -> Result<MigrationReport> {
        if new_key.is_empty() {
            tracing::warn!("Using the empty string as the ID key");
        }

        let old_key = self.settings_manager.read(|s| s.id_key.clone());
        let report = self
            .engine
            .migrate_key(&old_key, new_key)
            .await
            .context("Failed to list notes for key migration")?;

        if !report.failures.is_empty() {
            tracing::warn!(
                "{} notes kept their ID under {:?}",
                report.failures.len(),
                old_key
            );
        }

        self.settings_manager.set_id_key(new_key);
        self.save()?;
        Ok(report)
    }

    /// Replace the ignore patterns.
    ///
    /// Every pattern must be a single line and compile; otherwise nothing is
    /// changed and the offending pattern is named in the error. The check runs
    /// on the settings exactly as they will be saved and reloaded.
    pub fn set_ignore_patterns(&self, patterns: Vec<String>) -> Result<()> {
        let patterns: Vec<String> = patterns
            .into_iter()
            .filter(|pattern| !is_blank_pattern(pattern))
            .collect();

        if let Some(pattern) = patterns.iter().find(|p| p.contains(['\n', '\r'])) {
            bail!(
                "Ignore patterns not saved: {:?} spans several lines, give one pattern per line",
                pattern
            );
        }

        let mut candidate = self.settings_manager.snapshot();
        candidate.set_ignore_patterns(&patterns);
        ExclusionFilter::from_settings(&candidate).context("Ignore patterns not saved")?;

        self.settings_manager.update(|settings| {
            settings.ignore_file_regex = candidate.ignore_file_regex.clone();
        });
        self.save()?;

        tracing::info!("Saved {} ignore patterns", patterns.len());
        Ok(())
    }

    /// Replace the ignore patterns with the lines of a file.
    pub fn set_ignore_patterns_from_file(&self, path: &Utf8Path) -> Result<()> {
        let patterns = load_patterns_from_file(path)?;
        self.set_ignore_patterns(patterns)
    }

    /// Effective settings as YAML.
    ///
    /// With `strict`, the settings file is re-read and any error in it is
    /// returned instead of falling back to defaults.
    pub fn show_config(&self, strict: bool) -> Result<String> {
        if strict {
            let settings = self.config_manager.load_settings()?;
            self.settings_manager.replace(settings);
        }

        let settings: Settings = self.settings_manager.snapshot();
        serde_yaml_ng::to_string(&settings).context("Failed to serialize settings to YAML")
    }

    fn save(&self) -> Result<()> {
        self.config_manager
            .save_settings(&self.settings_manager.snapshot())
    }
}

impl CommandController<VaultStore> {
    /// Assign IDs to notes as they change, until Ctrl-C.
    ///
    /// Each notification runs `assign_if_missing` with a fresh settings
    /// snapshot. Failures are logged and the loop keeps going.
    pub async fn watch(&self, initial_scan: bool) -> Result<()> {
        if initial_scan {
            let report = self.assign_all().await?;
            tracing::info!("Initial scan: {}", report.summary());
        }

        let (_watcher, mut documents) = VaultWatcher::new(Arc::clone(self.engine.store()))?;
        let metrics = Arc::clone(self.engine.metrics());

        tracing::info!("Watching for changes, press Ctrl-C to stop");

        loop {
            tokio::select! {
                received = documents.recv() => {
                    let Some(doc) = received else {
                        tracing::warn!("File watcher stopped");
                        break;
                    };
                    metrics.record_event();

                    let settings = self.settings_manager.snapshot();
                    match self.engine.assign_if_missing(&doc, &settings).await {
                        Ok(AssignOutcome::Assigned(id)) => {
                            tracing::info!("Assigned {} to {}", id, doc);
                        }
                        Ok(outcome) => tracing::trace!("{}: {:?}", doc, outcome),
                        Err(e) => {
                            metrics.record_failed();
                            tracing::error!("Failed to assign an ID to {}: {}", doc, e);
                        }
                    }
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    tracing::info!("Ctrl-C received, stopping watcher");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Note path relative to the vault root, with `./` and backslashes normalized.
fn normalize_path(path: &str) -> String {
    let path = path.replace('\\', "/");
    path.trim_start_matches("./").to_string()
}

/// Read ignore patterns from a file, one per line.
///
/// Blank lines and lines starting with `#` are skipped.
fn load_patterns_from_file(path: &Utf8Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ignore patterns file: {}", path))?;

    Ok(content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !is_blank_pattern(line) && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

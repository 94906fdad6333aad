// Settings state module
//
// This module provides the SettingsManager which owns the process-wide
// Settings value behind Arc<RwLock<T>> and emits change events when it is
// modified.

use crate::models::Settings;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Change events emitted when settings are modified
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsChange {
    /// The identifier key was renamed
    IdKeyChanged { old: String, new: String },

    /// The ignore pattern list was edited
    IgnorePatternsChanged { patterns: usize },

    /// The bulk concurrency limit was edited
    ConcurrencyChanged { max_concurrent_writes: usize },

    /// Settings were replaced wholesale (e.g. reloaded from disk)
    SettingsReloaded,
}

/// Thread-safe owner of the current [`Settings`]
///
/// This is the single owning context for settings:
/// - [`snapshot()`](Self::snapshot) hands core operations an explicit copy
/// - [`update()`](Self::update) applies a mutation and emits [`SettingsChange`] events
/// - [`subscribe()`](Self::subscribe) lets long-running tasks react to edits
///
/// Core operations never read this directly; callers snapshot once per
/// invocation. A bulk run therefore uses one consistent copy, while
/// notifications that arrive during an edit may see either side of it.
pub struct SettingsManager {
    settings: Arc<RwLock<Settings>>,
    change_tx: broadcast::Sender<SettingsChange>,
}

impl SettingsManager {
    /// Create a new SettingsManager holding `settings`
    ///
    /// # Returns
    /// A new SettingsManager with a broadcast channel buffer of 100 events
    pub fn new(settings: Settings) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            change_tx,
        }
    }

    /// Copy of the current settings
    pub fn snapshot(&self) -> Settings {
        self.read_guard().clone()
    }

    /// Execute a function with read access to the settings
    ///
    /// # Example
    /// ```ignore
    /// let key = settings_manager.read(|s| s.id_key.clone());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Settings) -> R,
    {
        f(&self.read_guard())
    }

    /// Update the settings and emit change events
    ///
    /// # Returns
    /// The SettingsChange events that were emitted
    pub fn update<F>(&self, update_fn: F) -> Vec<SettingsChange>
    where
        F: FnOnce(&mut Settings),
    {
        let changes = {
            let mut settings = self.write_guard();
            let old = settings.clone();
            update_fn(&mut settings);
            Self::detect_changes(&old, &settings)
        };

        for change in &changes {
            // Ignore send errors - it's OK if no one is listening
            let _ = self.change_tx.send(change.clone());
        }

        changes
    }

    /// Replace the settings, e.g. after reloading the file
    pub fn replace(&self, settings: Settings) -> Vec<SettingsChange> {
        *self.write_guard() = settings;
        let _ = self.change_tx.send(SettingsChange::SettingsReloaded);
        vec![SettingsChange::SettingsReloaded]
    }

    /// Subscribe to settings change events
    pub fn subscribe(&self) -> broadcast::Receiver<SettingsChange> {
        self.change_tx.subscribe()
    }

    /// Set the identifier key
    ///
    /// This only records the new name; moving existing values is the
    /// caller's job (see [`AssignmentEngine::migrate_key`](crate::services::AssignmentEngine::migrate_key)).
    pub fn set_id_key(&self, key: impl Into<String>) -> Vec<SettingsChange> {
        let key = key.into();
        self.update(|settings| settings.id_key = key)
    }

    /// Set the ignore patterns from multi-line text
    pub fn set_ignore_file_regex(&self, text: impl Into<String>) -> Vec<SettingsChange> {
        let text = text.into();
        self.update(|settings| settings.ignore_file_regex = text)
    }

    fn detect_changes(old: &Settings, new: &Settings) -> Vec<SettingsChange> {
        let mut changes = Vec::new();

        if old.id_key != new.id_key {
            changes.push(SettingsChange::IdKeyChanged {
                old: old.id_key.clone(),
                new: new.id_key.clone(),
            });
        }

        if old.ignore_file_regex != new.ignore_file_regex {
            changes.push(SettingsChange::IgnorePatternsChanged {
                patterns: new.ignore_patterns().len(),
            });
        }

        if old.max_concurrent_writes != new.max_concurrent_writes {
            changes.push(SettingsChange::ConcurrencyChanged {
                max_concurrent_writes: new.max_concurrent_writes,
            });
        }

        changes
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Settings> {
        self.settings
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SettingsManager {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

// Make SettingsManager cloneable for sharing across tasks
impl Clone for SettingsManager {
    fn clone(&self) -> Self {
        Self {
            settings: Arc::clone(&self.settings),
            change_tx: self.change_tx.clone(),
        }
    }
}

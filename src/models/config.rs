use serde::{Deserialize, Serialize};

/// Metadata key used for identifiers when nothing is configured.
pub const DEFAULT_ID_KEY: &str = "id";

/// Upper bound on concurrent per-document tasks in bulk operations.
pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 16;

/// Settings persisted in `vaultid.yaml`
///
/// `ignore_file_regex` is kept as one multi-line string (one pattern per line)
/// so the file stays hand-editable; use [`Settings::ignore_patterns`] to get the
/// pattern list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Front matter key the identifier is stored under. An empty string is a
    /// valid (if odd) key name.
    pub id_key: String,

    /// Newline separated regular expressions matched against vault-relative paths.
    pub ignore_file_regex: String,

    /// Maximum number of documents processed at once by bulk operations.
    pub max_concurrent_writes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id_key: DEFAULT_ID_KEY.to_string(),
            ignore_file_regex: String::new(),
            max_concurrent_writes: DEFAULT_MAX_CONCURRENT_WRITES,
        }
    }
}

impl Settings {
    /// Split `ignore_file_regex` into individual patterns.
    ///
    /// Blank and whitespace-only lines are not patterns and are dropped, so
    /// the default (empty) setting ignores nothing. A trailing `\r` from CRLF
    /// files is stripped.
    pub fn ignore_patterns(&self) -> Vec<String> {
        self.ignore_file_regex
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !is_blank_pattern(line))
            .map(str::to_string)
            .collect()
    }

    /// Replace the ignore patterns, one per line.
    pub fn set_ignore_patterns<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore_file_regex = patterns
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
    }

    /// Concurrency limit for bulk operations, never below one.
    pub fn concurrency(&self) -> usize {
        self.max_concurrent_writes.max(1)
    }
}

/// Whether a pattern line carries no pattern at all.
pub fn is_blank_pattern(line: &str) -> bool {
    line.trim().is_empty()
}

use serde_yaml_ng::{Mapping, Value};
use std::fmt;

/// Front matter of a document: an ordered YAML mapping.
///
/// The core only ever reads and writes single string keys; every other entry
/// is carried through untouched, in order.
pub type Metadata = Mapping;

/// Handle to one note in the vault.
///
/// `path` is relative to the vault root and always uses `/` separators, so
/// ignore patterns behave the same on every platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Document {
    pub path: String,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Whether a front matter value counts as present.
///
/// Null, `false`, zero, NaN and the empty string are falsy. Sequences and
/// mappings are truthy even when empty. Tagged values are judged by their
/// inner value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_f64() {
            Some(f) => f != 0.0 && !f.is_nan(),
            None => true,
        },
        Value::String(s) => !s.is_empty(),
        Value::Sequence(_) | Value::Mapping(_) => true,
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

/// Whether `metadata[key]` exists and is truthy.
pub fn has_truthy_value(metadata: &Metadata, key: &str) -> bool {
    metadata.get(key).is_some_and(is_truthy)
}

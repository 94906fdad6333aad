//! YAML front matter codec.
//!
//! A document has front matter when its first line is `---` and a later line is
//! `---` again; everything between is YAML, everything after is the body. The
//! body is never touched, so rendering after an edit only changes the header.

use crate::models::Metadata;
use serde_yaml_ng::Value;

const DELIMITER: &str = "---";

/// A document split into its front matter source and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitDocument<'a> {
    /// Raw YAML between the delimiters, `None` if the document has no front matter.
    pub front_matter: Option<&'a str>,
    pub body: &'a str,
}

/// Split `content` into front matter and body.
///
/// An opening delimiter without a closing one is treated as body text.
pub fn split(content: &str) -> SplitDocument<'_> {
    let no_front_matter = SplitDocument {
        front_matter: None,
        body: content,
    };

    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return no_front_matter;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            return SplitDocument {
                front_matter: Some(&rest[..offset]),
                body: &rest[offset + line.len()..],
            };
        }
        offset += line.len();
    }

    no_front_matter
}

/// Parse front matter YAML into a mapping.
///
/// Empty or null front matter is an empty mapping. Anything other than a
/// mapping (a bare list or scalar) is rejected with a message.
pub fn parse(yaml: &str) -> Result<Metadata, String> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }

    match serde_yaml_ng::from_str::<Value>(yaml).map_err(|e| e.to_string())? {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Metadata::new()),
        other => Err(format!(
            "front matter must be a mapping, found {}",
            kind_of(&other)
        )),
    }
}

/// Render a document from a mapping and an unchanged body.
pub fn render(metadata: &Metadata, body: &str) -> Result<String, String> {
    let yaml = if metadata.is_empty() {
        String::new()
    } else {
        serde_yaml_ng::to_string(metadata).map_err(|e| e.to_string())?
    };

    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

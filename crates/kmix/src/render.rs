//! rendering documents as text
//!
//! - YAML: one mapping per document, separated by a bare `---` line
//! - JSON: a pretty printed array of all documents
//!
//! Keys are written in their string form. Before anything is written every document is checked
//! for keys that become identical once stringified (`1` and `"1"`) and, for JSON, for numbers
//! without a JSON representation (NaN, infinities).
use crate::tree::{Document, DocumentSet};
use crate::value::{Mapping, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

pub fn render(documents: &DocumentSet, format: Format) -> Result<String, SerializationError> {
    match format {
        Format::Yaml => to_yaml(documents),
        Format::Json => to_json(documents),
    }
}

#[tracing::instrument(level = "debug", skip_all, fields(documents = documents.len()))]
pub fn to_yaml(documents: &DocumentSet) -> Result<String, SerializationError> {
    let mut output = String::new();

    for (index, document) in documents.iter().enumerate() {
        check(document, index, Format::Yaml)?;

        if index > 0 {
            output.push_str("---\n");
        }
        output.push_str(&serde_yaml::to_string(document)?);
    }

    Ok(output)
}

#[tracing::instrument(level = "debug", skip_all, fields(documents = documents.len()))]
pub fn to_json(documents: &DocumentSet) -> Result<String, SerializationError> {
    for (index, document) in documents.iter().enumerate() {
        check(document, index, Format::Json)?;
    }

    Ok(serde_json::to_string_pretty(documents)?)
}

fn check(document: &Document, index: usize, format: Format) -> Result<(), SerializationError> {
    let mut path = vec![];
    check_mapping(document.as_mapping(), &mut path, index, format)
}

fn check_mapping(
    mapping: &Mapping,
    path: &mut Vec<String>,
    document: usize,
    format: Format,
) -> Result<(), SerializationError> {
    let mut seen = HashSet::with_capacity(mapping.len());

    for (key, value) in mapping {
        let key = key.to_string();
        if !seen.insert(key.clone()) {
            return Err(SerializationError::KeyCollision {
                document,
                path: path.join("."),
                key,
            });
        }

        path.push(key);
        check_value(value, path, document, format)?;
        path.pop();
    }

    Ok(())
}

fn check_value(
    value: &Value,
    path: &mut Vec<String>,
    document: usize,
    format: Format,
) -> Result<(), SerializationError> {
    match value {
        Value::Decimal(number) if format == Format::Json && !number.is_finite() => {
            Err(SerializationError::NonFiniteNumber {
                document,
                path: path.join("."),
                value: *number,
            })
        }
        Value::Object(mapping) => check_mapping(mapping, path, document, format),
        Value::Array(array) => {
            for (index, element) in array.iter().enumerate() {
                path.push(index.to_string());
                check_value(element, path, document, format)?;
                path.pop();
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("document {document}: key `{key}` at `{path}` collides with another key of the same text")]
    KeyCollision {
        document: usize,
        path: String,
        key: String,
    },
    #[error("document {document}: {value} at `{path}` has no JSON representation")]
    NonFiniteNumber {
        document: usize,
        path: String,
        value: f64,
    },
    #[error("unable to write YAML")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unable to write JSON")]
    Json(#[from] serde_json::Error),
}

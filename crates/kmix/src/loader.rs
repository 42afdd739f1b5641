//! turning value expressions into [ValueTree]s
//!
//! Two kinds of expressions exist:
//! - file expressions: a path to a YAML, JSON or HCL file
//! - inline expressions: `path.to.key=value` assignments
//!
//! Every parsed source must have a mapping (or nothing at all) at its root.
use crate::tree::ValueTree;
use crate::value::{ConversionError, Value};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Loads value expressions
pub trait ValueLoader {
    fn load_file(&self, expr: &str) -> Result<ValueTree, ValueSourceError>;
    fn load_inline(&self, expr: &str) -> Result<ValueTree, ValueSourceError>;
}

/// Loads files relative to a root directory
#[derive(derive_new::new, Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    /// Loader resolving paths against the current work directory
    pub fn from_workdir() -> Result<Self, ValueSourceError> {
        let root = std::env::current_dir().map_err(|source| ValueSourceError::Io {
            path: PathBuf::from("."),
            source,
        })?;
        Ok(Self::new(root))
    }
}

impl ValueLoader for FsLoader {
    #[tracing::instrument(level = "debug", skip(self))]
    fn load_file(&self, expr: &str) -> Result<ValueTree, ValueSourceError> {
        let path = self.root.join(expr);
        tracing::info!(path=%path.display(), "loading values file");

        let contents = std::fs::read_to_string(&path).map_err(|source| ValueSourceError::Io {
            path: path.clone(),
            source,
        })?;

        match Format::of(&path) {
            Format::Yaml => parse_yaml_named(&contents, expr),
            Format::Json => parse_json_named(&contents, expr),
            Format::Hcl => parse_hcl_named(&contents, expr),
        }
    }

    fn load_inline(&self, expr: &str) -> Result<ValueTree, ValueSourceError> {
        parse_assignment(expr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Format {
    Yaml,
    Json,
    Hcl,
}

impl Format {
    fn of(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Format::Json,
            Some("hcl") => Format::Hcl,
            _ => Format::Yaml,
        }
    }
}

/// Parse YAML text into a tree
pub fn parse_yaml(input: &str) -> Result<ValueTree, ValueSourceError> {
    parse_yaml_named(input, "<yaml>")
}

fn parse_yaml_named(input: &str, origin: &str) -> Result<ValueTree, ValueSourceError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|source| ValueSourceError::Yaml {
            origin: origin.to_string(),
            source,
        })?;
    into_tree(Value::try_from(yaml), origin)
}

/// Parse a multi-document YAML stream, skipping empty documents
pub fn parse_yaml_documents(input: &str) -> Result<Vec<ValueTree>, ValueSourceError> {
    parse_yaml_documents_named(input, "<yaml>")
}

pub(crate) fn parse_yaml_documents_named(
    input: &str,
    origin: &str,
) -> Result<Vec<ValueTree>, ValueSourceError> {
    let mut documents = vec![];

    for document in serde_yaml::Deserializer::from_str(input) {
        let yaml =
            serde_yaml::Value::deserialize(document).map_err(|source| ValueSourceError::Yaml {
                origin: origin.to_string(),
                source,
            })?;
        if yaml.is_null() {
            continue;
        }
        documents.push(into_tree(Value::try_from(yaml), origin)?);
    }

    Ok(documents)
}

/// Parse JSON text into a tree
pub fn parse_json(input: &str) -> Result<ValueTree, ValueSourceError> {
    parse_json_named(input, "<json>")
}

fn parse_json_named(input: &str, origin: &str) -> Result<ValueTree, ValueSourceError> {
    if input.trim().is_empty() {
        return Ok(ValueTree::default());
    }

    let json: serde_json::Value =
        serde_json::from_str(input).map_err(|source| ValueSourceError::Json {
            origin: origin.to_string(),
            source,
        })?;
    into_tree(Value::try_from(json), origin)
}

/// Parse an HCL body into a tree, evaluating its expressions
pub fn parse_hcl(input: &str) -> Result<ValueTree, ValueSourceError> {
    parse_hcl_named(input, "<hcl>")
}

fn parse_hcl_named(input: &str, origin: &str) -> Result<ValueTree, ValueSourceError> {
    let context = hcl::eval::Context::new();
    let value: hcl::Value =
        hcl::eval::from_str(input, &context).map_err(|source| ValueSourceError::Hcl {
            origin: origin.to_string(),
            source,
        })?;
    into_tree(Value::try_from(value), origin)
}

/// Parse an inline `path.to.key=value` assignment
///
/// The value is read as a YAML scalar, so `3` is an integer and `true` a boolean. Text that YAML
/// reads as anything else (`#latest`, `key: value`, `[a, b]`) is kept as a string.
pub fn parse_assignment(expr: &str) -> Result<ValueTree, ValueSourceError> {
    let invalid = |reason: &str| ValueSourceError::Inline {
        expr: expr.to_string(),
        reason: reason.to_string(),
    };

    let (path, raw_value) = expr.split_once('=').ok_or_else(|| invalid("missing `=`"))?;
    let path: Vec<&str> = path.trim().split('.').collect();
    if path.iter().any(|segment| segment.is_empty()) {
        return Err(invalid("empty key segment"));
    }

    let value = inline_scalar(raw_value).map_err(|source| ValueSourceError::Conversion {
        origin: expr.to_string(),
        source,
    })?;

    let mut tree = ValueTree::default();
    tree.set_path(&path, value);
    Ok(tree)
}

/// `raw` as a YAML scalar, or as plain text if it does not read as one
fn inline_scalar(raw: &str) -> Result<Value, ConversionError> {
    let literal = || Value::String(raw.to_string());

    let text = raw.trim();
    if text.is_empty() {
        return Ok(Value::String(String::new()));
    }
    let Ok(yaml) = serde_yaml::from_str::<serde_yaml::Value>(text) else {
        return Ok(literal());
    };

    match Value::try_from(yaml)? {
        // comments and empty documents read as null too
        Value::Null if !matches!(text, "null" | "Null" | "NULL" | "~") => Ok(literal()),
        value if !value.is_scalar() => Ok(literal()),
        value => Ok(value),
    }
}

fn into_tree(
    value: Result<Value, ConversionError>,
    origin: &str,
) -> Result<ValueTree, ValueSourceError> {
    let value = value.map_err(|source| ValueSourceError::Conversion {
        origin: origin.to_string(),
        source,
    })?;

    ValueTree::try_from(value).map_err(|other| ValueSourceError::NotAMapping {
        origin: origin.to_string(),
        found: other.kind(),
    })
}

#[derive(thiserror::Error, Debug)]
pub enum ValueSourceError {
    #[error("unable to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed YAML in {origin}")]
    Yaml {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("malformed JSON in {origin}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed HCL in {origin}")]
    Hcl {
        origin: String,
        #[source]
        source: hcl::Error,
    },
    #[error("unsupported data in {origin}")]
    Conversion {
        origin: String,
        #[source]
        source: ConversionError,
    },
    #[error("expected a mapping at the root of {origin}, found {found}")]
    NotAMapping { origin: String, found: &'static str },
    #[error("invalid inline assignment {expr:?}: {reason}")]
    Inline { expr: String, reason: String },
}

/// Utility macro to create a [ValueTree] from YAML text
///
/// ```
/// # use kmix::tree;
/// let values = tree!("replicas: 3");
/// assert_eq!(values.lookup("replicas"), Some(&kmix::value::Value::Integer(3)));
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use kmix::tree;
/// tree!("- not a mapping");
/// ```
#[macro_export]
macro_rules! tree {
    { $yaml:expr } => {
        $crate::loader::parse_yaml($yaml).expect("tree must parse")
    };
}

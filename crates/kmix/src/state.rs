//! persisted value snapshots
//!
//! A [StateBackend] stores the values a release was last rendered with, addressed by release
//! name and namespace. Values are stored as JSON text in both backends; reading text that is
//! not a JSON object is reported as [StateBackendError::Malformed].
use crate::release::ReleaseId;
use crate::tree::ValueTree;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;

pub trait StateBackend {
    fn kind(&self) -> BackendKind;

    fn read(&self, release: &ReleaseId, namespace: &str) -> Result<ValueTree, StateBackendError>;

    fn write(
        &self,
        release: &ReleaseId,
        namespace: &str,
        values: &ValueTree,
    ) -> Result<(), StateBackendError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    ConfigMap,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => f.write_str("memory"),
            BackendKind::ConfigMap => f.write_str("configmap"),
        }
    }
}

/// Values read from a backend plus where they came from
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub release: ReleaseId,
    pub namespace: String,
    pub backend: BackendKind,
    pub values: ValueTree,
}

impl StateSnapshot {
    #[tracing::instrument(level = "debug", skip(backend), fields(backend = %backend.kind()))]
    pub fn read(
        backend: &dyn StateBackend,
        release: &ReleaseId,
        namespace: &str,
    ) -> Result<Self, StateBackendError> {
        let values = backend.read(release, namespace)?;
        tracing::debug!(keys = values.len(), "state read");

        Ok(Self {
            release: release.clone(),
            namespace: namespace.to_string(),
            backend: backend.kind(),
            values,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StateBackendError {
    #[error("no state for release {release} in namespace {namespace}")]
    NotFound {
        release: ReleaseId,
        namespace: String,
    },
    #[error("state for release {release} in namespace {namespace} is malformed: {reason}")]
    Malformed {
        release: ReleaseId,
        namespace: String,
        reason: String,
    },
    #[error("{what} name {name:?} cannot be used as a state path")]
    InvalidName { what: &'static str, name: String },
    #[error("unable to access state at {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to encode values")]
    EncodeValues(#[from] serde_json::Error),
    #[error("unable to encode state manifest")]
    EncodeManifest(#[from] serde_yaml::Error),
}

fn decode_values(
    text: &str,
    release: &ReleaseId,
    namespace: &str,
) -> Result<ValueTree, StateBackendError> {
    let malformed = |reason: String| StateBackendError::Malformed {
        release: release.clone(),
        namespace: namespace.to_string(),
        reason,
    };

    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|err| malformed(err.to_string()))?;
    let value = Value::try_from(json).map_err(|err| malformed(err.to_string()))?;

    ValueTree::try_from(value)
        .map_err(|other| malformed(format!("expected an object, found {}", other.kind())))
}

fn check_component(what: &'static str, name: &str) -> Result<(), StateBackendError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');

    if invalid {
        return Err(StateBackendError::InvalidName {
            what,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Process local backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: RefCell<HashMap<(String, String), String>>,
}

impl MemoryBackend {
    /// Store raw text as the state of a release
    pub fn insert_raw(&self, release: &ReleaseId, namespace: &str, text: impl Into<String>) {
        self.objects.borrow_mut().insert(
            (namespace.to_string(), release.to_string()),
            text.into(),
        );
    }
}

impl StateBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn read(&self, release: &ReleaseId, namespace: &str) -> Result<ValueTree, StateBackendError> {
        let objects = self.objects.borrow();
        let Some(text) = objects.get(&(namespace.to_string(), release.to_string())) else {
            return Err(StateBackendError::NotFound {
                release: release.clone(),
                namespace: namespace.to_string(),
            });
        };

        decode_values(text, release, namespace)
    }

    fn write(
        &self,
        release: &ReleaseId,
        namespace: &str,
        values: &ValueTree,
    ) -> Result<(), StateBackendError> {
        let text = serde_json::to_string(values)?;
        self.insert_raw(release, namespace, text);
        Ok(())
    }
}

/// Stores ConfigMap manifests below a root directory
///
/// The manifest for release `web` in namespace `default` lives at `<root>/default/web.yaml`,
/// the values are kept as a JSON string under `data.values`.
#[derive(derive_new::new, Debug, Clone)]
pub struct ConfigMapBackend {
    root: PathBuf,
}

impl ConfigMapBackend {
    /// Both names become path components and must stay below `root`
    fn manifest_path(
        &self,
        release: &ReleaseId,
        namespace: &str,
    ) -> Result<PathBuf, StateBackendError> {
        check_component("namespace", namespace)?;
        check_component("release", release.as_str())?;

        Ok(self
            .root
            .join(namespace)
            .join(format!("{}.yaml", release.as_str())))
    }

    fn manifest(release: &ReleaseId, namespace: &str, values_json: String) -> ValueTree {
        let metadata = ValueTree::new()
            .with("name", format!("{release}-state"))
            .with("namespace", namespace);
        let data = ValueTree::new().with("values", values_json);

        ValueTree::new()
            .with("apiVersion", "v1")
            .with("kind", "ConfigMap")
            .with("metadata", metadata)
            .with("data", data)
    }
}

impl StateBackend for ConfigMapBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ConfigMap
    }

    fn read(&self, release: &ReleaseId, namespace: &str) -> Result<ValueTree, StateBackendError> {
        let path = self.manifest_path(release, namespace)?;
        if !path.is_file() {
            return Err(StateBackendError::NotFound {
                release: release.clone(),
                namespace: namespace.to_string(),
            });
        }

        tracing::info!(path=%path.display(), "reading state manifest");
        let text = std::fs::read_to_string(&path)
            .map_err(|source| StateBackendError::Io { path, source })?;

        let manifest: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|err| StateBackendError::Malformed {
                release: release.clone(),
                namespace: namespace.to_string(),
                reason: err.to_string(),
            })?;

        let Some(values) = manifest
            .get("data")
            .and_then(|data| data.get("values"))
            .and_then(|values| values.as_str())
        else {
            return Err(StateBackendError::Malformed {
                release: release.clone(),
                namespace: namespace.to_string(),
                reason: "missing data.values".to_string(),
            });
        };

        decode_values(values, release, namespace)
    }

    fn write(
        &self,
        release: &ReleaseId,
        namespace: &str,
        values: &ValueTree,
    ) -> Result<(), StateBackendError> {
        let path = self.manifest_path(release, namespace)?;
        let manifest = Self::manifest(release, namespace, serde_json::to_string(values)?);
        let text = serde_yaml::to_string(&manifest)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StateBackendError::Io {
                path: parent.to_owned(),
                source,
            })?;
        }

        tracing::info!(path=%path.display(), "writing state manifest");
        std::fs::write(&path, text).map_err(|source| StateBackendError::Io { path, source })
    }
}

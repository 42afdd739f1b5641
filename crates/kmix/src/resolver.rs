//! layered value resolution
//!
//! Values are merged from these layers, lowest precedence first:
//! 1. defaults
//! 2. the state snapshot, when one is given
//! 3. file expressions, in listed order
//! 4. inline expressions, in listed order
//!
//! All layers are loaded before merging starts, so a broken source never yields a partial tree.
use crate::loader::{ValueLoader, ValueSourceError};
use crate::release::ReleaseId;
use crate::state::{StateBackend, StateBackendError, StateSnapshot};
use crate::tree::ValueTree;

/// Inputs of one resolution
#[derive(Debug, Clone, Default)]
pub struct ValueRequest {
    pub defaults: ValueTree,
    pub state: Option<StateSnapshot>,
    pub file_exprs: Vec<String>,
    pub inline_exprs: Vec<String>,
}

#[derive(derive_new::new, Debug, Clone)]
pub struct ValueResolver<L> {
    loader: L,
}

impl<L: ValueLoader> ValueResolver<L> {
    #[tracing::instrument(level = "debug", skip_all, fields(%release))]
    pub fn resolve(
        &self,
        release: &ReleaseId,
        request: &ValueRequest,
    ) -> Result<ValueTree, ResolveError> {
        let fail = |kind: ResolveErrorKind| ResolveError {
            release: release.clone(),
            kind,
        };

        let mut layers: Vec<(Layer, ValueTree)> = vec![];

        for expr in &request.file_exprs {
            let tree = self
                .loader
                .load_file(expr)
                .map_err(|err| fail(err.into()))?;
            layers.push((Layer::File(expr), tree));
        }

        for expr in &request.inline_exprs {
            let tree = self
                .loader
                .load_inline(expr)
                .map_err(|err| fail(err.into()))?;
            layers.push((Layer::Inline(expr), tree));
        }

        let mut values = request.defaults.clone();

        if let Some(snapshot) = &request.state {
            tracing::debug!(layer = %Layer::State(snapshot), "merging layer");
            values = values.merge(&snapshot.values);
        }

        for (layer, tree) in &layers {
            tracing::debug!(%layer, "merging layer");
            values = values.merge(tree);
        }

        Ok(values)
    }

    /// Read the state snapshot from `backend` and resolve on top of it
    ///
    /// Any snapshot already present in `request` is replaced.
    #[tracing::instrument(level = "debug", skip_all, fields(%release, %namespace))]
    pub fn resolve_seeded(
        &self,
        release: &ReleaseId,
        backend: &dyn StateBackend,
        namespace: &str,
        request: ValueRequest,
    ) -> Result<ValueTree, ResolveError> {
        let snapshot =
            StateSnapshot::read(backend, release, namespace).map_err(|err| ResolveError {
                release: release.clone(),
                kind: err.into(),
            })?;

        let request = ValueRequest {
            state: Some(snapshot),
            ..request
        };
        self.resolve(release, &request)
    }
}

enum Layer<'a> {
    State(&'a StateSnapshot),
    File(&'a str),
    Inline(&'a str),
}

impl std::fmt::Display for Layer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::State(snapshot) => write!(
                f,
                "state {}/{} ({})",
                snapshot.namespace, snapshot.release, snapshot.backend
            ),
            Layer::File(expr) => write!(f, "file {expr}"),
            Layer::Inline(expr) => write!(f, "inline {expr}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("unable to resolve values for release {release}")]
pub struct ResolveError {
    pub release: ReleaseId,
    #[source]
    pub kind: ResolveErrorKind,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error(transparent)]
    ValueSource(#[from] ValueSourceError),
    #[error(transparent)]
    StateBackend(#[from] StateBackendError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loader::parse_assignment;
    use crate::state::MemoryBackend;
    use crate::tree;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Serves files from memory
    #[derive(Default)]
    struct StaticLoader {
        files: HashMap<&'static str, &'static str>,
    }

    impl StaticLoader {
        fn with(mut self, name: &'static str, yaml: &'static str) -> Self {
            self.files.insert(name, yaml);
            self
        }
    }

    impl ValueLoader for StaticLoader {
        fn load_file(&self, expr: &str) -> Result<ValueTree, ValueSourceError> {
            let yaml = self.files.get(expr).ok_or_else(|| ValueSourceError::Io {
                path: expr.into(),
                source: std::io::ErrorKind::NotFound.into(),
            })?;
            crate::loader::parse_yaml(yaml)
        }

        fn load_inline(&self, expr: &str) -> Result<ValueTree, ValueSourceError> {
            parse_assignment(expr)
        }
    }

    fn request(files: &[&str], inline: &[&str]) -> ValueRequest {
        ValueRequest {
            defaults: tree!("x: 1\nkeep: default"),
            state: None,
            file_exprs: files.iter().map(ToString::to_string).collect(),
            inline_exprs: inline.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn precedence() {
        let resolver = ValueResolver::new(StaticLoader::default().with("a.yaml", "x: 2"));
        let release = ReleaseId::from("rel");

        let values = resolver
            .resolve(&release, &request(&["a.yaml"], &["x=3"]))
            .unwrap();
        assert_eq!(values, tree!("x: 3\nkeep: default"));

        let values = resolver
            .resolve(&release, &request(&["a.yaml"], &[]))
            .unwrap();
        assert_eq!(values.lookup("x"), Some(&Value::Integer(2)));
    }

    #[test]
    fn later_files_win() {
        let resolver = ValueResolver::new(
            StaticLoader::default()
                .with("a.yaml", "x: 2\nnested: {a: 1}")
                .with("b.yaml", "x: 4\nnested: {b: 2}"),
        );

        let values = resolver
            .resolve(&"rel".into(), &request(&["a.yaml", "b.yaml"], &["y=1", "y=2"]))
            .unwrap();
        assert_eq!(
            values,
            tree!("x: 4\nkeep: default\nnested: {a: 1, b: 2}\ny: 2")
        );
    }

    #[test]
    fn state_sits_between_defaults_and_files() {
        let resolver = ValueResolver::new(StaticLoader::default().with("a.yaml", "x: 2"));
        let backend = MemoryBackend::default();
        let release = ReleaseId::from("rel");
        backend.insert_raw(&release, "default", r#"{"x": 10, "keep": "state"}"#);

        let values = resolver
            .resolve_seeded(&release, &backend, "default", request(&[], &[]))
            .unwrap();
        assert_eq!(values, tree!("x: 10\nkeep: state"));

        let values = resolver
            .resolve_seeded(&release, &backend, "default", request(&["a.yaml"], &[]))
            .unwrap();
        assert_eq!(values, tree!("x: 2\nkeep: state"));
    }

    #[test]
    fn broken_source_aborts() {
        let resolver = ValueResolver::new(StaticLoader::default().with("bad.yaml", "x: [1"));

        let err = resolver
            .resolve(&"rel".into(), &request(&["bad.yaml"], &["x=3"]))
            .unwrap_err();
        assert_eq!(err.release, ReleaseId::from("rel"));
        assert!(matches!(
            err.kind,
            ResolveErrorKind::ValueSource(ValueSourceError::Yaml { .. })
        ));

        let err = resolver
            .resolve(&"rel".into(), &request(&[], &["no-assignment"]))
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ResolveErrorKind::ValueSource(ValueSourceError::Inline { .. })
        ));
    }

    #[test]
    fn missing_state_is_a_state_error() {
        let resolver = ValueResolver::new(StaticLoader::default());
        let backend = MemoryBackend::default();

        let err = resolver
            .resolve_seeded(&"rel".into(), &backend, "default", request(&[], &[]))
            .unwrap_err();
        assert!(matches!(
            err.kind,
            ResolveErrorKind::StateBackend(StateBackendError::NotFound { .. })
        ));
    }
}

//! declarative mixers
//!
//! A mixfile lists mixers as ordered `push`/`patch` steps:
//!
//! ```yaml
//! defaults:
//!   replicas: 1
//! fragments: fragments        # relative to the mixfile, defaults to its directory
//! mixers:
//!   - name: hello
//!     steps:
//!       - patch: common/metadata
//!         steps:
//!           - push: pod
//!       - push: { kind: Service, metadata: { name: "${release}" } }
//! ```
//!
//! A step refers either to a fragment by name (`<fragments>/<name>.yaml`, possibly holding
//! several documents) or holds an inline mapping. All fragments are loaded together with the
//! mixfile, running a [ScriptedMixer] does no I/O. Documents are interpolated when they are
//! used (see [Mix::interpolate]).
use crate::loader::{self, ValueSourceError};
use crate::mixer::{Mix, Mixer, MixerError};
use crate::tree::{Document, ValueTree};
use crate::value::Value;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMixfile {
    #[serde(default)]
    defaults: serde_yaml::Value,
    fragments: Option<PathBuf>,
    #[serde(default)]
    mixers: Vec<RawMixer>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMixer {
    name: String,
    #[serde(default)]
    steps: Vec<RawStep>,
}

/// Either `push`, or `patch` with optional nested `steps`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    push: Option<RawSource>,
    patch: Option<RawSource>,
    steps: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSource {
    Fragment(String),
    Inline(serde_yaml::Value),
}

/// A loaded mixfile
#[derive(Debug)]
pub struct Mixfile {
    pub defaults: ValueTree,
    pub mixers: Vec<ScriptedMixer>,
}

/// Mixer built from mixfile steps
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedMixer {
    name: String,
    steps: Vec<Step>,
}

/// One resolved step
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Push(Vec<Document>),
    Patch { base: Document, steps: Vec<Step> },
}

impl Mixfile {
    #[tracing::instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, MixfileError> {
        tracing::info!(path=%path.display(), "loading mixfile");
        let text = std::fs::read_to_string(path).map_err(|source| MixfileError::Io {
            path: path.to_owned(),
            source,
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base_dir)
    }

    /// Parse mixfile text, fragments are looked up relative to `base_dir`
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, MixfileError> {
        let raw: RawMixfile = serde_yaml::from_str(text).map_err(MixfileError::Syntax)?;

        let defaults = Value::try_from(raw.defaults)
            .map_err(|source| MixfileError::Document {
                context: "defaults".to_string(),
                source: ValueSourceError::Conversion {
                    origin: "defaults".to_string(),
                    source,
                },
            })
            .and_then(|value| {
                ValueTree::try_from(value).map_err(|other| MixfileError::Document {
                    context: "defaults".to_string(),
                    source: ValueSourceError::NotAMapping {
                        origin: "defaults".to_string(),
                        found: other.kind(),
                    },
                })
            })?;

        let fragments = Fragments {
            root: base_dir.join(raw.fragments.unwrap_or_default()),
        };

        let mixers = raw
            .mixers
            .into_iter()
            .map(|mixer| {
                let steps = fragments.steps(mixer.steps, &mixer.name)?;
                Ok(ScriptedMixer {
                    name: mixer.name,
                    steps,
                })
            })
            .collect::<Result<_, MixfileError>>()?;

        Ok(Self { defaults, mixers })
    }
}

struct Fragments {
    root: PathBuf,
}

impl Fragments {
    fn steps(&self, raw: Vec<RawStep>, mixer: &str) -> Result<Vec<Step>, MixfileError> {
        let invalid = |reason: &str| MixfileError::Step {
            mixer: mixer.to_string(),
            reason: reason.to_string(),
        };

        raw.into_iter()
            .map(|step| match (step.push, step.patch, step.steps) {
                (Some(push), None, None) => Ok(Step::Push(self.documents(push, mixer)?)),
                (Some(_), None, Some(_)) => Err(invalid("a push step cannot have nested steps")),
                (None, Some(patch), steps) => {
                    let mut documents = self.documents(patch, mixer)?;
                    if documents.len() != 1 {
                        return Err(MixfileError::PatchBase {
                            mixer: mixer.to_string(),
                            found: documents.len(),
                        });
                    }
                    Ok(Step::Patch {
                        base: documents.remove(0),
                        steps: self.steps(steps.unwrap_or_default(), mixer)?,
                    })
                }
                (Some(_), Some(_), _) => Err(invalid("a step is either push or patch, not both")),
                (None, None, _) => Err(invalid("a step needs push or patch")),
            })
            .collect()
    }

    fn documents(&self, source: RawSource, mixer: &str) -> Result<Vec<Document>, MixfileError> {
        match source {
            RawSource::Fragment(name) => {
                let path = self.root.join(format!("{name}.yaml"));
                tracing::debug!(path=%path.display(), "loading fragment");

                let text = std::fs::read_to_string(&path).map_err(|source| MixfileError::Io {
                    path: path.clone(),
                    source,
                })?;
                loader::parse_yaml_documents_named(&text, &name).map_err(|source| {
                    MixfileError::Document {
                        context: format!("fragment {name} of mixer {mixer}"),
                        source,
                    }
                })
            }
            RawSource::Inline(yaml) => {
                let context = || format!("inline document of mixer {mixer}");
                let value = Value::try_from(yaml).map_err(|source| MixfileError::Document {
                    context: context(),
                    source: ValueSourceError::Conversion {
                        origin: context(),
                        source,
                    },
                })?;
                let document =
                    ValueTree::try_from(value).map_err(|other| MixfileError::Document {
                        context: context(),
                        source: ValueSourceError::NotAMapping {
                            origin: context(),
                            found: other.kind(),
                        },
                    })?;
                Ok(vec![document])
            }
        }
    }
}

impl ScriptedMixer {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }
}

fn apply(steps: &[Step], mix: &mut Mix<'_>) -> Result<(), MixerError> {
    for step in steps {
        match step {
            Step::Push(documents) => {
                for document in documents {
                    let document = mix.interpolate(document)?;
                    mix.push(document);
                }
            }
            Step::Patch { base, steps } => {
                let base = mix.interpolate(base)?;
                mix.patch(&base, |mix| apply(steps, mix))?;
            }
        }
    }

    Ok(())
}

impl Mixer for ScriptedMixer {
    fn name(&self) -> &str {
        &self.name
    }

    fn mix(&self, mix: &mut Mix<'_>) -> Result<(), MixerError> {
        apply(&self.steps, mix)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MixfileError {
    #[error("unable to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid mixfile")]
    Syntax(#[source] serde_yaml::Error),
    #[error("invalid {context}")]
    Document {
        context: String,
        #[source]
        source: ValueSourceError,
    },
    #[error("patch base of mixer {mixer} must be exactly one document, found {found}")]
    PatchBase { mixer: String, found: usize },
    #[error("invalid step in mixer {mixer}: {reason}")]
    Step { mixer: String, reason: String },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::release::ReleaseId;
    use crate::tree;
    use crate::tree::DocumentSet;
    use pretty_assertions::assert_eq;

    #[test]
    fn inline_steps() {
        let mixfile = Mixfile::parse(
            r#"
defaults: {app: web}
mixers:
  - name: inline
    steps:
      - patch: {metadata: {labels: {app: "${app}"}}}
        steps:
          - push: {kind: Pod, metadata: {name: "${release}"}}
      - push: {kind: Service}
"#,
            Path::new("."),
        )
        .unwrap();

        assert_eq!(mixfile.defaults, tree!("app: web"));
        assert_eq!(mixfile.mixers.len(), 1);

        let documents = mixfile.mixers[0]
            .run(&mixfile.defaults, &ReleaseId::from("rel"))
            .unwrap();
        assert_eq!(
            documents,
            DocumentSet::from(vec![
                tree!("kind: Pod\nmetadata: {name: rel, labels: {app: web}}"),
                tree!("kind: Service"),
            ])
        );
    }

    #[test]
    fn fragments_are_loaded_up_front() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("parts/common")).unwrap();
        std::fs::write(
            dir.path().join("parts/common/metadata.yaml"),
            "metadata: {namespace: '${namespace}'}",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("parts/pair.yaml"),
            "kind: ConfigMap\n---\nkind: Secret\n",
        )
        .unwrap();

        let mixfile = Mixfile::parse(
            "fragments: parts\nmixers:\n  - name: m\n    steps:\n      - push: pair\n      - patch: common/metadata\n",
            dir.path(),
        )
        .unwrap();
        drop(dir);

        assert_eq!(
            mixfile.mixers[0].steps(),
            &[
                Step::Push(vec![tree!("kind: ConfigMap"), tree!("kind: Secret")]),
                Step::Patch {
                    base: tree!("metadata: {namespace: '${namespace}'}"),
                    steps: vec![],
                },
            ]
        );

        let documents = mixfile.mixers[0]
            .run(&tree!("namespace: prod"), &ReleaseId::from("rel"))
            .unwrap();
        assert_eq!(documents.len(), 3);
        assert_eq!(documents.as_slice()[2], tree!("metadata: {namespace: prod}"));
    }

    #[test]
    fn patch_base_must_be_one_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pair.yaml"), "a: 1\n---\nb: 2\n").unwrap();

        let err = Mixfile::parse("mixers:\n  - name: m\n    steps:\n      - patch: pair\n", dir.path())
            .unwrap_err();
        assert!(matches!(err, MixfileError::PatchBase { found: 2, .. }));
    }

    #[test]
    fn push_with_nested_steps_is_rejected() {
        let err = Mixfile::parse(
            "mixers:\n  - name: m\n    steps:\n      - push: {kind: Pod}\n        steps:\n          - push: {kind: Lost}\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, MixfileError::Step { ref mixer, .. } if mixer == "m"));
    }

    #[test]
    fn misspelled_step_fields_are_rejected() {
        let err = Mixfile::parse(
            "mixers:\n  - name: m\n    steps:\n      - patch: {kind: Pod}\n        stpes:\n          - push: {kind: Lost}\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, MixfileError::Syntax(_)));

        let err = Mixfile::parse(
            "mixers:\n  - name: m\n    steps:\n      - push: {kind: A}\n        patch: {kind: B}\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, MixfileError::Step { .. }));
    }

    #[test]
    fn missing_fragment() {
        let dir = tempfile::tempdir().unwrap();
        let err = Mixfile::parse("mixers:\n  - name: m\n    steps:\n      - push: nope\n", dir.path())
            .unwrap_err();
        assert!(matches!(err, MixfileError::Io { .. }));
    }

    #[test]
    fn undefined_value_fails_the_run() {
        let mixfile = Mixfile::parse(
            "mixers:\n  - name: m\n    steps:\n      - push: {image: '${image.tag}'}\n",
            Path::new("."),
        )
        .unwrap();

        assert_eq!(
            mixfile.mixers[0].run(&ValueTree::new(), &ReleaseId::from("rel")),
            Err(MixerError::UndefinedValue("image.tag".to_string()))
        );
    }
}

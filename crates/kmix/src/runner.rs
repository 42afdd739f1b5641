//! running mixers in order
use crate::mixer::{Mixer, MixerError};
use crate::release::ReleaseId;
use crate::tree::{DocumentSet, ValueTree};

/// Explicit, ordered list of mixers
#[derive(Default)]
pub struct MixerRunner {
    mixers: Vec<Box<dyn Mixer>>,
}

impl MixerRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a mixer, builder style
    pub fn with(mut self, mixer: impl Mixer + 'static) -> Self {
        self.register(mixer);
        self
    }

    /// Append a mixer
    pub fn register(&mut self, mixer: impl Mixer + 'static) {
        self.mixers.push(Box::new(mixer));
    }

    pub fn len(&self) -> usize {
        self.mixers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mixers.is_empty()
    }

    /// Run all mixers in order and concatenate their documents
    ///
    /// The first failing mixer aborts the run.
    #[tracing::instrument(level = "debug", skip_all, fields(%release, mixers = self.mixers.len()))]
    pub fn run_all(
        &self,
        values: &ValueTree,
        release: &ReleaseId,
    ) -> Result<DocumentSet, RunError> {
        let mut documents = DocumentSet::new();

        for (position, mixer) in self.mixers.iter().enumerate() {
            let output = mixer.run(values, release).map_err(|source| RunError {
                mixer: mixer.name().to_string(),
                position,
                release: release.clone(),
                source,
            })?;

            tracing::debug!(
                mixer = mixer.name(),
                documents = output.len(),
                "mixer finished"
            );
            documents.append(output);
        }

        Ok(documents)
    }
}

impl<M: Mixer + 'static> FromIterator<M> for MixerRunner {
    fn from_iter<T: IntoIterator<Item = M>>(iter: T) -> Self {
        let mut runner = MixerRunner::new();
        for mixer in iter {
            runner.register(mixer);
        }
        runner
    }
}

#[derive(thiserror::Error, Debug)]
#[error("mixer {mixer} (#{position}) failed for release {release}")]
pub struct RunError {
    pub mixer: String,
    pub position: usize,
    pub release: ReleaseId,
    #[source]
    pub source: MixerError,
}

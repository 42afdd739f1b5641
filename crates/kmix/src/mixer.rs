//! mixers and the push/patch scope machine
//!
//! A [Mixer] builds documents by driving a [Mix]. Two operations exist:
//!
//! - [Mix::push] emits a document
//! - [Mix::patch] opens a scope seeded with a clone of a base document; everything pushed
//!   inside the scope is merged into that clone instead of being emitted. Closing the scope
//!   emits the merged result once, as if it was pushed.
//!
//! Scopes nest. The open scopes live on an explicit stack (one target document per depth), so
//! [Mix::open_patch] and [Mix::close_patch] can be used directly when a closure does not fit.
//!
//! ```
//! # use kmix::{mixer::{self, Mixer}, tree, release::ReleaseId};
//! let mixer = mixer::from_fn("web", |mix| {
//!     mix.patch(&tree!("metadata: {labels: {app: web}}"), |mix| {
//!         mix.push(tree!("kind: Pod\nmetadata: {name: web}"));
//!         Ok(())
//!     })?;
//!     mix.push(tree!("kind: Service"));
//!     Ok(())
//! });
//!
//! let documents = mixer.run(&tree!(""), &ReleaseId::from("web")).unwrap();
//! assert_eq!(documents.len(), 2);
//! ```
use crate::interpolate;
use crate::release::ReleaseId;
use crate::tree::{Document, DocumentSet, ValueTree};
use crate::value::Value;

/// Unit of pipeline logic
pub trait Mixer {
    /// Name used in logs and errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Issue push/patch operations
    fn mix(&self, mix: &mut Mix<'_>) -> Result<(), MixerError>;

    /// Run against `values` and collect the emitted documents
    fn run(&self, values: &ValueTree, release: &ReleaseId) -> Result<DocumentSet, MixerError> {
        let mut mix = Mix::new(values, release);
        self.mix(&mut mix)?;
        mix.finish()
    }
}

// blanket impl for Fn
impl<F> Mixer for F
where
    F: Fn(&mut Mix<'_>) -> Result<(), MixerError>,
{
    fn mix(&self, mix: &mut Mix<'_>) -> Result<(), MixerError> {
        self(mix)
    }
}

/// Named mixer backed by a closure
pub struct FnMixer<F> {
    name: String,
    body: F,
}

pub fn from_fn<F>(name: impl Into<String>, body: F) -> FnMixer<F>
where
    F: Fn(&mut Mix<'_>) -> Result<(), MixerError>,
{
    FnMixer {
        name: name.into(),
        body,
    }
}

impl<F> Mixer for FnMixer<F>
where
    F: Fn(&mut Mix<'_>) -> Result<(), MixerError>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn mix(&self, mix: &mut Mix<'_>) -> Result<(), MixerError> {
        (self.body)(mix)
    }
}

/// State of one mixer run
#[derive(Debug)]
pub struct Mix<'a> {
    values: &'a ValueTree,
    release: &'a ReleaseId,
    output: DocumentSet,
    /// open patch targets, innermost last
    scopes: Vec<Document>,
}

impl<'a> Mix<'a> {
    pub fn new(values: &'a ValueTree, release: &'a ReleaseId) -> Self {
        Self {
            values,
            release,
            output: DocumentSet::new(),
            scopes: vec![],
        }
    }

    pub fn values(&self) -> &'a ValueTree {
        self.values
    }

    pub fn release(&self) -> &'a ReleaseId {
        self.release
    }

    /// Number of open patch scopes
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Value at a dotted path
    pub fn value(&self, path: &str) -> Result<&'a Value, MixerError> {
        self.values
            .lookup(path)
            .ok_or_else(|| MixerError::UndefinedValue(path.to_string()))
    }

    /// Evaluate the `${...}` templates in all strings of `document`
    pub fn interpolate(&self, document: &Document) -> Result<Document, MixerError> {
        interpolate::document(document, self.values, self.release)
    }

    /// Emit `document`, or merge it into the innermost open patch
    pub fn push(&mut self, document: Document) {
        let depth = self.scopes.len();
        match self.scopes.last_mut() {
            Some(target) => {
                tracing::trace!(depth, "merge into patch target");
                *target = target.merge(&document);
            }
            None => {
                tracing::trace!(position = self.output.len(), "emit document");
                self.output.push(document);
            }
        }
    }

    pub fn push_all(&mut self, documents: impl IntoIterator<Item = Document>) {
        for document in documents {
            self.push(document);
        }
    }

    /// Open a patch scope seeded with a clone of `base`
    pub fn open_patch(&mut self, base: &Document) {
        self.scopes.push(base.clone());
        tracing::trace!(depth = self.scopes.len(), "patch opened");
    }

    /// Close the innermost patch scope and push its target
    pub fn close_patch(&mut self) -> Result<(), MixerError> {
        let target = self.scopes.pop().ok_or(MixerError::NoOpenPatch)?;
        tracing::trace!(depth = self.scopes.len(), "patch closed");
        self.push(target);
        Ok(())
    }

    /// Run `body` inside a patch scope seeded with `base`
    ///
    /// When `body` fails, the scope is discarded and nothing is pushed.
    pub fn patch<F>(&mut self, base: &Document, body: F) -> Result<(), MixerError>
    where
        F: FnOnce(&mut Self) -> Result<(), MixerError>,
    {
        self.open_patch(base);
        let depth = self.scopes.len();

        let result = body(self).and_then(|()| match self.scopes.len() {
            found if found == depth => Ok(()),
            found => Err(MixerError::UnbalancedPatch {
                expected: depth,
                found,
            }),
        });

        if let Err(err) = result {
            // drop this scope and everything opened inside it
            self.scopes.truncate(depth - 1);
            return Err(err);
        }

        self.close_patch()
    }

    /// Emitted documents, all patch scopes must be closed
    pub fn finish(self) -> Result<DocumentSet, MixerError> {
        if !self.scopes.is_empty() {
            return Err(MixerError::UnclosedPatch(self.scopes.len()));
        }

        Ok(self.output)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum MixerError {
    #[error("undefined value `{0}`")]
    UndefinedValue(String),
    #[error("value `{path}` is {kind} and cannot be embedded in text")]
    NotInterpolable { path: String, kind: &'static str },
    #[error("patch body left {found} scopes open, expected {expected}")]
    UnbalancedPatch { expected: usize, found: usize },
    #[error("{0} patch scopes were never closed")]
    UnclosedPatch(usize),
    #[error("no patch scope is open")]
    NoOpenPatch,
    #[error("unable to evaluate template `{text}`: {reason}")]
    Template { text: String, reason: String },
    #[error("{0}")]
    Custom(String),
}

impl MixerError {
    pub fn custom(message: impl std::fmt::Display) -> Self {
        MixerError::Custom(message.to_string())
    }
}

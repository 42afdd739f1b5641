//! # kmix - layered values and document mixing
//!
//! `kmix` renders ordered sets of (kubernetes) manifests from value overrides and template
//! fragments.
//!
//! ## Introduction for developers
//!
//! Read this to understand how `kmix` works internally.
//!
//! ### Values
//!
//! Everything is a [value::Value]. A [tree::ValueTree] is a value with an object at its root.
//! Values are resolved by merging trees on top of each other ([tree::ValueTree::merge]):
//! objects merge key by key, everything else is replaced.
//!
//! [resolver::ValueResolver] merges, lowest precedence first:
//!
//! | layer     | source                                             |
//! |-----------|----------------------------------------------------|
//! | defaults  | the mixfile's `defaults`                           |
//! | state     | [state::StateSnapshot], only when asked for        |
//! | files     | `--values` files, YAML/JSON/HCL ([loader])          |
//! | inline    | `--set path.to.key=value` assignments               |
//!
//! ### Mixing
//!
//! A [mixer::Mixer] turns the resolved values into documents by driving a [mixer::Mix]:
//!
//! ```text
//! push(a)                 -> [a]
//! patch(base) {           -> [merge(merge(base, b), c)]
//!     push(b)
//!     push(c)
//! }
//! ```
//!
//! `push` emits a document. `patch` opens a scope: documents pushed inside are merged into a
//! clone of `base`, which is emitted once the scope closes. Scopes nest and are kept on an
//! explicit stack.
//!
//! Mixers are ordinary values: closures ([mixer::from_fn]) or [script::ScriptedMixer]s read from
//! a mixfile. [runner::MixerRunner] runs an explicit list of them and concatenates the output.
//!
//! ### Output
//!
//! [render] writes the documents as multi-document YAML or as a JSON array.
//!
mod interpolate;
pub mod loader;
pub mod mixer;
pub mod release;
pub mod render;
pub mod resolver;
pub mod runner;
pub mod script;
pub mod state;
pub mod tree;
pub mod value;

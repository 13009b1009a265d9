//! LayerDoc: a layer document store driven by intents.
//!
//! [`store::apply`] is the reducer. [`project::Project`] wraps a document
//! with undo history and a file binding, and [`script`] exposes the intent
//! set to Rhai.

#![allow(clippy::too_many_arguments)]

pub mod logger;

pub mod arrange;
pub mod cli;
pub mod document;
pub mod history;
pub mod ids;
pub mod intent;
pub mod io;
pub mod project;
pub mod script;
pub mod settings;
pub mod store;

//! Query interpretation and constrained tone generation.
//!
//! Free text goes in, a [`ToneSpec`](tone_protocol::ToneSpec) built only from
//! catalog models comes out. See [`ToneEngine::generate_tone`].

pub mod modules;

pub use modules::*;
pub use modules::engine::ToneEngine;
pub use modules::error::{CatalogError, EngineError, LoadError, TablesError};

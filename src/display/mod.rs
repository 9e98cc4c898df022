//! Human-readable renderings of a model.
pub mod trace;

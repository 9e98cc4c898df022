//! Python-facing wrappers.
pub mod python;

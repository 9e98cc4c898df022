// Library root: an equation language for stochastic, time-lagged economic
// models, compiled into a dependency graph and simulated N x M times.
// With the `python` feature the crate also builds the `_core` extension module.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod error;
pub mod grammar;
pub mod model;
pub mod simulation;
pub mod store;

#[cfg(feature = "python")]
mod bindings;

pub use config::{ConfigError, ParameterSet, SimulationConfig};
pub use error::ModelError;
pub use model::{Model, Phase};
pub use simulation::{IterationView, RunReport, SimulationFailure, SimulationObserver, SimulationResults};

#[cfg(feature = "python")]
use pyo3::prelude::*;

// --- Module Definition ---
/// Defines the `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<bindings::python::PyModel>()?;
    Ok(())
}

//! Drives repeated evaluation of a resolved model and collects the results.
pub mod driver;
pub mod results;

pub use driver::{IterationView, RunReport, Silent, SimulationFailure, SimulationObserver, Simulator};
pub use results::{SimulationResults, SimulationSeries};

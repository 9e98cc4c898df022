//! Binds, evaluates and steps the computation graph.
pub mod engine;
pub mod kernel;
pub mod ledger;
pub mod program;

pub use engine::Engine;
pub use ledger::{ComputationError, Ledger, NodeFailure};
pub use program::{Code, Compiler, Program, Step};

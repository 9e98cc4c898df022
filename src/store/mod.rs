//! Arena storage for the computation graph.
pub mod registry;
pub mod types;

pub use registry::Registry;
pub use types::{lag_name, seed_depth, seed_name, Edge, NodeId, NodeKind, NodeMetadata};

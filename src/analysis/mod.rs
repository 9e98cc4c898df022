//! Resolution of parsed equations into a graph, and views of that graph.
pub mod resolver;
pub mod topology;

pub use resolver::{resolve, ResolveError, ResolvedGraph};

use crate::store::NodeId;
use thiserror::Error;

/// Arithmetic failures raised while evaluating one node.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Math error in {function}: {message}")]
    Domain { function: String, message: String },
    #[error("Non-finite result of {expr}")]
    NonFinite { expr: String },
    #[error("Structural mismatch: {msg}")]
    Mismatch { msg: String },
}

/// A `ComputationError` pinned to the node whose evaluation raised it.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Evaluation of node {node:?} failed: {source}")]
pub struct NodeFailure {
    pub node: NodeId,
    #[source]
    pub source: ComputationError,
}

/// Scalar state of every node during one simulation run, indexed by `NodeId`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    values: Vec<f64>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    #[inline(always)]
    pub fn get(&self, node_id: NodeId) -> f64 {
        self.values.get(node_id.index()).copied().unwrap_or(f64::NAN)
    }

    #[inline(always)]
    pub fn insert(&mut self, node_id: NodeId, value: f64) {
        let idx = node_id.index();
        if idx >= self.values.len() {
            self.values.resize(idx + 1, f64::NAN);
        }
        self.values[idx] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

use super::types::*;
use crate::grammar::Expr;
use std::collections::HashMap;

/// Arena holding one node per model name.
///
/// Nodes are addressed by dense `NodeId`s; parents are stored CSR-style so a
/// node's dependencies are a contiguous slice.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    // Columnar Arrays
    pub kinds: Vec<NodeKind>,
    pub meta: Vec<NodeMetadata>,

    // Topology (CSR)
    pub parents_flat: Vec<NodeId>,
    pub edges_flat: Vec<Edge>,
    pub parents_ranges: Vec<(u32, u32)>, // (start, count)

    // Data Blobs
    pub equations: Vec<Expr>,

    names: HashMap<String, NodeId>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }

    /// Appends a node. Callers guarantee the name is not registered yet.
    fn add_node(&mut self, kind: NodeKind, parents: &[(NodeId, Edge)], meta: NodeMetadata) -> NodeId {
        debug_assert!(!self.names.contains_key(&meta.name), "duplicate node '{}'", meta.name);
        let id = NodeId(self.kinds.len() as u32);

        // 1. Register Parents
        let start = self.parents_flat.len() as u32;
        let count = parents.len() as u32;
        for &(parent, edge) in parents {
            self.parents_flat.push(parent);
            self.edges_flat.push(edge);
        }
        self.parents_ranges.push((start, count));

        // 2. Metadata
        self.names.insert(meta.name.clone(), id);
        self.kinds.push(kind);
        self.meta.push(meta);

        id
    }

    pub fn add_parameter(&mut self, name: &str, value: f64) -> NodeId {
        let meta = NodeMetadata { name: name.to_string(), line: None };
        self.add_node(NodeKind::Parameter(value), &[], meta)
    }

    pub fn add_variable(&mut self, name: &str, expr: Expr, parents: &[NodeId], line: usize) -> NodeId {
        let idx = self.equations.len() as u32;
        self.equations.push(expr);
        let edges: Vec<(NodeId, Edge)> = parents.iter().map(|&p| (p, Edge::Value)).collect();
        let meta = NodeMetadata { name: name.to_string(), line: Some(line) };
        self.add_node(NodeKind::Variable(idx), &edges, meta)
    }

    /// Adds link `depth` of `base`'s chain, fed by `prev` (the base itself for depth 1).
    pub fn add_lagged(&mut self, base: NodeId, depth: u32, seed: NodeId, prev: NodeId) -> NodeId {
        let name = lag_name(self.name(base), depth);
        let kind = NodeKind::Lagged { base, depth, seed, next: None };
        let meta = NodeMetadata { name, line: None };
        self.add_node(kind, &[(prev, Edge::Delay), (seed, Edge::Seed)], meta)
    }

    pub fn link_next(&mut self, id: NodeId, next_link: NodeId) {
        if let NodeKind::Lagged { next, .. } = &mut self.kinds[id.index()] {
            *next = Some(next_link);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.meta[id.index()].name
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.kinds[id.index()]
    }

    /// The defining expression of a variable node.
    pub fn equation(&self, id: NodeId) -> Option<&Expr> {
        match self.kinds[id.index()] {
            NodeKind::Variable(idx) => Some(&self.equations[idx as usize]),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn get_parents(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.parents_flat[start as usize..(start + count) as usize]
    }

    #[inline(always)]
    pub fn get_edges(&self, id: NodeId) -> &[Edge] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.edges_flat[start as usize..(start + count) as usize]
    }

    /// Head of `base`'s lag chain, if anything lags it.
    pub fn lag_head(&self, base: NodeId) -> Option<NodeId> {
        self.lookup(&lag_name(self.name(base), 1))
    }

    /// Walks `depth - 1` links from `head`. `None` past the end of the chain.
    pub fn lag_link(&self, head: NodeId, depth: u32) -> Option<NodeId> {
        let mut current = head;
        for _ in 1..depth {
            match self.kinds[current.index()] {
                NodeKind::Lagged { next: Some(next), .. } => current = next,
                _ => return None,
            }
        }
        Some(current)
    }

    pub fn parameter_value(&self, id: NodeId) -> Option<f64> {
        match self.kinds[id.index()] {
            NodeKind::Parameter(v) => Some(v),
            _ => None,
        }
    }

    pub fn update_parameter(&mut self, id: NodeId, value: f64) -> Result<(), String> {
        match &mut self.kinds[id.index()] {
            NodeKind::Parameter(old) => {
                *old = value;
                Ok(())
            }
            _ => Err(format!("Node '{}' is not a parameter.", self.meta[id.index()].name)),
        }
    }

    /// The starting state of a run: parameter values, `NaN` for everything computed.
    pub fn initial_values(&self) -> Vec<f64> {
        self.kinds
            .iter()
            .map(|k| match k {
                NodeKind::Parameter(v) => *v,
                _ => f64::NAN,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_walk() {
        let mut reg = Registry::new();
        let y = reg.add_variable("Y", Expr::Number(1.0), &[], 1);
        let s1 = reg.add_parameter("Y_t_minus_1", 0.0);
        let s2 = reg.add_parameter("Y_t_minus_2", 0.0);
        let l1 = reg.add_lagged(y, 1, s1, y);
        let l2 = reg.add_lagged(y, 2, s2, l1);
        reg.link_next(l1, l2);

        assert_eq!(reg.lag_head(y), Some(l1));
        assert_eq!(reg.lag_link(l1, 1), Some(l1));
        assert_eq!(reg.lag_link(l1, 2), Some(l2));
        assert_eq!(reg.lag_link(l1, 3), None);
        assert_eq!(reg.name(l2), "LAG(Y,2)");
        assert_eq!(reg.get_parents(l2), &[l1, s2]);
        assert_eq!(reg.get_edges(l2), &[Edge::Delay, Edge::Seed]);
    }

    #[test]
    fn test_update_parameter_rejects_variables() {
        let mut reg = Registry::new();
        let a = reg.add_parameter("A", f64::NAN);
        let y = reg.add_variable("Y", Expr::Name("A".into()), &[a], 1);

        reg.update_parameter(a, 2.0).unwrap();
        assert_eq!(reg.parameter_value(a), Some(2.0));
        assert!(reg.update_parameter(y, 1.0).is_err());

        let init = reg.initial_values();
        assert_eq!(init[0], 2.0);
        assert!(init[1].is_nan());
    }
}

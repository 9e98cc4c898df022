//! Graph views of a resolved model, built on `petgraph`.
//!
//! The registry stores parents CSR-style for evaluation. These helpers export
//! the same topology as a `DiGraph` with edges pointing from a dependency to
//! its consumer, for rendering and structural comparison.

use crate::store::{Edge, NodeId, Registry};
use petgraph::algo::is_isomorphic_matching;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};

/// One graph node per registry node, indices preserved.
pub fn dependency_graph(registry: &Registry) -> DiGraph<String, Edge> {
    let mut graph = DiGraph::with_capacity(registry.count(), registry.parents_flat.len());
    for meta in &registry.meta {
        graph.add_node(meta.name.clone());
    }
    for i in 0..registry.count() {
        let child = NodeId::new(i);
        for (&parent, &edge) in registry.get_parents(child).iter().zip(registry.get_edges(child)) {
            graph.add_edge(NodeIndex::new(parent.index()), NodeIndex::new(i), edge);
        }
    }
    graph
}

/// Graphviz rendering, edges labelled `value`, `delay` or `seed`.
pub fn to_dot(registry: &Registry) -> String {
    let graph = dependency_graph(registry);
    format!("{}", Dot::with_config(&graph, &[]))
}

/// True when both registries hold the same named nodes wired the same way.
/// Node creation order is irrelevant.
pub fn same_structure(a: &Registry, b: &Registry) -> bool {
    if a.count() != b.count() || a.parents_flat.len() != b.parents_flat.len() {
        return false;
    }
    let ga = dependency_graph(a);
    let gb = dependency_graph(b);
    is_isomorphic_matching(&ga, &gb, |x, y| x == y, |x, y| x == y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::resolver::{resolve, ResolvedGraph};
    use crate::grammar::EquationSet;

    fn build(src: &str) -> ResolvedGraph {
        let set = EquationSet::parse(src).unwrap();
        resolve(set.equations(), &set.end_of_chain(), &set.parameters(), set.lag_depths()).unwrap()
    }

    #[test]
    fn test_dependency_graph_mirrors_registry() {
        let graph = build("Y = A + LAG(Y, 2)");
        let dag = dependency_graph(&graph.registry);
        assert_eq!(dag.node_count(), graph.registry.count());
        // A -> Y, Y -> LAG1, seed1 -> LAG1, LAG1 -> LAG2, seed2 -> LAG2
        assert_eq!(dag.edge_count(), 5);
        let delays = dag.edge_weights().filter(|e| **e == Edge::Delay).count();
        assert_eq!(delays, 2);
    }

    #[test]
    fn test_structure_ignores_declaration_order() {
        let a = build("Y = A + B\nB = C * 2");
        let b = build("B = C * 2\nY = A + B");
        let c = build("Y = A + B\nB = C * A");
        assert!(same_structure(&a.registry, &b.registry));
        assert!(!same_structure(&a.registry, &c.registry));
    }

    #[test]
    fn test_dot_output_names_nodes_and_edges() {
        let graph = build("Y = LAG(Y, 1)");
        let dot = to_dot(&graph.registry);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.contains("Y_t_minus_1"));
        assert!(dot.contains("delay"));
        assert!(dot.contains("seed"));
    }
}

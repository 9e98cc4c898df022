//! Turns parsed equations into the computation graph.
//!
//! Every distinct name becomes exactly one node. Parameters (including the
//! synthesized lag seeds) are created first; variables are then materialized
//! depth-first from the end-of-chain roots, so a variable's parents always
//! exist before it does and the creation order doubles as evaluation order.
//! Lag reads are delay edges, not value edges: they never enter the
//! depth-first walk, which is what lets `Y = LAG(Y, 1)` resolve without a cycle.

use crate::compute::{ComputationError, Compiler, Program};
use crate::grammar::Statement;
use crate::store::{lag_name, seed_name, NodeId, Registry};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },
    #[error("'{name}' is reserved for the lag seed of '{base}' and cannot have an equation")]
    ReservedName { name: String, base: String },
    #[error("'{name}' has neither an equation nor a parameter declaration")]
    UndefinedName { name: String },
    #[error("Failed to bind the model: {0}")]
    Binding(#[from] ComputationError),
}

/// The resolved model: the arena plus the four node groups callers work with.
#[derive(Debug, Clone, Default)]
pub struct ResolvedGraph {
    pub registry: Registry,
    pub end_of_chain: Vec<NodeId>,
    pub parameters: Vec<NodeId>,
    /// First link of every lag chain.
    pub lag_heads: Vec<NodeId>,
    /// Variables in dependency order, bound for evaluation.
    pub program: Program,
}

impl ResolvedGraph {
    pub fn variables(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.program.steps.iter().map(|s| s.target)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting, // Used for cycle detection
    Visited,
}

struct Resolver<'a> {
    equations: HashMap<&'a str, &'a Statement>,
    registry: Registry,
    state: HashMap<String, VisitState>,
    /// Names currently being materialized, outermost first.
    stack: Vec<String>,
    order: Vec<NodeId>,
}

/// Builds the graph for `equations`.
///
/// `end_of_chain` names are materialized first and in order; any equation not
/// reachable from them is materialized afterwards so that value cycles without
/// an end-of-chain member are still reported.
pub fn resolve(
    equations: &[Statement],
    end_of_chain: &[String],
    parameters: &[String],
    lag_depths: &BTreeMap<String, u32>,
) -> Result<ResolvedGraph, ResolveError> {
    let mut resolver = Resolver {
        equations: equations.iter().map(|s| (s.name.as_str(), s)).collect(),
        registry: Registry::new(),
        state: HashMap::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };

    // 1. Parameters, declared and synthesized.
    let mut parameter_ids = Vec::with_capacity(parameters.len());
    for name in parameters {
        if resolver.registry.lookup(name).is_none() {
            parameter_ids.push(resolver.registry.add_parameter(name, f64::NAN));
        }
    }
    for (base, &depth) in lag_depths {
        for k in 1..=depth {
            let seed = seed_name(base, k);
            if resolver.equations.contains_key(seed.as_str()) {
                return Err(ResolveError::ReservedName { name: seed, base: base.clone() });
            }
            if resolver.registry.lookup(&seed).is_none() {
                parameter_ids.push(resolver.registry.add_parameter(&seed, f64::NAN));
            }
        }
    }

    // 2. Variables, depth-first from the roots.
    let mut eoc_ids = Vec::with_capacity(end_of_chain.len());
    for name in end_of_chain {
        eoc_ids.push(resolver.materialize(name)?);
    }
    for stmt in equations {
        resolver.materialize(&stmt.name)?;
    }

    // 3. Lag chains, now that every base exists.
    let mut lag_heads = Vec::with_capacity(lag_depths.len());
    for (base, &depth) in lag_depths {
        let base_id = resolver
            .registry
            .lookup(base)
            .ok_or_else(|| ResolveError::UndefinedName { name: base.clone() })?;
        lag_heads.push(resolver.attach_lag_chain(base_id, base, depth)?);
    }

    // 4. Bind.
    let program = Compiler::new(&resolver.registry).compile(&resolver.order)?;
    debug!(
        nodes = resolver.registry.count(),
        variables = program.steps.len(),
        parameters = parameter_ids.len(),
        lag_chains = lag_heads.len(),
        "resolved model graph"
    );

    Ok(ResolvedGraph {
        registry: resolver.registry,
        end_of_chain: eoc_ids,
        parameters: parameter_ids,
        lag_heads,
        program,
    })
}

impl<'a> Resolver<'a> {
    fn materialize(&mut self, name: &str) -> Result<NodeId, ResolveError> {
        // Parameters are registered up front; finished variables are in the arena.
        if let Some(id) = self.registry.lookup(name) {
            return Ok(id);
        }
        if self.state.get(name) == Some(&VisitState::Visiting) {
            return Err(self.cycle_error(name));
        }

        let stmt = *self
            .equations
            .get(name)
            .ok_or_else(|| ResolveError::UndefinedName { name: name.to_string() })?;

        self.state.insert(name.to_string(), VisitState::Visiting);
        self.stack.push(name.to_string());

        let mut parents = Vec::with_capacity(stmt.dependencies.len());
        for dep in &stmt.dependencies {
            let id = self.materialize(dep)?;
            if !parents.contains(&id) {
                parents.push(id);
            }
        }

        self.stack.pop();
        self.state.insert(name.to_string(), VisitState::Visited);

        let id = self.registry.add_variable(name, stmt.expr.clone(), &parents, stmt.line);
        self.order.push(id);
        Ok(id)
    }

    /// The path from the first visit of `name` back to `name`.
    fn cycle_error(&self, name: &str) -> ResolveError {
        let start = self.stack.iter().position(|n| n == name).unwrap_or(0);
        let mut cycle: Vec<String> = self.stack[start..].to_vec();
        cycle.push(name.to_string());
        ResolveError::CyclicDependency { cycle }
    }

    /// Creates links `1..=depth` of `base`'s chain, head first, and returns the head.
    fn attach_lag_chain(&mut self, base: NodeId, base_name: &str, depth: u32) -> Result<NodeId, ResolveError> {
        let mut head = None;
        let mut prev = base;
        for k in 1..=depth {
            let seed_label = seed_name(base_name, k);
            let seed = self
                .registry
                .lookup(&seed_label)
                .ok_or(ResolveError::UndefinedName { name: seed_label })?;
            let link = self.registry.add_lagged(base, k, seed, prev);
            match head {
                None => head = Some(link),
                Some(_) => self.registry.link_next(prev, link),
            }
            prev = link;
        }
        head.ok_or_else(|| ResolveError::UndefinedName { name: lag_name(base_name, 1) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::EquationSet;
    use crate::store::NodeKind;

    fn resolve_text(src: &str) -> Result<ResolvedGraph, ResolveError> {
        let set = EquationSet::parse(src).expect("parse failed");
        resolve(set.equations(), &set.end_of_chain(), &set.parameters(), set.lag_depths())
    }

    fn names(graph: &ResolvedGraph, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| graph.registry.name(id).to_string()).collect()
    }

    #[test]
    fn test_shared_dependency_is_one_node() {
        let graph = resolve_text("Y = A + B\nZ = A * 2\nA = N(mu, sigma)\nB = A - 1").unwrap();
        let a = graph.registry.lookup("A").unwrap();
        let b = graph.registry.lookup("B").unwrap();
        let y = graph.registry.lookup("Y").unwrap();
        let z = graph.registry.lookup("Z").unwrap();

        assert_eq!(names(&graph, &graph.end_of_chain), vec!["Y", "Z"]);
        assert_eq!(graph.registry.get_parents(y), &[a, b]);
        assert_eq!(graph.registry.get_parents(z), &[a]);
        assert_eq!(graph.registry.get_parents(b), &[a]);
        // A, B, Y, Z plus mu and sigma
        assert_eq!(graph.registry.count(), 6);
    }

    #[test]
    fn test_evaluation_order_puts_parents_first() {
        let graph = resolve_text("Y = A + B\nA = B * 2\nB = 1").unwrap();
        let order: Vec<NodeId> = graph.variables().collect();
        assert_eq!(names(&graph, &order), vec!["B", "A", "Y"]);
    }

    #[test]
    fn test_self_lag_builds_chain_without_cycle() {
        let graph = resolve_text("Y = 0.5 * LAG(Y, 1) + LAG(Y, 3)").unwrap();
        let y = graph.registry.lookup("Y").unwrap();
        assert_eq!(graph.lag_heads.len(), 1);
        assert_eq!(names(&graph, &graph.end_of_chain), vec!["Y"]);
        assert_eq!(
            names(&graph, &graph.parameters),
            vec!["Y_t_minus_1", "Y_t_minus_2", "Y_t_minus_3"]
        );

        let mut link = Some(graph.lag_heads[0]);
        let mut depth = 0;
        while let Some(id) = link {
            depth += 1;
            match graph.registry.kind(id) {
                NodeKind::Lagged { base, depth: d, seed, next } => {
                    assert_eq!(*base, y);
                    assert_eq!(*d, depth);
                    assert_eq!(graph.registry.name(*seed), format!("Y_t_minus_{}", depth));
                    link = *next;
                }
                other => panic!("Wrong node kind: {:?}", other),
            }
        }
        assert_eq!(depth, 3);
    }

    #[test]
    fn test_deep_lag_chain_is_fully_linked() {
        let graph = resolve_text("Y = LAG(Y, 200000)").unwrap();
        let head = graph.lag_heads[0];
        let tail = graph.registry.lag_link(head, 200000).unwrap();
        assert_eq!(graph.registry.name(tail), "LAG(Y,200000)");
        assert!(graph.registry.lag_link(head, 200001).is_none());
    }

    #[test]
    fn test_mutual_lag_is_not_a_cycle() {
        let graph = resolve_text("X = LAG(Y, 1)\nY = LAG(X, 1)").unwrap();
        assert_eq!(names(&graph, &graph.end_of_chain), vec!["X", "Y"]);
        assert_eq!(graph.lag_heads.len(), 2);
    }

    #[test]
    fn test_direct_self_reference_is_a_cycle() {
        let err = resolve_text("Y = Y + 1").unwrap_err();
        assert_eq!(err, ResolveError::CyclicDependency { cycle: vec!["Y".into(), "Y".into()] });
    }

    #[test]
    fn test_mutual_cycle_is_reported_in_order() {
        let err = resolve_text("Z = X\nX = Y + 1\nY = 2 * X").unwrap_err();
        assert_eq!(
            err,
            ResolveError::CyclicDependency { cycle: vec!["X".into(), "Y".into(), "X".into()] }
        );
    }

    #[test]
    fn test_cycle_without_end_of_chain_member_is_found() {
        let err = resolve_text("X = Y\nY = X").unwrap_err();
        assert!(matches!(err, ResolveError::CyclicDependency { .. }));
    }

    #[test]
    fn test_seed_names_are_reserved() {
        let err = resolve_text("Y = LAG(Y, 1)\nY_t_minus_1 = 3").unwrap_err();
        assert_eq!(
            err,
            ResolveError::ReservedName { name: "Y_t_minus_1".into(), base: "Y".into() }
        );
    }

    #[test]
    fn test_lagged_parameter_gets_a_chain() {
        let graph = resolve_text("X = LAG(P, 2)").unwrap();
        let p = graph.registry.lookup("P").unwrap();
        assert_eq!(graph.registry.lag_head(p), Some(graph.lag_heads[0]));
        assert_eq!(names(&graph, &graph.parameters), vec!["P", "P_t_minus_1", "P_t_minus_2"]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let src = "Y = A*X + B\nA = N(mu, sigma)";
        let first = resolve_text(src).unwrap();
        let second = resolve_text(src).unwrap();
        assert_eq!(first.registry.meta, second.registry.meta);
        assert_eq!(first.registry.parents_flat, second.registry.parents_flat);
        assert_eq!(first.end_of_chain, second.end_of_chain);
        assert_eq!(names(&first, &first.end_of_chain), vec!["Y"]);
    }
}

//! The user-facing model: load equations and parameters, run, read results.
use crate::analysis::resolver::{resolve, ResolvedGraph};
use crate::analysis::topology;
use crate::compute::Ledger;
use crate::config::{read_to_string, ParameterSet, SimulationConfig};
use crate::display::trace;
use crate::error::ModelError;
use crate::grammar::{EquationSet, Expr};
use crate::simulation::{RunReport, Silent, SimulationObserver, SimulationResults, Simulator};
use crate::store::{seed_depth, seed_name, NodeId, NodeKind};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Resolved and fully parameterized, no results yet.
    Loaded,
    /// At least one run finished; `results()` holds the latest.
    Done,
}

#[derive(Debug, Clone)]
pub struct Model {
    equations: EquationSet,
    graph: ResolvedGraph,
    results: SimulationResults,
    phase: Phase,
}

impl Model {
    /// Parses, resolves and parameterizes a model.
    ///
    /// Every parameter the equations need, lag seeds included, must be present
    /// in `parameters`. Supplied values matching no parameter are ignored.
    pub fn load(text: &str, parameters: &ParameterSet) -> Result<Self, ModelError> {
        let equations = EquationSet::parse(text)?;
        check_supplied(&equations, parameters)?;
        let mut graph = resolve(
            equations.equations(),
            &equations.end_of_chain(),
            &equations.parameters(),
            equations.lag_depths(),
        )?;

        for &id in &graph.parameters {
            let name = graph.registry.name(id).to_string();
            let value = parameters
                .get(&name)
                .ok_or_else(|| ModelError::MissingParameter { names: vec![name.clone()], omitted: 0 })?;
            graph
                .registry
                .update_parameter(id, value)
                .map_err(|_| ModelError::UnknownParameter { name })?;
        }

        for (name, _) in parameters.iter() {
            if !is_parameter(&graph, name) {
                warn!(name, "supplied value matches no parameter of the model, ignored");
            }
        }

        info!(
            equations = equations.len(),
            parameters = graph.parameters.len(),
            lag_chains = graph.lag_heads.len(),
            end_of_chain = graph.end_of_chain.len(),
            "model loaded"
        );

        Ok(Self {
            equations,
            graph,
            results: SimulationResults::new(),
            phase: Phase::Loaded,
        })
    }

    /// Loads equation text and a JSON parameter object from disk.
    pub fn from_files(equations: impl AsRef<Path>, parameters: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = read_to_string(equations.as_ref())?;
        let params = ParameterSet::from_path(parameters)?;
        Self::load(&text, &params)
    }

    pub fn run(&mut self, config: &SimulationConfig) -> RunReport {
        self.run_with_observer(config, &mut Silent)
    }

    /// Like `run`, reporting every iteration and finished simulation to `observer`.
    pub fn run_with_observer<O: SimulationObserver + ?Sized>(
        &mut self,
        config: &SimulationConfig,
        observer: &mut O,
    ) -> RunReport {
        let (report, results) = Simulator::new(&self.graph).run(config, observer);
        self.finish(report, results)
    }

    /// Runs simulations concurrently. Identical results to `run` for the same seed.
    pub fn run_parallel(&mut self, config: &SimulationConfig) -> RunReport {
        let (report, results) = Simulator::new(&self.graph).run_parallel(config);
        self.finish(report, results)
    }

    fn finish(&mut self, report: RunReport, results: SimulationResults) -> RunReport {
        self.results = results;
        self.phase = Phase::Done;
        report
    }

    pub fn results(&self) -> &SimulationResults {
        &self.results
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Changes a parameter or lag seed for subsequent runs.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), ModelError> {
        ensure_finite(name, value)?;
        let unknown = || ModelError::UnknownParameter { name: name.to_string() };
        let id = self.graph.registry.lookup(name).ok_or_else(unknown)?;
        self.graph.registry.update_parameter(id, value).map_err(|_| unknown())
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        let id = self.graph.registry.lookup(name)?;
        self.graph.registry.parameter_value(id)
    }

    pub fn equations(&self) -> &EquationSet {
        &self.equations
    }

    pub fn function_tree(&self, name: &str) -> Option<&Expr> {
        self.equations.function_tree(name)
    }

    pub fn graph(&self) -> &ResolvedGraph {
        &self.graph
    }

    pub fn end_of_chain(&self) -> Vec<&str> {
        self.names(&self.graph.end_of_chain)
    }

    /// Parameter names, synthesized lag seeds last.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.names(&self.graph.parameters)
    }

    fn names(&self, ids: &[NodeId]) -> Vec<&str> {
        ids.iter().map(|&id| self.graph.registry.name(id)).collect()
    }

    pub fn to_dot(&self) -> String {
        topology::to_dot(&self.graph.registry)
    }

    /// Audit tree of `name` showing the final values of the last completed simulation.
    pub fn trace(&self, name: &str) -> Option<String> {
        let id = self.graph.registry.lookup(name)?;
        Some(trace::format_trace(&self.graph.registry, &self.final_state(), id))
    }

    /// Last recorded value of every node, or parameter values before any run.
    fn final_state(&self) -> Ledger {
        let registry = &self.graph.registry;
        let last_simulation = self
            .results
            .get(registry.name(NodeId::new(0)))
            .and_then(|runs| runs.keys().next_back().copied());

        match last_simulation {
            Some(s) => Ledger::from_values(
                registry
                    .meta
                    .iter()
                    .map(|m| {
                        self.results
                            .series(&m.name, s)
                            .and_then(|values| values.last().copied())
                            .unwrap_or(f64::NAN)
                    })
                    .collect(),
            ),
            None => Ledger::from_values(registry.initial_values()),
        }
    }
}

/// Seed names listed in `MissingParameter` before the rest are only counted.
const MISSING_LISTED: usize = 32;

/// Checks every parameter and lag seed the equations need against `parameters`
/// before any node is built. Missing names are sorted.
fn check_supplied(equations: &EquationSet, parameters: &ParameterSet) -> Result<(), ModelError> {
    let mut missing = Vec::new();
    let mut omitted = 0usize;

    for name in equations.parameters() {
        match parameters.get(&name) {
            Some(value) => ensure_finite(&name, value)?,
            None => missing.push(name),
        }
    }

    for (base, &depth) in equations.lag_depths() {
        for k in 1..=depth {
            let seed = seed_name(base, k);
            // Defining a seed name is reported by the resolver.
            if equations.is_defined(&seed) {
                continue;
            }
            match parameters.get(&seed) {
                Some(value) => ensure_finite(&seed, value)?,
                None if missing.len() < MISSING_LISTED => missing.push(seed),
                None => {
                    let supplied = parameters
                        .iter()
                        .filter(|(name, _)| seed_depth(name, base).is_some_and(|d| d > k && d <= depth))
                        .count();
                    omitted += (depth - k + 1) as usize - supplied;
                    break;
                }
            }
        }
    }

    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    Err(ModelError::MissingParameter { names: missing, omitted })
}

fn ensure_finite(name: &str, value: f64) -> Result<(), ModelError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::NonFiniteParameter { name: name.to_string(), value })
    }
}

fn is_parameter(graph: &ResolvedGraph, name: &str) -> bool {
    graph
        .registry
        .lookup(name)
        .is_some_and(|id| matches!(graph.registry.kind(id), NodeKind::Parameter(_)))
}

use crate::store::{NodeId, Registry};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Index;

/// Everything one simulation run recorded: one column per node, one row per iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSeries {
    pub simulation: usize,
    columns: Vec<Vec<f64>>,
}

impl SimulationSeries {
    pub fn new(simulation: usize, node_count: usize, n_iterations: usize) -> Self {
        Self {
            simulation,
            columns: vec![Vec::with_capacity(n_iterations); node_count],
        }
    }

    /// Appends one iteration's value for every node.
    pub fn record(&mut self, values: &[f64]) {
        for (column, &value) in self.columns.iter_mut().zip(values) {
            column.push(value);
        }
    }

    pub fn column(&self, id: NodeId) -> &[f64] {
        self.columns.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn n_iterations(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// Recorded series keyed by name, then by simulation index.
///
/// Simulations that aborted have no entry; every other simulation has exactly
/// `n_iterations` values per name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SimulationResults {
    series: BTreeMap<String, BTreeMap<usize, Vec<f64>>>,
}

impl SimulationResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files one finished run under the node names of `registry`.
    pub fn insert(&mut self, registry: &Registry, run: SimulationSeries) {
        let simulation = run.simulation;
        for (meta, column) in registry.meta.iter().zip(run.columns) {
            self.series.entry(meta.name.clone()).or_default().insert(simulation, column);
        }
    }

    pub fn get(&self, name: &str) -> Option<&BTreeMap<usize, Vec<f64>>> {
        self.series.get(name)
    }

    /// The series of `name` in `simulation`.
    pub fn series(&self, name: &str, simulation: usize) -> Option<&[f64]> {
        self.series.get(name)?.get(&simulation).map(Vec::as_slice)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Number of simulations that completed.
    pub fn n_simulations(&self) -> usize {
        self.series.values().next().map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Index<&str> for SimulationResults {
    type Output = BTreeMap<usize, Vec<f64>>;

    /// Panics when `name` was never recorded, like `HashMap`'s `Index`.
    fn index(&self, name: &str) -> &Self::Output {
        match self.series.get(name) {
            Some(series) => series,
            None => panic!("no recorded series named '{}'", name),
        }
    }
}

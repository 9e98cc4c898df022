//! Python bindings for `Model`, compiled with the `python` feature.

use crate::config::{ParameterSet, SimulationConfig};
use crate::error::ModelError;
use crate::model::{Model, Phase};
use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::prelude::*;
use std::collections::{BTreeMap, HashMap};

fn to_py_err(e: ModelError) -> PyErr {
    match e {
        ModelError::UnknownParameter { .. } => PyKeyError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

#[pyclass(name = "Model")]
#[derive(Debug, Clone)]
pub struct PyModel {
    inner: Model,
}

#[pymethods]
impl PyModel {
    #[new]
    pub fn new(equations: &str, parameters: HashMap<String, f64>) -> PyResult<Self> {
        let params: ParameterSet = parameters.into_iter().collect();
        let inner = Model::load(equations, &params).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[staticmethod]
    pub fn from_files(equations_path: &str, parameters_path: &str) -> PyResult<Self> {
        let inner = Model::from_files(equations_path, parameters_path).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Returns the seed used and a list of `(simulation, iteration, variable, message)` failures.
    #[pyo3(signature = (n_simulations, n_iterations, seed=None, parallel=false))]
    pub fn run(
        &mut self,
        n_simulations: usize,
        n_iterations: usize,
        seed: Option<u64>,
        parallel: bool,
    ) -> (u64, Vec<(usize, usize, String, String)>) {
        let config = SimulationConfig { n_simulations, n_iterations, seed };
        let report = if parallel {
            self.inner.run_parallel(&config)
        } else {
            self.inner.run(&config)
        };
        let failures = report
            .failures
            .into_iter()
            .map(|f| (f.simulation, f.iteration, f.variable, f.error.to_string()))
            .collect();
        (report.seed, failures)
    }

    /// `{name: {simulation: [value per iteration]}}`
    pub fn results(&self) -> BTreeMap<String, BTreeMap<usize, Vec<f64>>> {
        let results = self.inner.results();
        results
            .variable_names()
            .filter_map(|name| results.get(name).map(|runs| (name.to_string(), runs.clone())))
            .collect()
    }

    pub fn set_parameter(&mut self, name: &str, value: f64) -> PyResult<()> {
        self.inner.set_parameter(name, value).map_err(to_py_err)
    }

    pub fn end_of_chain(&self) -> Vec<String> {
        self.inner.end_of_chain().into_iter().map(String::from).collect()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.inner.parameter_names().into_iter().map(String::from).collect()
    }

    pub fn phase(&self) -> &'static str {
        match self.inner.phase() {
            Phase::Loaded => "loaded",
            Phase::Done => "done",
        }
    }

    pub fn trace(&self, name: &str) -> PyResult<String> {
        self.inner
            .trace(name)
            .ok_or_else(|| PyKeyError::new_err(format!("'{}' is not part of the model", name)))
    }

    pub fn to_dot(&self) -> String {
        self.inner.to_dot()
    }
}

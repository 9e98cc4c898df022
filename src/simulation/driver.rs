//! Runs a resolved model for N independent simulations of M iterations each.
//!
//! Within a simulation the iteration loop is:
//! 1. advance every lag chain (load seeds on iteration 0, shift afterwards),
//! 2. evaluate every variable once, dependencies first,
//! 3. record the value of every node.
//!
//! Each simulation draws from its own ChaCha stream, so the results of
//! simulation `s` depend only on the base seed and `s`.

use crate::analysis::resolver::ResolvedGraph;
use crate::compute::{ComputationError, Engine, Ledger};
use crate::config::SimulationConfig;
use crate::error::ModelError;
use crate::simulation::results::{SimulationResults, SimulationSeries};
use crate::store::Registry;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace, warn};

/// A simulation that stopped early. Its partial series are discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationFailure {
    pub simulation: usize,
    pub iteration: usize,
    pub variable: String,
    pub error: ComputationError,
}

impl From<SimulationFailure> for ModelError {
    fn from(f: SimulationFailure) -> Self {
        ModelError::Arithmetic {
            variable: f.variable,
            simulation: f.simulation,
            iteration: f.iteration,
            source: f.error,
        }
    }
}

/// Outcome of one call to `run`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Base seed actually used, so an entropy-seeded run can be replayed.
    pub seed: u64,
    pub completed: Vec<usize>,
    pub failures: Vec<SimulationFailure>,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The state of a simulation right after an iteration was evaluated.
pub struct IterationView<'a> {
    registry: &'a Registry,
    ledger: &'a Ledger,
}

impl<'a> IterationView<'a> {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.registry.lookup(name).map(|id| self.ledger.get(id))
    }

    pub fn ledger(&self) -> &Ledger {
        self.ledger
    }
}

/// Hooks called by the driver. Both default to doing nothing.
pub trait SimulationObserver {
    fn on_iteration(&mut self, _simulation: usize, _iteration: usize, _view: &IterationView<'_>) {}

    /// Called once per completed simulation, before its series are filed.
    fn on_simulation_end(&mut self, _simulation: usize, _series: &SimulationSeries) {}
}

/// Observer that ignores every event.
pub struct Silent;

impl SimulationObserver for Silent {}

pub struct Simulator<'a> {
    graph: &'a ResolvedGraph,
    engine: Engine<'a>,
}

impl<'a> Simulator<'a> {
    pub fn new(graph: &'a ResolvedGraph) -> Self {
        let engine = Engine::new(&graph.registry, &graph.program, &graph.lag_heads);
        Self { graph, engine }
    }

    /// Runs every simulation in order on the calling thread.
    #[instrument(skip_all, name = "run", fields(n_simulations = config.n_simulations, n_iterations = config.n_iterations))]
    pub fn run<O: SimulationObserver + ?Sized>(
        &self,
        config: &SimulationConfig,
        observer: &mut O,
    ) -> (RunReport, SimulationResults) {
        let seed = effective_seed(config);
        let outcomes = (0..config.n_simulations)
            .map(|s| self.simulate(seed, s, config.n_iterations, observer))
            .collect();
        self.gather(seed, outcomes, observer)
    }

    /// Runs simulations on the rayon pool. Same seed, same results as `run`.
    #[instrument(skip_all, name = "run_parallel", fields(n_simulations = config.n_simulations, n_iterations = config.n_iterations))]
    pub fn run_parallel(&self, config: &SimulationConfig) -> (RunReport, SimulationResults) {
        let seed = effective_seed(config);
        let outcomes = (0..config.n_simulations)
            .into_par_iter()
            .map(|s| self.simulate(seed, s, config.n_iterations, &mut Silent))
            .collect();
        self.gather(seed, outcomes, &mut Silent)
    }

    fn gather<O: SimulationObserver + ?Sized>(
        &self,
        seed: u64,
        outcomes: Vec<Result<SimulationSeries, SimulationFailure>>,
        observer: &mut O,
    ) -> (RunReport, SimulationResults) {
        let mut report = RunReport { seed, completed: Vec::new(), failures: Vec::new() };
        let mut results = SimulationResults::new();

        for outcome in outcomes {
            match outcome {
                Ok(series) => {
                    observer.on_simulation_end(series.simulation, &series);
                    report.completed.push(series.simulation);
                    results.insert(&self.graph.registry, series);
                }
                Err(failure) => {
                    let error = ModelError::from(failure.clone());
                    warn!(%error, "simulation aborted");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            seed,
            completed = report.completed.len(),
            failed = report.failures.len(),
            "run finished"
        );
        (report, results)
    }

    /// One full simulation. Stops at the first arithmetic error.
    fn simulate<O: SimulationObserver + ?Sized>(
        &self,
        seed: u64,
        simulation: usize,
        n_iterations: usize,
        observer: &mut O,
    ) -> Result<SimulationSeries, SimulationFailure> {
        debug!(simulation, "simulation starting");
        let registry = &self.graph.registry;
        let mut rng = stream(seed, simulation);
        let mut ledger = self.engine.fresh_ledger();
        let mut series = SimulationSeries::new(simulation, registry.count(), n_iterations);

        for iteration in 0..n_iterations {
            self.engine.advance_lags(&mut ledger, iteration);
            self.engine
                .evaluate(&mut ledger, &mut rng)
                .map_err(|failure| SimulationFailure {
                    simulation,
                    iteration,
                    variable: registry.name(failure.node).to_string(),
                    error: failure.source,
                })?;
            trace!(simulation, iteration, "iteration evaluated");

            series.record(ledger.values());
            observer.on_iteration(simulation, iteration, &IterationView { registry, ledger: &ledger });
        }

        debug!(simulation, "simulation finished");
        Ok(series)
    }
}

fn effective_seed(config: &SimulationConfig) -> u64 {
    match config.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random();
            info!(seed, "no seed configured, drew one from entropy");
            seed
        }
    }
}

/// The random stream of simulation `simulation` under base seed `seed`.
pub fn stream(seed: u64, simulation: usize) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(simulation as u64);
    rng
}

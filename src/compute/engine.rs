//! A synchronous, single-threaded computation engine.
use crate::compute::kernel;
use crate::compute::ledger::{Ledger, NodeFailure};
use crate::compute::program::Program;
use crate::store::{NodeId, NodeKind, Registry};
use rand::Rng;

pub struct Engine<'a> {
    registry: &'a Registry,
    program: &'a Program,
    lag_heads: &'a [NodeId],
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry, program: &'a Program, lag_heads: &'a [NodeId]) -> Self {
        Self { registry, program, lag_heads }
    }

    /// A fresh ledger for the start of a simulation run.
    pub fn fresh_ledger(&self) -> Ledger {
        Ledger::from_values(self.registry.initial_values())
    }

    /// Iteration 0 loads every link from its seed; later iterations shift each chain by one.
    pub fn advance_lags(&self, ledger: &mut Ledger, iteration: usize) {
        if iteration == 0 {
            self.reset_lags(ledger);
        } else {
            self.shift_lags(ledger);
        }
    }

    /// Sets every lag link to its own seed parameter's value.
    pub fn reset_lags(&self, ledger: &mut Ledger) {
        for &head in self.lag_heads {
            let mut cursor = Some(head);
            while let Some(link) = cursor {
                match self.registry.kind(link) {
                    NodeKind::Lagged { seed, next, .. } => {
                        ledger.insert(link, ledger.get(*seed));
                        cursor = *next;
                    }
                    _ => break,
                }
            }
        }
    }

    /// Delay-line update, head to tail: the base variable's live value enters
    /// the head, every held value moves one link toward the tail, the tail's
    /// old value is dropped.
    pub fn shift_lags(&self, ledger: &mut Ledger) {
        for &head in self.lag_heads {
            let mut incoming = match self.registry.kind(head) {
                NodeKind::Lagged { base, .. } => ledger.get(*base),
                _ => continue,
            };
            let mut cursor = Some(head);
            while let Some(link) = cursor {
                let outgoing = ledger.get(link);
                ledger.insert(link, incoming);
                incoming = outgoing;
                cursor = match self.registry.kind(link) {
                    NodeKind::Lagged { next, .. } => *next,
                    _ => None,
                };
            }
        }
    }

    /// Recomputes every variable once, parents before consumers.
    pub fn evaluate<R: Rng + ?Sized>(&self, ledger: &mut Ledger, rng: &mut R) -> Result<(), NodeFailure> {
        for step in &self.program.steps {
            let value = kernel::evaluate(&step.code, ledger, rng)
                .and_then(|v| kernel::finite(v, || self.registry.name(step.target).to_string()))
                .map_err(|source| NodeFailure { node: step.target, source })?;
            ledger.insert(step.target, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::ledger::ComputationError;
    use crate::compute::program::{Code, Step};
    use crate::grammar::{BinaryOp, Expr};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// V with a three-link chain seeded 10, 20, 30.
    fn chain_fixture() -> (Registry, NodeId, Vec<NodeId>) {
        let mut reg = Registry::new();
        let v = reg.add_variable("V", Expr::Number(0.0), &[], 1);
        let mut links = Vec::new();
        let mut prev = v;
        for (k, seed_val) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
            let seed = reg.add_parameter(&format!("V_t_minus_{}", k), seed_val);
            let link = reg.add_lagged(v, k, seed, prev);
            if let Some(&last) = links.last() {
                reg.link_next(last, link);
            }
            links.push(link);
            prev = link;
        }
        (reg, v, links)
    }

    #[test]
    fn test_reset_loads_seeds() {
        let (reg, _, links) = chain_fixture();
        let program = Program::default();
        let heads = [links[0]];
        let engine = Engine::new(&reg, &program, &heads);
        let mut ledger = engine.fresh_ledger();

        engine.advance_lags(&mut ledger, 0);
        let held: Vec<f64> = links.iter().map(|&l| ledger.get(l)).collect();
        assert_eq!(held, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_shift_register() {
        let (reg, v, links) = chain_fixture();
        let program = Program::default();
        let heads = [links[0]];
        let engine = Engine::new(&reg, &program, &heads);
        let mut ledger = engine.fresh_ledger();

        engine.advance_lags(&mut ledger, 0);
        for (iteration, live) in [(1, 1.0), (2, 2.0), (3, 3.0)] {
            // The value V held at the end of the previous iteration.
            ledger.insert(v, live);
            engine.advance_lags(&mut ledger, iteration);
        }
        let held: Vec<f64> = links.iter().map(|&l| ledger.get(l)).collect();
        assert_eq!(held, vec![3.0, 2.0, 1.0]);
    }

    #[test]
    fn test_failure_names_the_node() {
        let mut reg = Registry::new();
        let y = reg.add_variable("Y", Expr::Number(0.0), &[], 1);
        let program = Program {
            steps: vec![Step {
                target: y,
                code: Code::Binary(BinaryOp::Div, Box::new(Code::Const(1.0)), Box::new(Code::Const(0.0))),
            }],
        };
        let engine = Engine::new(&reg, &program, &[]);
        let mut ledger = engine.fresh_ledger();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let err = engine.evaluate(&mut ledger, &mut rng).unwrap_err();
        assert_eq!(err, NodeFailure { node: y, source: ComputationError::DivisionByZero });
    }

    #[test]
    fn test_non_finite_read_fails_the_step() {
        let mut reg = Registry::new();
        let a = reg.add_parameter("A", f64::NAN);
        let y = reg.add_variable("Y", Expr::Name("A".into()), &[a], 1);
        let program = Program { steps: vec![Step { target: y, code: Code::Load(a) }] };
        let engine = Engine::new(&reg, &program, &[]);
        let mut ledger = engine.fresh_ledger();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let err = engine.evaluate(&mut ledger, &mut rng).unwrap_err();
        assert_eq!(err.node, y);
        assert!(matches!(err.source, ComputationError::NonFinite { ref expr } if expr == "Y"));
    }
}

use crate::grammar::{BinaryOp, Expr, Function, UnaryOp};
use crate::store::{NodeId, NodeKind, Registry};
use super::ledger::ComputationError;

/// An expression tree whose names have been bound to node ids.
#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    Const(f64),
    /// Current value of a parameter or variable.
    Load(NodeId),
    /// Held state of a lag link. A pure read; lag state only changes on shift.
    Lag(NodeId),
    Neg(Box<Code>),
    Binary(BinaryOp, Box<Code>, Box<Code>),
    Call(Function, Vec<Code>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub target: NodeId,
    pub code: Code,
}

/// Every variable of the model, bound and listed in dependency order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub steps: Vec<Step>,
}

pub struct Compiler<'a> {
    registry: &'a Registry,
}

impl<'a> Compiler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Binds each variable in `execution_order` (parents first) to a `Step`.
    /// Non-variable nodes in the order are skipped.
    pub fn compile(&self, execution_order: &[NodeId]) -> Result<Program, ComputationError> {
        let mut steps = Vec::with_capacity(execution_order.len());
        for &node in execution_order {
            if let Some(expr) = self.registry.equation(node) {
                steps.push(Step { target: node, code: self.bind(expr)? });
            }
        }
        Ok(Program { steps })
    }

    fn bind(&self, expr: &Expr) -> Result<Code, ComputationError> {
        Ok(match expr {
            Expr::Number(n) => Code::Const(*n),
            Expr::Name(name) => Code::Load(self.resolve_name(name)?),
            Expr::Lag { name, depth } => Code::Lag(self.resolve_lag(name, *depth)?),
            Expr::Unary(UnaryOp::Neg, inner) => Code::Neg(Box::new(self.bind(inner)?)),
            Expr::Binary(op, lhs, rhs) => {
                Code::Binary(*op, Box::new(self.bind(lhs)?), Box::new(self.bind(rhs)?))
            }
            Expr::Call(func, args) => {
                let bound = args.iter().map(|a| self.bind(a)).collect::<Result<_, _>>()?;
                Code::Call(*func, bound)
            }
        })
    }

    fn resolve_name(&self, name: &str) -> Result<NodeId, ComputationError> {
        let id = self.registry.lookup(name).ok_or_else(|| ComputationError::Mismatch {
            msg: format!("Name '{}' is not bound to any node", name),
        })?;
        match self.registry.kind(id) {
            NodeKind::Lagged { .. } => Err(ComputationError::Mismatch {
                msg: format!("Name '{}' refers to a lag link", name),
            }),
            _ => Ok(id),
        }
    }

    /// Walks `depth - 1` links from the head of `name`'s chain.
    fn resolve_lag(&self, name: &str, depth: u32) -> Result<NodeId, ComputationError> {
        let base = self.resolve_name(name)?;
        self.registry
            .lag_head(base)
            .and_then(|head| self.registry.lag_link(head, depth))
            .ok_or_else(|| ComputationError::Mismatch {
                msg: format!("Lag chain of '{}' is shorter than {}", name, depth),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_expr;

    #[test]
    fn test_binds_names_and_lag_links() {
        let mut reg = Registry::new();
        let a = reg.add_parameter("A", 1.0);
        let s1 = reg.add_parameter("Y_t_minus_1", 0.0);
        let s2 = reg.add_parameter("Y_t_minus_2", 0.0);
        let expr = parse_expr("A + LAG(Y, 2)").unwrap();
        let y = reg.add_variable("Y", expr, &[a], 1);
        let l1 = reg.add_lagged(y, 1, s1, y);
        let l2 = reg.add_lagged(y, 2, s2, l1);
        reg.link_next(l1, l2);

        let program = Compiler::new(&reg).compile(&[a, y]).unwrap();
        assert_eq!(program.steps.len(), 1);
        assert_eq!(
            program.steps[0],
            Step {
                target: y,
                code: Code::Binary(
                    BinaryOp::Add,
                    Box::new(Code::Load(a)),
                    Box::new(Code::Lag(l2))
                ),
            }
        );
    }

    #[test]
    fn test_unbound_name_is_a_mismatch() {
        let mut reg = Registry::new();
        let y = reg.add_variable("Y", parse_expr("B + 1").unwrap(), &[], 1);
        let err = Compiler::new(&reg).compile(&[y]).unwrap_err();
        assert!(err.to_string().contains("'B'"));
    }
}

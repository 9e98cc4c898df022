use crate::grammar::{BinaryOp, Function};
use super::ledger::{ComputationError, Ledger};
use super::program::Code;
use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal, Uniform};
use smallvec::SmallVec;

/// Evaluates a bound expression against the current ledger.
///
/// Loads read whatever the ledger holds; the caller orders evaluation so that
/// every loaded variable is already up to date for this iteration.
pub fn evaluate<R: Rng + ?Sized>(code: &Code, ledger: &Ledger, rng: &mut R) -> Result<f64, ComputationError> {
    match code {
        Code::Const(v) => Ok(*v),
        Code::Load(id) | Code::Lag(id) => Ok(ledger.get(*id)),
        Code::Neg(inner) => Ok(-evaluate(inner, ledger, rng)?),
        Code::Binary(op, lhs, rhs) => {
            let l = evaluate(lhs, ledger, rng)?;
            let r = evaluate(rhs, ledger, rng)?;
            apply_binary(*op, l, r)
        }
        Code::Call(func, args) => {
            let mut values: SmallVec<[f64; 2]> = SmallVec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, ledger, rng)?);
            }
            apply_function(*func, &values, rng)
        }
    }
}

#[inline(always)]
pub fn apply_binary(op: BinaryOp, l: f64, r: f64) -> Result<f64, ComputationError> {
    let result = match op {
        BinaryOp::Add => l + r,
        BinaryOp::Sub => l - r,
        BinaryOp::Mul => l * r,
        BinaryOp::Div => {
            if r == 0.0 {
                return Err(ComputationError::DivisionByZero);
            }
            l / r
        }
        BinaryOp::Pow => l.powf(r),
    };
    finite(result, || format!("{} {} {}", l, op.symbol(), r))
}

pub fn apply_function<R: Rng + ?Sized>(func: Function, args: &[f64], rng: &mut R) -> Result<f64, ComputationError> {
    if args.len() != func.arity() {
        return Err(ComputationError::Mismatch {
            msg: format!("{} takes {} argument(s), got {}", func.name(), func.arity(), args.len()),
        });
    }
    let domain = |message: String| ComputationError::Domain { function: func.name().to_string(), message };

    let result = match func {
        Function::Normal => {
            check_sigma(func, args[1])?;
            Normal::new(args[0], args[1])
                .map_err(|e| domain(format!("N({}, {}): {}", args[0], args[1], e)))?
                .sample(rng)
        }
        Function::LogNormal => {
            check_sigma(func, args[1])?;
            LogNormal::new(args[0], args[1])
                .map_err(|e| domain(format!("LN({}, {}): {}", args[0], args[1], e)))?
                .sample(rng)
        }
        Function::Uniform => {
            let (low, high) = (args[0], args[1]);
            if !(low.is_finite() && high.is_finite() && low <= high && (high - low).is_finite()) {
                return Err(domain(format!("U({}, {}): empty or unbounded range", low, high)));
            }
            if low == high { low } else { Uniform::new(low, high).sample(rng) }
        }
        Function::Exp => args[0].exp(),
        Function::Log => {
            if args[0] <= 0.0 {
                return Err(domain(format!("log({}) is undefined", args[0])));
            }
            args[0].ln()
        }
        Function::Sqrt => {
            if args[0] < 0.0 {
                return Err(domain(format!("sqrt({}) is undefined", args[0])));
            }
            args[0].sqrt()
        }
        Function::Abs => args[0].abs(),
    };
    finite(result, || format!("{}({:?})", func.name(), args))
}

fn check_sigma(func: Function, sigma: f64) -> Result<(), ComputationError> {
    if sigma.is_finite() && sigma >= 0.0 {
        Ok(())
    } else {
        Err(ComputationError::Domain {
            function: func.name().to_string(),
            message: format!("standard deviation must be finite and non-negative, got {}", sigma),
        })
    }
}

#[inline(always)]
pub(crate) fn finite(value: f64, describe: impl FnOnce() -> String) -> Result<f64, ComputationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ComputationError::NonFinite { expr: describe() })
    }
}

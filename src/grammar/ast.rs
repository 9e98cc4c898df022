//! Expression trees for the right-hand side of an equation.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

/// The closed set of callable built-ins, excluding `LAG` which has its own node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `N(mu, sigma)`: a normal draw.
    Normal,
    /// `LN(mu, sigma)`: a log-normal draw.
    LogNormal,
    /// `U(low, high)`: a uniform draw on `[low, high)`.
    Uniform,
    Exp,
    Log,
    Sqrt,
    Abs,
}

impl Function {
    /// Looks up a call name as written in equation text.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "N" => Some(Function::Normal),
            "LN" => Some(Function::LogNormal),
            "U" => Some(Function::Uniform),
            "exp" => Some(Function::Exp),
            "log" => Some(Function::Log),
            "sqrt" => Some(Function::Sqrt),
            "abs" => Some(Function::Abs),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Normal => "N",
            Function::LogNormal => "LN",
            Function::Uniform => "U",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Normal | Function::LogNormal | Function::Uniform => 2,
            Function::Exp | Function::Log | Function::Sqrt | Function::Abs => 1,
        }
    }
}

/// Reserved call name for the lag operator.
pub const LAG: &str = "LAG";

/// An immutable expression tree, built once per parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Name(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
    /// `LAG(name, depth)`: the value `name` held `depth` iterations ago.
    Lag { name: String, depth: u32 },
}

impl Expr {
    /// Names read as current values, in first-appearance order, without duplicates.
    /// Lagged names are delay edges and are reported by [`Expr::lags`] instead.
    pub fn references(&self) -> Vec<String> {
        let mut acc = Vec::new();
        self.collect_references(&mut acc);
        acc
    }

    fn collect_references(&self, acc: &mut Vec<String>) {
        match self {
            Expr::Number(_) | Expr::Lag { .. } => {}
            Expr::Name(name) => {
                if !acc.contains(name) {
                    acc.push(name.clone());
                }
            }
            Expr::Unary(_, inner) => inner.collect_references(acc),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_references(acc);
                rhs.collect_references(acc);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_references(acc);
                }
            }
        }
    }

    /// Every `LAG(name, depth)` in the tree, in order of appearance.
    pub fn lags(&self) -> Vec<(String, u32)> {
        let mut acc = Vec::new();
        self.collect_lags(&mut acc);
        acc
    }

    fn collect_lags(&self, acc: &mut Vec<(String, u32)>) {
        match self {
            Expr::Number(_) | Expr::Name(_) => {}
            Expr::Lag { name, depth } => acc.push((name.clone(), *depth)),
            Expr::Unary(_, inner) => inner.collect_lags(acc),
            Expr::Binary(_, lhs, rhs) => {
                lhs.collect_lags(acc);
                rhs.collect_lags(acc);
            }
            Expr::Call(_, args) => {
                for arg in args {
                    arg.collect_lags(acc);
                }
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Name(name) => write!(f, "{}", name),
            Expr::Unary(UnaryOp::Neg, inner) => write!(f, "-{}", inner),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Call(func, args) => {
                write!(f, "{}(", func.name())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Lag { name, depth } => write!(f, "{}({}, {})", LAG, name, depth),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Box<Expr> {
        Box::new(Expr::Name(s.into()))
    }

    #[test]
    fn test_references_skip_lags_and_duplicates() {
        // Y = A * A + LAG(Y, 2) + N(mu, sigma)
        let expr = Expr::Binary(
            BinaryOp::Add,
            Box::new(Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Binary(BinaryOp::Mul, name("A"), name("A"))),
                Box::new(Expr::Lag { name: "Y".into(), depth: 2 }),
            )),
            Box::new(Expr::Call(
                Function::Normal,
                vec![Expr::Name("mu".into()), Expr::Name("sigma".into())],
            )),
        );
        assert_eq!(expr.references(), vec!["A", "mu", "sigma"]);
        assert_eq!(expr.lags(), vec![("Y".to_string(), 2)]);
    }

    #[test]
    fn test_function_table_is_consistent() {
        for f in [
            Function::Normal,
            Function::LogNormal,
            Function::Uniform,
            Function::Exp,
            Function::Log,
            Function::Sqrt,
            Function::Abs,
        ] {
            assert_eq!(Function::from_name(f.name()), Some(f));
        }
        assert_eq!(Function::from_name(LAG), None);
    }
}

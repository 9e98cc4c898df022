//! Tokenizes and parses equation text into expression trees.
pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod session;

pub use ast::{BinaryOp, Expr, Function, UnaryOp};
pub use error::ParseError;
pub use parser::{parse_expr, parse_statement, Statement};
pub use session::EquationSet;

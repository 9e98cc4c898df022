//! Hand-written recursive descent parser for equation statements.
//!
//! Precedence, lowest to highest:
//!
//! | level | operators | associativity |
//! |-------|-----------|---------------|
//! | 1 | `+ -` | left |
//! | 2 | `* /` | left |
//! | 3 | `**` | right |
//! | 4 | unary `-` | prefix |
//! | 5 | literals, names, calls, parentheses | |

use super::ast::{BinaryOp, Expr, Function, UnaryOp, LAG};
use super::error::ParseError;
use super::lexer::{lex, Spanned, Token};

/// One parsed `NAME = expr` line.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub name: String,
    pub expr: Expr,
    /// Names whose current value the expression reads.
    pub dependencies: Vec<String>,
    /// `(name, depth)` for every lag read in the expression.
    pub lags: Vec<(String, u32)>,
    pub line: usize,
}

/// Parses a single statement. `line` is the 1-based line number used in errors.
pub fn parse_statement(source: &str, line: usize) -> Result<Statement, ParseError> {
    let tokens = lex(source, line)?;
    let mut parser = Parser::new(&tokens, line);

    let name = parser.expect_ident("a variable name")?;
    parser.expect(&Token::Equals, "'='")?;
    let expr = parser.parse_expr()?;
    parser.expect_end()?;

    let dependencies = expr.references();
    let lags = expr.lags();
    Ok(Statement { name, expr, dependencies, lags, line })
}

/// Parses a bare expression, for tests and tooling.
pub fn parse_expr(source: &str) -> Result<Expr, ParseError> {
    let tokens = lex(source, 1)?;
    let mut parser = Parser::new(&tokens, 1);
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser<'a, 'src> {
    tokens: &'a [Spanned<'src>],
    pos: usize,
    line: usize,
}

impl<'a, 'src> Parser<'a, 'src> {
    fn new(tokens: &'a [Spanned<'src>], line: usize) -> Self {
        Parser { tokens, pos: 0, line }
    }

    fn peek(&self) -> Option<&'a Spanned<'src>> {
        self.tokens.get(self.pos)
    }

    fn peek_token(&self) -> Option<&'a Token<'src>> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&'a Spanned<'src>> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token<'_>) -> bool {
        if self.peek_token() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Builds the error for whatever sits at the cursor.
    fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(s) => ParseError::UnexpectedToken {
                line: self.line,
                column: s.span.start + 1,
                found: s.token.to_string(),
                expected: expected.to_string(),
            },
            None => ParseError::UnexpectedEnd {
                line: self.line,
                expected: expected.to_string(),
            },
        }
    }

    fn expect(&mut self, token: &Token<'_>, what: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, ParseError> {
        match self.peek_token() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(name.to_string())
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.pos < self.tokens.len() {
            Err(self.unexpected("an operator or end of statement"))
        } else {
            Ok(())
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_add_sub()
    }

    /// Level 1: `+ -` (left-assoc)
    fn parse_add_sub(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_mul_div()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_mul_div()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Level 2: `* /` (left-assoc)
    fn parse_mul_div(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_power()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Level 3: `**` (right-assoc)
    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_unary()?;
        if self.eat(&Token::Pow) {
            let exponent = self.parse_power()?;
            Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)))
        } else {
            Ok(base)
        }
    }

    /// Level 4: unary minus, binding tighter than `**`.
    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Minus) {
            let inner = self.parse_unary()?;
            Ok(Expr::Unary(UnaryOp::Neg, Box::new(inner)))
        } else {
            self.parse_atom()
        }
    }

    /// Level 5: literals, names, calls and groups.
    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        match self.peek_token() {
            Some(Token::Integer(digits)) => {
                let value = digits.parse::<f64>().map_err(|_| self.unexpected("a number"))?;
                self.pos += 1;
                Ok(Expr::Number(value))
            }
            Some(Token::Float(x)) => {
                self.pos += 1;
                Ok(Expr::Number(*x))
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                if self.eat(&Token::LParen) {
                    self.parse_call(name)
                } else {
                    Ok(Expr::Name(name.to_string()))
                }
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a number, a name or '('")),
        }
    }

    /// Parses the argument list of `name(`; the opening parenthesis is already consumed.
    fn parse_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        if name == LAG {
            return self.parse_lag();
        }
        let func = Function::from_name(name).ok_or_else(|| ParseError::UnknownFunction {
            line: self.line,
            name: name.to_string(),
        })?;

        let mut args: Vec<Expr> = Vec::with_capacity(func.arity());
        if !self.eat(&Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.eat(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen, "',' or ')'")?;
                break;
            }
        }

        if args.len() != func.arity() {
            return Err(ParseError::ArityMismatch {
                line: self.line,
                name: name.to_string(),
                expected: func.arity(),
                actual: args.len(),
            });
        }
        Ok(Expr::Call(func, args))
    }

    /// `LAG(NAME, INTEGER)` with the integer at least 1.
    fn parse_lag(&mut self) -> Result<Expr, ParseError> {
        let name = match self.peek_token() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                name.to_string()
            }
            Some(_) => {
                return Err(ParseError::InvalidLag {
                    line: self.line,
                    message: "the first argument must be a variable name".into(),
                })
            }
            None => return Err(self.unexpected("a variable name")),
        };
        self.expect(&Token::Comma, "','")?;

        let depth = match self.peek_token() {
            Some(Token::Integer(digits)) => match digits.parse::<u32>() {
                Ok(k) if k >= 1 => {
                    self.pos += 1;
                    k
                }
                _ => {
                    return Err(ParseError::InvalidLag {
                        line: self.line,
                        message: format!("depth must be an integer from 1 to {}, got {}", u32::MAX, digits),
                    })
                }
            },
            Some(Token::Float(_)) | Some(Token::Minus) => {
                return Err(ParseError::InvalidLag {
                    line: self.line,
                    message: "depth must be a positive integer literal".into(),
                })
            }
            _ => return Err(self.unexpected("an integer lag depth")),
        };
        self.expect(&Token::RParen, "')'")?;
        Ok(Expr::Lag { name, depth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn num(x: f64) -> Box<Expr> {
        Box::new(Expr::Number(x))
    }

    #[test]
    fn test_statement_collects_dependencies() {
        let stmt = parse_statement("Y = A*x + B", 3).unwrap();
        assert_eq!(stmt.name, "Y");
        assert_eq!(stmt.dependencies, vec!["A", "x", "B"]);
        assert!(stmt.lags.is_empty());
        assert_eq!(stmt.line, 3);
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let expr = parse_expr("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                num(1.0),
                Box::new(Expr::Binary(BinaryOp::Mul, num(2.0), num(3.0)))
            )
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_expr("2 ** 3 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Pow,
                num(2.0),
                Box::new(Expr::Binary(BinaryOp::Pow, num(3.0), num(2.0)))
            )
        );
    }

    #[test]
    fn test_unary_minus_binds_tighter_than_power() {
        let expr = parse_expr("-2 ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Pow,
                Box::new(Expr::Unary(UnaryOp::Neg, num(2.0))),
                num(2.0)
            )
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        let expr = parse_expr("8 - 4 - 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Sub,
                Box::new(Expr::Binary(BinaryOp::Sub, num(8.0), num(4.0))),
                num(2.0)
            )
        );
    }

    #[rstest]
    #[case("42", 42.0)]
    #[case("4294967296", 4294967296.0)]
    #[case("18446744073709551616", 18446744073709551616.0)]
    #[case("007", 7.0)]
    fn test_integer_literals(#[case] source: &str, #[case] expected: f64) {
        assert_eq!(parse_expr(source).unwrap(), Expr::Number(expected));
    }

    #[test]
    fn test_lag_and_distribution_calls() {
        let stmt = parse_statement("Y = 0.5 * LAG(Y, 2) + N(mu, sigma)", 1).unwrap();
        assert_eq!(stmt.dependencies, vec!["mu", "sigma"]);
        assert_eq!(stmt.lags, vec![("Y".to_string(), 2)]);
    }

    #[rstest]
    #[case("Y = ", 1)]
    #[case("Y = (A + B", 1)]
    #[case("Y = A +", 1)]
    #[case("= A", 1)]
    #[case("Y A", 1)]
    #[case("Y = A B", 1)]
    #[case("Y = N(mu sigma)", 1)]
    fn test_syntax_errors(#[case] source: &str, #[case] line: usize) {
        let err = parse_statement(source, line).unwrap_err();
        assert!(err.is_syntax(), "expected a syntax error, got {:?}", err);
        assert_eq!(err.line(), line);
    }

    #[test]
    fn test_unexpected_end_is_reported() {
        let err = parse_statement("Y = (A + B", 4).unwrap_err();
        assert_eq!(err, ParseError::UnexpectedEnd { line: 4, expected: "')'".into() });
    }

    #[test]
    fn test_unexpected_token_names_the_token() {
        let err = parse_statement("Y = A B", 2).unwrap_err();
        match err {
            ParseError::UnexpectedToken { line, column, found, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 7);
                assert_eq!(found, "B");
            }
            other => panic!("Wrong error type: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_function() {
        let err = parse_statement("Y = gamma(1, 2)", 5).unwrap_err();
        assert_eq!(err, ParseError::UnknownFunction { line: 5, name: "gamma".into() });
    }

    #[rstest]
    #[case("Y = N(1)", "N", 2, 1)]
    #[case("Y = exp(1, 2)", "exp", 1, 2)]
    #[case("Y = U()", "U", 2, 0)]
    fn test_arity_mismatch(
        #[case] source: &str,
        #[case] name: &str,
        #[case] expected: usize,
        #[case] actual: usize,
    ) {
        let err = parse_statement(source, 1).unwrap_err();
        assert_eq!(
            err,
            ParseError::ArityMismatch { line: 1, name: name.into(), expected, actual }
        );
    }

    #[rstest]
    #[case("Y = LAG(Y, 0)")]
    #[case("Y = LAG(Y, 1.5)")]
    #[case("Y = LAG(Y, -1)")]
    #[case("Y = LAG(2, 1)")]
    #[case("Y = LAG(Y, 4294967296)")]
    #[case("Y = LAG(Y, 18446744073709551616)")]
    fn test_invalid_lag(#[case] source: &str) {
        let err = parse_statement(source, 1).unwrap_err();
        assert!(matches!(err, ParseError::InvalidLag { line: 1, .. }), "got {:?}", err);
    }
}

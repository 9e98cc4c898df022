//! Tokenizer for a single equation statement.

use super::error::ParseError;
use logos::Logos;
use std::fmt;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\f]+")]
pub enum Token<'src> {
    #[token("**")]
    Pow,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("=")]
    Equals,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,

    /// Digits only. Read as a number or as a LAG depth by the parser.
    #[regex(r"[0-9]+", |lex| lex.slice())]
    Integer(&'src str),

    #[regex(r"[0-9]*\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Ident(&'src str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Pow => write!(f, "**"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Equals => write!(f, "="),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Comma => write!(f, ","),
            Token::Integer(digits) => write!(f, "{}", digits),
            Token::Float(x) => write!(f, "{}", x),
            Token::Ident(s) => write!(f, "{}", s),
        }
    }
}

/// A token together with its byte range inside the statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<'src> {
    pub token: Token<'src>,
    pub span: Range<usize>,
}

/// Tokenizes one statement. `line` is only used for error reporting.
pub fn lex(source: &str, line: usize) -> Result<Vec<Spanned<'_>>, ParseError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push(Spanned { token, span: lexer.span() }),
            Err(()) => {
                return Err(ParseError::InvalidCharacter {
                    line,
                    column: lexer.span().start + 1,
                    text: lexer.slice().to_string(),
                });
            }
        }
    }

    Ok(tokens)
}

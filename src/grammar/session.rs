//! Accumulates parsed statements across the lines of one model.
//!
//! Statements may reference names declared earlier or later, so the tables
//! here only become meaningful once the whole model text has been read.

use super::ast::Expr;
use super::error::ParseError;
use super::parser::{parse_statement, Statement};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquationSet {
    /// Statements in declaration order.
    equations: Vec<Statement>,
    index: HashMap<String, usize>,
    /// Every referenced name (value or lag) in first-appearance order.
    referenced: Vec<String>,
    /// Maximum lag depth requested for each lagged name.
    lag_depths: BTreeMap<String, u32>,
}

impl EquationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole model: one statement per line, `#` comments, blank lines ignored.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let mut set = Self::new();
        for (i, raw) in source.lines().enumerate() {
            set.parse_line(raw, i + 1)?;
        }
        Ok(set)
    }

    /// Parses one line into the session. Blank and comment-only lines are accepted and ignored.
    pub fn parse_line(&mut self, raw: &str, line: usize) -> Result<(), ParseError> {
        let text = raw.split('#').next().unwrap_or("");
        if text.trim().is_empty() {
            return Ok(());
        }
        let stmt = parse_statement(text, line)?;
        self.insert(stmt)
    }

    fn insert(&mut self, stmt: Statement) -> Result<(), ParseError> {
        if let Some(&existing) = self.index.get(&stmt.name) {
            return Err(ParseError::Redefinition {
                line: stmt.line,
                name: stmt.name,
                first_line: self.equations[existing].line,
            });
        }

        for dep in &stmt.dependencies {
            self.note_reference(dep);
        }
        for (name, depth) in &stmt.lags {
            self.note_reference(name);
            let entry = self.lag_depths.entry(name.clone()).or_insert(0);
            *entry = (*entry).max(*depth);
        }

        trace!(line = stmt.line, name = %stmt.name, deps = ?stmt.dependencies, "parsed equation");
        self.index.insert(stmt.name.clone(), self.equations.len());
        self.equations.push(stmt);
        Ok(())
    }

    fn note_reference(&mut self, name: &str) {
        if !self.referenced.iter().any(|r| r == name) {
            self.referenced.push(name.to_string());
        }
    }

    pub fn equations(&self) -> &[Statement] {
        &self.equations
    }

    pub fn get(&self, name: &str) -> Option<&Statement> {
        self.index.get(name).map(|&i| &self.equations[i])
    }

    pub fn function_tree(&self, name: &str) -> Option<&Expr> {
        self.get(name).map(|s| &s.expr)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Referenced names that have no equation of their own, in first-appearance order.
    pub fn parameters(&self) -> Vec<String> {
        self.referenced
            .iter()
            .filter(|name| !self.index.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Variables no other variable reads as a current value, in declaration order.
    ///
    /// Lag reads do not count: a variable that is only ever lagged stays end-of-chain.
    pub fn end_of_chain(&self) -> Vec<String> {
        let consumed: HashSet<&str> = self
            .equations
            .iter()
            .flat_map(|s| s.dependencies.iter().map(String::as_str))
            .collect();
        self.equations
            .iter()
            .filter(|s| !consumed.contains(s.name.as_str()))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn lag_depths(&self) -> &BTreeMap<String, u32> {
        &self.lag_depths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_of_chain_and_parameters() {
        let set = EquationSet::parse("Y = A*x + B\nA = N(mu,sigma)\n").unwrap();
        assert_eq!(set.end_of_chain(), vec!["Y"]);
        assert_eq!(set.parameters(), vec!["x", "B", "mu", "sigma"]);
        assert!(set.is_defined("A"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_later_statement_removes_end_of_chain_status() {
        let set = EquationSet::parse("A = 1\nB = 2\nC = A + 1").unwrap();
        assert_eq!(set.end_of_chain(), vec!["B", "C"]);
    }

    #[test]
    fn test_lag_depth_keeps_maximum() {
        let set = EquationSet::parse("X = LAG(Y, 2) + LAG(Y, 1)\nZ = LAG(Y, 3)\nY = 1").unwrap();
        assert_eq!(set.lag_depths().get("Y"), Some(&3));
        assert_eq!(set.lag_depths().len(), 1);
    }

    #[test]
    fn test_lag_reads_do_not_consume_end_of_chain() {
        let set = EquationSet::parse("X = LAG(Y, 1)\nY = LAG(X, 1)").unwrap();
        assert_eq!(set.end_of_chain(), vec!["X", "Y"]);
        assert!(set.parameters().is_empty());
    }

    #[test]
    fn test_lag_only_name_without_equation_is_a_parameter() {
        let set = EquationSet::parse("X = LAG(P, 2)").unwrap();
        assert_eq!(set.parameters(), vec!["P"]);
    }

    #[test]
    fn test_comments_and_blank_lines_keep_line_numbers() {
        let src = "# a comment\n\nY = A + 1 # trailing\nZ = (";
        let err = EquationSet::parse(src).unwrap_err();
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn test_redefinition_is_rejected() {
        let err = EquationSet::parse("Y = 1\nY = 2").unwrap_err();
        assert_eq!(
            err,
            ParseError::Redefinition { line: 2, name: "Y".into(), first_line: 1 }
        );
    }
}

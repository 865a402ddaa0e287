use std::fmt;

use itertools::Itertools;
use num_bigint::BigInt;

pub type Identifier = String;
pub type RelationName = Identifier;
pub type VariableName = Identifier;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Constant {
    Integer(BigInt),
    String(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Integer(n) => write!(f, "{}", n),
            Constant::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    Variable(VariableName),
    Constant(Constant),
    Wildcard,
}

impl Term {
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match self {
            Term::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Variable(name) => f.write_str(name),
            Term::Constant(constant) => constant.fmt(f),
            Term::Wildcard => f.write_str("_"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Literal {
    pub predicate: RelationName,
    pub terms: Vec<Term>,
}

impl Literal {
    /// Returns the row of constants when every term is ground, or the first
    /// non-constant term otherwise.
    pub fn ground_row(&self) -> Result<Vec<Constant>, &Term> {
        self.terms
            .iter()
            .map(|term| term.as_constant().cloned().ok_or(term))
            .collect()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.predicate, self.terms.iter().join(", "))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clause {
    pub head: Literal,
    pub body: Vec<Literal>,
}

impl Clause {
    pub fn is_rule(&self) -> bool {
        !self.body.is_empty()
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.head.fmt(f)?;
        if self.is_rule() {
            write!(f, " :- {}", self.body.iter().join(", "))?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    Assertion(Clause),
    Retraction(Clause),
    Query(Literal),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatementKind {
    FactAssertion,
    RuleAssertion,
    Query,
    Unsupported,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Assertion(clause) if clause.is_rule() => StatementKind::RuleAssertion,
            Statement::Assertion(_) => StatementKind::FactAssertion,
            Statement::Query(_) => StatementKind::Query,
            Statement::Retraction(_) => StatementKind::Unsupported,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assertion(clause) => write!(f, "{}.", clause),
            Statement::Retraction(clause) => write!(f, "{}~", clause),
            Statement::Query(literal) => write!(f, "{}?", literal),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

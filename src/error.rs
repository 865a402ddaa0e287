use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::ast::{RelationName, VariableName};
use crate::parser::Rule;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to parse input: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),
    #[error("Failed to parse input: no program")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    Table,
    View,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::Table => f.write_str("table"),
            RelationKind::View => f.write_str("view"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("Referencing relation {0:?} which was not created previously")]
    UndefinedRelation(RelationName),
    #[error("Unsafe rule for view {view:?}: head variables {} are not bound in the body", .variables.iter().join(", "))]
    UnsafeRule {
        view: RelationName,
        variables: Vec<VariableName>,
    },
    #[error("View {view:?} redefined with columns ({}), expected ({})", .found.iter().join(", "), .expected.iter().join(", "))]
    ViewColumnMismatch {
        view: RelationName,
        expected: Vec<VariableName>,
        found: Vec<VariableName>,
    },
    #[error("Relation {relation:?} has {expected} columns, got {found}")]
    ArityMismatch {
        relation: RelationName,
        expected: usize,
        found: usize,
    },
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
    #[error("Cyclic dependency between views: {}", .cycle.iter().join(" -> "))]
    CyclicDependency { cycle: Vec<RelationName> },
    #[error("Relation {name:?} is already defined as a {existing}")]
    RelationKindConflict {
        name: RelationName,
        existing: RelationKind,
    },
    #[error("Fact for {relation:?} contains non-constant term {term}")]
    NonGroundFact { relation: RelationName, term: String },
    #[error("Head of view {view:?} contains non-variable term {term}")]
    NonVariableHead { view: RelationName, term: String },
}

use std::collections::HashSet;

use log::{debug, info};

use crate::ast::{Clause, Literal, Program, RelationName, Statement, StatementKind};
use crate::error::{RelationKind, TranslateError};
use crate::registry::{FactRegistration, Materialization, SchemaRegistry};
use crate::sql::{Constraints, Emitter, SqliteEmitter};

/// Owns the schema of one translation and turns statements into SQL.
///
/// A translator can be fed several programs in turn; relations registered by
/// earlier programs stay visible to later ones.
#[derive(Clone, Debug, Default)]
pub struct Translator<E = SqliteEmitter> {
    registry: SchemaRegistry,
    emitter: E,
}

impl Translator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<E: Emitter> Translator<E> {
    pub fn with_emitter(emitter: E) -> Self {
        Self {
            registry: SchemaRegistry::default(),
            emitter,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Translates every statement in order. The first error aborts the whole
    /// program, and the registry is restored to its state before the call.
    pub fn translate(&mut self, program: &Program) -> Result<Vec<String>, TranslateError> {
        let snapshot = self.registry.clone();
        let mut statements = vec![];
        for statement in &program.statements {
            match self.translate_statement(statement) {
                Ok(emitted) => statements.extend(emitted),
                Err(e) => {
                    self.registry = snapshot;
                    return Err(e);
                }
            }
        }
        Ok(statements)
    }

    pub fn translate_statement(
        &mut self,
        statement: &Statement,
    ) -> Result<Vec<String>, TranslateError> {
        let kind = statement.kind();
        debug!("{:?}: {}", kind, statement);

        match (kind, statement) {
            (StatementKind::FactAssertion, Statement::Assertion(clause)) => {
                self.register_fact(&clause.head)
            }

            (StatementKind::RuleAssertion, Statement::Assertion(clause)) => {
                self.register_rule(clause)?;
                Ok(vec![])
            }

            (StatementKind::Query, Statement::Query(literal)) => self.compile_query(literal),

            _ => Err(TranslateError::UnsupportedStatement(statement.to_string())),
        }
    }

    pub fn register_fact(&mut self, fact: &Literal) -> Result<Vec<String>, TranslateError> {
        let row = fact
            .ground_row()
            .map_err(|term| TranslateError::NonGroundFact {
                relation: fact.predicate.clone(),
                term: term.to_string(),
            })?;

        Ok(match self.registry.register_fact(&fact.predicate, &row)? {
            FactRegistration::Created => self.emitter.create_and_insert(&fact.predicate, &row),
            FactRegistration::Appended => self.emitter.insert(&fact.predicate, &row),
        })
    }

    /// Records a rule. Views are only emitted once a query needs them.
    pub fn register_rule(&mut self, rule: &Clause) -> Result<(), TranslateError> {
        self.registry.register_rule(rule)
    }

    /// Emits the view, preceded by every view it depends on that is not yet
    /// materialized or is out of date. A view that was emitted before is
    /// dropped first.
    pub fn materialize(&mut self, view: &str) -> Result<Vec<String>, TranslateError> {
        let order = self.plan(view, true)?;
        Ok(self.emit_views(order))
    }

    pub fn compile_query(&mut self, query: &Literal) -> Result<Vec<String>, TranslateError> {
        let name = query.predicate.as_str();
        let column_count = self
            .registry
            .column_count(name)
            .ok_or_else(|| TranslateError::UndefinedRelation(name.to_owned()))?;
        if query.terms.len() != column_count {
            return Err(TranslateError::ArityMismatch {
                relation: name.to_owned(),
                expected: column_count,
                found: query.terms.len(),
            });
        }

        let mut statements = match self.registry.kind_of(name) {
            Some(RelationKind::View) => {
                let order = self.plan(name, false)?;
                self.emit_views(order)
            }
            _ => vec![],
        };

        let constraints: Constraints = query
            .terms
            .iter()
            .enumerate()
            .filter_map(|(index, term)| Some((index, term.as_constant()?.clone())))
            .collect();

        statements.extend(
            self.emitter
                .select_with_constraints(name, column_count, &constraints),
        );
        Ok(statements)
    }

    /// Orders the views that have to be (re-)emitted so that `view` is up to
    /// date, dependencies first. Nothing is modified, so a cycle leaves the
    /// registry untouched.
    fn plan(&self, view: &str, force: bool) -> Result<Vec<RelationName>, TranslateError> {
        let mut order = vec![];
        self.plan_view(view, force, &mut vec![], &mut HashSet::new(), &mut order)?;
        Ok(order)
    }

    fn plan_view(
        &self,
        name: &str,
        force: bool,
        path: &mut Vec<RelationName>,
        visited: &mut HashSet<RelationName>,
        order: &mut Vec<RelationName>,
    ) -> Result<(), TranslateError> {
        if let Some(start) = path.iter().position(|entry| entry == name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_owned());
            return Err(TranslateError::CyclicDependency { cycle });
        }
        if !visited.insert(name.to_owned()) {
            return Ok(());
        }

        let view = self
            .registry
            .view(name)
            .ok_or_else(|| TranslateError::UndefinedRelation(name.to_owned()))?;

        path.push(name.to_owned());
        let mut dependency_emitted = false;
        for dependency in view.dependencies() {
            match self.registry.kind_of(dependency) {
                Some(RelationKind::Table) => continue,
                Some(RelationKind::View) => {
                    self.plan_view(dependency, false, path, visited, order)?;
                    dependency_emitted |= order.iter().any(|entry| entry == dependency);
                }
                // Registration rejects these, so the registry is corrupt.
                None => return Err(TranslateError::UndefinedRelation(dependency.to_owned())),
            }
        }
        path.pop();

        if force || dependency_emitted || view.state != Materialization::Current {
            order.push(name.to_owned());
        }
        Ok(())
    }

    fn emit_views(&mut self, order: Vec<RelationName>) -> Vec<String> {
        let mut statements = vec![];
        for name in order {
            if let Some(view) = self.registry.view(&name) {
                if view.is_materialized() {
                    info!("recreating view {}", name);
                    statements.extend(self.emitter.drop_view(&name));
                } else {
                    info!("creating view {}", name);
                }
                statements.extend(self.emitter.create_view(view));
            }
            self.registry.set_state(&name, Materialization::Current);
        }
        statements
    }
}

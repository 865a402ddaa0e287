//! Schema registry: base relations populated by facts, and views defined by
//! rules.
//!
//! Registering a rule only records the view's definition. Views are turned
//! into SQL later, on demand, by the [`Translator`](crate::Translator).

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::warn;

use crate::ast::{Clause, Constant, Literal, RelationName, Term, VariableName};
use crate::error::{RelationKind, TranslateError};

/// One alternative derivation of a view: each referenced relation mapped to
/// the terms bound at that reference.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Body {
    references: Vec<(RelationName, Vec<Term>)>,
}

impl Body {
    pub fn from_literals(literals: &[Literal]) -> Self {
        let mut body = Self::default();
        for literal in literals {
            if let Some(replaced) = body.bind(literal.predicate.clone(), literal.terms.clone()) {
                warn!(
                    "{} is referenced more than once in one body, ignoring {}({})",
                    literal.predicate,
                    literal.predicate,
                    replaced.iter().join(", ")
                );
            }
        }
        body
    }

    /// Binds `terms` to `relation`. A relation keeps its first position but
    /// only the last term list survives, which is returned on replacement.
    pub fn bind(&mut self, relation: RelationName, terms: Vec<Term>) -> Option<Vec<Term>> {
        match self.references.iter_mut().find(|(name, _)| *name == relation) {
            Some((_, bound)) => Some(std::mem::replace(bound, terms)),
            None => {
                self.references.push((relation, terms));
                None
            }
        }
    }

    pub fn references(&self) -> impl Iterator<Item = (&str, &[Term])> {
        self.references
            .iter()
            .map(|(name, terms)| (name.as_str(), terms.as_slice()))
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.references.iter().map(|(name, _)| name.as_str())
    }

    pub fn references_relation(&self, relation: &str) -> bool {
        self.relation_names().any(|name| name == relation)
    }

    pub fn bound_variables(&self) -> HashSet<&str> {
        self.references
            .iter()
            .flat_map(|(_, terms)| terms)
            .filter_map(Term::as_variable)
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Materialization {
    /// No SQL has been emitted for the view yet.
    Pending,
    /// The emitted definition matches the registered bodies.
    Current,
    /// Emitted, but bodies were added since.
    Stale,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub name: RelationName,
    pub columns: Vec<VariableName>,
    pub bodies: Vec<Body>,
    pub state: Materialization,
}

impl View {
    pub fn is_materialized(&self) -> bool {
        self.state != Materialization::Pending
    }

    pub fn is_recursive(&self) -> bool {
        self.bodies
            .iter()
            .any(|body| body.references_relation(&self.name))
    }

    /// Relations this view reads from, excluding itself, in order of first
    /// appearance.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.bodies
            .iter()
            .flat_map(Body::relation_names)
            .filter(move |name| *name != self.name)
            .unique()
    }
}

/// What [`SchemaRegistry::register_fact`] did with a row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactRegistration {
    /// First row of a new table.
    Created,
    /// Row appended to an existing table.
    Appended,
}

#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    tables: HashMap<RelationName, usize>,
    views: HashMap<RelationName, View>,
}

impl SchemaRegistry {
    pub fn table_arity(&self, name: &str) -> Option<usize> {
        self.tables.get(name).copied()
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.get(name)
    }

    pub fn kind_of(&self, name: &str) -> Option<RelationKind> {
        if self.tables.contains_key(name) {
            Some(RelationKind::Table)
        } else if self.views.contains_key(name) {
            Some(RelationKind::View)
        } else {
            None
        }
    }

    pub fn column_count(&self, name: &str) -> Option<usize> {
        self.table_arity(name)
            .or_else(|| self.view(name).map(|view| view.columns.len()))
    }

    pub fn set_state(&mut self, name: &str, state: Materialization) {
        if let Some(view) = self.views.get_mut(name) {
            view.state = state;
        }
    }

    pub fn register_fact(
        &mut self,
        name: &str,
        row: &[Constant],
    ) -> Result<FactRegistration, TranslateError> {
        if self.views.contains_key(name) {
            return Err(TranslateError::RelationKindConflict {
                name: name.to_owned(),
                existing: RelationKind::View,
            });
        }

        match self.tables.get(name) {
            Some(&arity) if arity != row.len() => Err(TranslateError::ArityMismatch {
                relation: name.to_owned(),
                expected: arity,
                found: row.len(),
            }),
            Some(_) => Ok(FactRegistration::Appended),
            None => {
                self.tables.insert(name.to_owned(), row.len());
                Ok(FactRegistration::Created)
            }
        }
    }

    /// Adds the rule's body as one more definition of its head view. Nothing
    /// is recorded when validation fails.
    pub fn register_rule(&mut self, clause: &Clause) -> Result<(), TranslateError> {
        let view_name = &clause.head.predicate;
        let columns = clause
            .head
            .terms
            .iter()
            .map(|term| {
                term.as_variable()
                    .map(str::to_owned)
                    .ok_or_else(|| TranslateError::NonVariableHead {
                        view: view_name.clone(),
                        term: term.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let body = Body::from_literals(&clause.body);

        let bound = body.bound_variables();
        let unbound: Vec<VariableName> = columns
            .iter()
            .filter(|column| !bound.contains(column.as_str()))
            .unique()
            .cloned()
            .collect();
        if !unbound.is_empty() {
            return Err(TranslateError::UnsafeRule {
                view: view_name.clone(),
                variables: unbound,
            });
        }

        if let Some(undefined) = body
            .relation_names()
            .find(|name| self.kind_of(name).is_none())
        {
            return Err(TranslateError::UndefinedRelation(undefined.to_owned()));
        }

        if self.tables.contains_key(view_name) {
            return Err(TranslateError::RelationKindConflict {
                name: view_name.clone(),
                existing: RelationKind::Table,
            });
        }

        match self.views.get_mut(view_name) {
            Some(view) => {
                if view.columns != columns {
                    return Err(TranslateError::ViewColumnMismatch {
                        view: view_name.clone(),
                        expected: view.columns.clone(),
                        found: columns,
                    });
                }
                view.bodies.push(body);
                if view.state == Materialization::Current {
                    view.state = Materialization::Stale;
                }
            }
            None => {
                self.views.insert(
                    view_name.clone(),
                    View {
                        name: view_name.clone(),
                        columns,
                        bodies: vec![body],
                        state: Materialization::Pending,
                    },
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Statement;
    use crate::parse_program;

    fn clause(code: &str) -> Clause {
        match parse_program(code).unwrap().statements.remove(0) {
            Statement::Assertion(clause) => clause,
            statement => panic!("expected an assertion, got {}", statement),
        }
    }

    fn int(n: i64) -> Constant {
        Constant::Integer(n.into())
    }

    fn registry_with_tables() -> SchemaRegistry {
        let mut registry = SchemaRegistry::default();
        registry.register_fact("p", &[int(1), int(2)]).unwrap();
        registry.register_fact("r", &[int(1)]).unwrap();
        registry
    }

    #[test]
    fn test_fact_creates_then_appends() {
        let mut registry = SchemaRegistry::default();
        assert_eq!(
            registry.register_fact("p", &[int(1), int(2)]),
            Ok(FactRegistration::Created)
        );
        assert_eq!(
            registry.register_fact("p", &[int(3), int(4)]),
            Ok(FactRegistration::Appended)
        );
        assert_eq!(registry.table_arity("p"), Some(2));
    }

    #[test]
    fn test_fact_arity_is_fixed() {
        let mut registry = registry_with_tables();
        assert_eq!(
            registry.register_fact("p", &[int(1)]),
            Err(TranslateError::ArityMismatch {
                relation: "p".into(),
                expected: 2,
                found: 1,
            })
        );
        assert_eq!(registry.table_arity("p"), Some(2));
    }

    #[test]
    fn test_fact_on_view_conflicts() {
        let mut registry = registry_with_tables();
        registry.register_rule(&clause("q(x) :- r(x).")).unwrap();
        assert_eq!(
            registry.register_fact("q", &[int(1)]),
            Err(TranslateError::RelationKindConflict {
                name: "q".into(),
                existing: RelationKind::View,
            })
        );
    }

    #[test]
    fn test_rule_creates_pending_view() {
        let mut registry = registry_with_tables();
        registry
            .register_rule(&clause("q(y, x) :- p(x, y), r(x)."))
            .unwrap();

        let view = registry.view("q").unwrap();
        assert_eq!(view.columns, vec!["y".to_owned(), "x".to_owned()]);
        assert_eq!(view.state, Materialization::Pending);
        assert_eq!(view.bodies.len(), 1);
        assert_eq!(view.dependencies().collect::<Vec<_>>(), vec!["p", "r"]);
        assert!(!view.is_recursive());
        assert_eq!(registry.column_count("q"), Some(2));
    }

    #[test]
    fn test_unsafe_rule_registers_nothing() {
        let mut registry = registry_with_tables();
        assert_eq!(
            registry.register_rule(&clause("bad(x) :- p(y, _).")),
            Err(TranslateError::UnsafeRule {
                view: "bad".into(),
                variables: vec!["x".into()],
            })
        );
        assert!(registry.view("bad").is_none());
    }

    #[test]
    fn test_constant_does_not_bind_head_variable() {
        let mut registry = registry_with_tables();
        assert!(matches!(
            registry.register_rule(&clause("bad(x, y) :- p(x, 2).")),
            Err(TranslateError::UnsafeRule { .. })
        ));
    }

    #[test]
    fn test_undefined_relation() {
        let mut registry = registry_with_tables();
        assert_eq!(
            registry.register_rule(&clause("r2(x) :- undefined_rel(x).")),
            Err(TranslateError::UndefinedRelation("undefined_rel".into()))
        );
        assert!(registry.view("r2").is_none());
    }

    #[test]
    fn test_first_rule_cannot_reference_itself() {
        let mut registry = registry_with_tables();
        assert_eq!(
            registry.register_rule(&clause("anc(x, z) :- p(x, y), anc(y, z).")),
            Err(TranslateError::UndefinedRelation("anc".into()))
        );

        registry.register_rule(&clause("anc(x, y) :- p(x, y).")).unwrap();
        registry
            .register_rule(&clause("anc(x, z) :- p(x, y), anc(y, z)."))
            .unwrap();
        let view = registry.view("anc").unwrap();
        assert!(view.is_recursive());
        assert_eq!(view.dependencies().collect::<Vec<_>>(), vec!["p"]);
    }

    #[test]
    fn test_column_mismatch_keeps_original() {
        let mut registry = registry_with_tables();
        registry.register_rule(&clause("q(x, y) :- p(x, y).")).unwrap();
        assert_eq!(
            registry.register_rule(&clause("q(y, x) :- p(x, y).")),
            Err(TranslateError::ViewColumnMismatch {
                view: "q".into(),
                expected: vec!["x".into(), "y".into()],
                found: vec!["y".into(), "x".into()],
            })
        );

        let view = registry.view("q").unwrap();
        assert_eq!(view.columns, vec!["x".to_owned(), "y".to_owned()]);
        assert_eq!(view.bodies.len(), 1);
    }

    #[test]
    fn test_rule_head_on_table_conflicts() {
        let mut registry = registry_with_tables();
        assert_eq!(
            registry.register_rule(&clause("r(x) :- p(x, _).")),
            Err(TranslateError::RelationKindConflict {
                name: "r".into(),
                existing: RelationKind::Table,
            })
        );
    }

    #[test]
    fn test_non_variable_head() {
        let mut registry = registry_with_tables();
        assert_eq!(
            registry.register_rule(&clause("q(x, 1) :- p(x, _).")),
            Err(TranslateError::NonVariableHead {
                view: "q".into(),
                term: "1".into(),
            })
        );
    }

    #[test]
    fn test_redefinition_marks_current_view_stale() {
        let mut registry = registry_with_tables();
        registry.register_rule(&clause("q(x) :- r(x).")).unwrap();
        registry.set_state("q", Materialization::Current);

        registry.register_rule(&clause("q(x) :- p(x, _).")).unwrap();
        let view = registry.view("q").unwrap();
        assert_eq!(view.state, Materialization::Stale);
        assert!(view.is_materialized());
        assert_eq!(view.bodies.len(), 2);
    }

    #[test]
    fn test_repeated_reference_keeps_last_binding() {
        let body = Body::from_literals(&clause("q(x) :- p(x, y), r(y), p(y, x).").body);
        let references: Vec<_> = body.references().collect();
        assert_eq!(
            references,
            vec![
                (
                    "p",
                    &[Term::Variable("y".into()), Term::Variable("x".into())][..]
                ),
                ("r", &[Term::Variable("y".into())][..]),
            ]
        );
    }
}

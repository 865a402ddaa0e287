//! SQL text generation.
//!
//! The translator decides *which* statements are needed and in what order;
//! an [`Emitter`] decides what they look like. [`SqliteEmitter`] produces
//! statements for SQLite.

use std::collections::{hash_map, BTreeMap, HashMap};

use itertools::Itertools;

use crate::ast::{Constant, RelationName, Term};
use crate::registry::{Body, View};

/// Required constant per column position of a queried relation.
pub type Constraints = BTreeMap<usize, Constant>;

pub trait Emitter {
    fn create_and_insert(&self, table: &str, row: &[Constant]) -> Vec<String>;

    fn insert(&self, table: &str, row: &[Constant]) -> Vec<String>;

    fn drop_view(&self, view: &str) -> Vec<String>;

    fn create_view(&self, view: &View) -> Vec<String>;

    fn select_with_constraints(
        &self,
        relation: &str,
        column_count: usize,
        constraints: &Constraints,
    ) -> Vec<String>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteEmitter;

impl Emitter for SqliteEmitter {
    fn create_and_insert(&self, table: &str, row: &[Constant]) -> Vec<String> {
        let columns = (0..row.len()).map(column_name).join(", ");
        let mut statements = vec![format!(
            "CREATE TABLE {}({})",
            quote_identifier(table),
            columns
        )];
        statements.extend(self.insert(table, row));
        statements
    }

    fn insert(&self, table: &str, row: &[Constant]) -> Vec<String> {
        vec![format!(
            "INSERT INTO {} VALUES ({})",
            quote_identifier(table),
            row.iter().map(constant_to_sql).join(", ")
        )]
    }

    fn drop_view(&self, view: &str) -> Vec<String> {
        vec![format!("DROP VIEW {}", quote_identifier(view))]
    }

    fn create_view(&self, view: &View) -> Vec<String> {
        vec![ViewDefinition::from(view).to_sql()]
    }

    fn select_with_constraints(
        &self,
        relation: &str,
        column_count: usize,
        constraints: &Constraints,
    ) -> Vec<String> {
        let free = (0..column_count)
            .filter(|index| !constraints.contains_key(index))
            .map(column_name)
            .collect::<Vec<_>>();

        let mut s = String::from("SELECT ");
        if free.is_empty() {
            s.push('*');
        } else {
            s.push_str(&free.join(", "));
        }
        s.push_str(" FROM ");
        s.push_str(&quote_identifier(relation));

        if !constraints.is_empty() {
            s.push_str(" WHERE ");
            s.push_str(
                &constraints
                    .iter()
                    .map(|(index, constant)| {
                        format!("{} = {}", column_name(*index), constant_to_sql(constant))
                    })
                    .join(" AND "),
            );
        }

        vec![s]
    }
}

pub fn column_name(index: usize) -> String {
    format!("c{}", index)
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Integers outside SQLite's 64-bit range are stored as text, which keeps
/// them exact and still comparable with the same constant in a query.
pub fn constant_to_sql(constant: &Constant) -> String {
    match constant {
        Constant::Integer(n) => match i64::try_from(n) {
            Ok(n) => n.to_string(),
            Err(_) => format!("'{}'", n),
        },
        Constant::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourcedColumn {
    pub source_index: usize,
    pub column_index: usize,
}

impl SourcedColumn {
    fn to_sql(self) -> String {
        format!(
            "{}.{}",
            Query::source_name(self.source_index),
            column_name(self.column_index)
        )
    }
}

#[derive(Clone, Debug)]
pub enum Source {
    Relation(RelationName),
    RecurseToSelf,
}

#[derive(Clone, Debug)]
pub enum Value {
    Column(SourcedColumn),
    Constant(Constant),
}

impl Value {
    fn to_sql(&self) -> String {
        match self {
            Value::Column(column) => column.to_sql(),
            Value::Constant(constant) => constant_to_sql(constant),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Condition {
    pub lhs: SourcedColumn,
    pub rhs: Value,
}

impl Condition {
    fn to_sql(&self) -> String {
        format!("{} = {}", self.lhs.to_sql(), self.rhs.to_sql())
    }
}

/// The SELECT for one body of a view.
#[derive(Clone, Debug)]
pub struct Query {
    pub projection: Vec<SourcedColumn>,
    pub sources: Vec<Source>,
    pub selection: Vec<Condition>,
}

impl Query {
    pub fn compile(view: &View, body: &Body) -> Self {
        let mut column_map: HashMap<&str, SourcedColumn> = HashMap::new();
        let mut sources = vec![];
        let mut selection = vec![];

        for (source_index, (name, terms)) in body.references().enumerate() {
            let source = if name == view.name {
                Source::RecurseToSelf
            } else {
                Source::Relation(name.to_owned())
            };
            sources.push(source);

            for (column_index, term) in terms.iter().enumerate() {
                let column = SourcedColumn {
                    source_index,
                    column_index,
                };

                match term {
                    Term::Variable(variable) => match column_map.entry(variable.as_str()) {
                        hash_map::Entry::Vacant(vacant) => {
                            vacant.insert(column);
                        }

                        hash_map::Entry::Occupied(occupied) => {
                            // A repeated variable joins the two columns.
                            selection.push(Condition {
                                lhs: *occupied.get(),
                                rhs: Value::Column(column),
                            });
                        }
                    },

                    Term::Constant(constant) => selection.push(Condition {
                        lhs: column,
                        rhs: Value::Constant(constant.clone()),
                    }),

                    Term::Wildcard => {}
                }
            }
        }

        let projection = view
            .columns
            .iter()
            .map(|column| {
                *column_map
                    .get(column.as_str())
                    .expect("head variable is bound by a range-restricted body")
            })
            .collect();

        Self {
            projection,
            sources,
            selection,
        }
    }

    pub fn source_name(index: usize) -> String {
        format!("t{}", index)
    }

    pub fn to_sql(&self, self_name: &str) -> String {
        let mut s = String::new();
        s.push_str("SELECT ");
        s.push_str(
            &self
                .projection
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{} AS {}", column.to_sql(), column_name(index)))
                .join(", "),
        );

        s.push_str("\nFROM ");
        s.push_str(
            &self
                .sources
                .iter()
                .enumerate()
                .map(|(source_index, source)| {
                    let orig_name = match source {
                        Source::Relation(name) => quote_identifier(name),
                        Source::RecurseToSelf => quote_identifier(self_name),
                    };
                    format!("{} AS {}", orig_name, Self::source_name(source_index))
                })
                .join(", "),
        );

        if !self.selection.is_empty() {
            s.push_str("\nWHERE ");
            s.push_str(&self.selection.iter().map(Condition::to_sql).join("\n  AND "));
        }

        s
    }
}

/// Every body of a view, unioned.
#[derive(Clone, Debug)]
pub struct ViewDefinition {
    pub name: RelationName,
    pub column_count: usize,
    pub recursive: bool,
    pub queries: Vec<Query>,
}

impl From<&View> for ViewDefinition {
    fn from(view: &View) -> Self {
        // Recursive CTEs need the base cases ahead of the recursive steps.
        let queries = view
            .bodies
            .iter()
            .sorted_by_key(|body| body.references_relation(&view.name))
            .map(|body| Query::compile(view, body))
            .collect();

        Self {
            name: view.name.clone(),
            column_count: view.columns.len(),
            recursive: view.is_recursive(),
            queries,
        }
    }
}

impl ViewDefinition {
    pub fn recursive_name(&self) -> String {
        format!("{}__rec", self.name)
    }

    pub fn to_sql(&self) -> String {
        let columns = (0..self.column_count).map(column_name).join(", ");
        let mut s = format!(
            "CREATE VIEW {}({}) AS\n",
            quote_identifier(&self.name),
            columns
        );

        let self_name = self.recursive_name();
        let union = self
            .queries
            .iter()
            .map(|query| query.to_sql(&self_name))
            .join("\nUNION\n");

        if self.recursive {
            let self_name = quote_identifier(&self_name);
            s.push_str(&format!(
                "WITH RECURSIVE {}({}) AS (\n{}\n)\nSELECT {} FROM {}",
                self_name, columns, union, columns, self_name
            ));
        } else {
            s.push_str(&union);
        }

        s
    }
}

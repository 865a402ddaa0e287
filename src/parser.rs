use std::borrow::BorrowMut;

use pest::Parser as _;
use pest_derive::Parser;

use crate::ast::{Clause, Constant, Identifier, Literal, Program, Statement, Term};
use crate::error::ParseError;

#[derive(Parser)]
#[grammar = "datalog.pest"]
struct Parser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;
type Pairs<'a> = pest::iterators::Pairs<'a, Rule>;

pub fn parse_program(code: &str) -> Result<Program, ParseError> {
    let program = Parser::parse(Rule::program, code)
        .map_err(Box::new)?
        .next()
        .ok_or(ParseError::Empty)?;

    Ok(Program {
        statements: program
            .into_inner()
            .take_while(|pair| pair.as_rule() != Rule::EOI)
            .map(Statement::from)
            .collect(),
    })
}

fn expect_next_rule<'a, P: BorrowMut<Pairs<'a>>>(mut pairs: P, rule: Rule) -> Pair<'a> {
    let pair = pairs.borrow_mut().next().expect("missing pair");
    assert_eq!(pair.as_rule(), rule);
    pair
}

fn convert_identifier(pair: Pair) -> Identifier {
    assert_eq!(pair.as_rule(), Rule::identifier);
    pair.as_str().to_string()
}

impl From<Pair<'_>> for Statement {
    fn from(pair: Pair<'_>) -> Self {
        assert_eq!(pair.as_rule(), Rule::statement);
        let pair = pair.into_inner().next().expect("empty statement");

        match pair.as_rule() {
            Rule::assertion => {
                Statement::Assertion(Clause::from(expect_next_rule(pair.into_inner(), Rule::clause)))
            }

            Rule::retraction => Statement::Retraction(Clause::from(expect_next_rule(
                pair.into_inner(),
                Rule::clause,
            ))),

            Rule::query => {
                Statement::Query(Literal::from(expect_next_rule(pair.into_inner(), Rule::literal)))
            }

            _ => unreachable!(),
        }
    }
}

impl From<Pair<'_>> for Clause {
    fn from(pair: Pair<'_>) -> Self {
        let mut pairs = pair.into_inner();
        let head = Literal::from(expect_next_rule(&mut pairs, Rule::literal));

        // A fact has no body pair at all.
        let body = pairs
            .next()
            .map(|body| {
                assert_eq!(body.as_rule(), Rule::body);
                body.into_inner().map(Literal::from).collect()
            })
            .unwrap_or_default();

        Self { head, body }
    }
}

impl From<Pair<'_>> for Literal {
    fn from(pair: Pair<'_>) -> Self {
        assert_eq!(pair.as_rule(), Rule::literal);
        let mut pairs = pair.into_inner();
        let predicate = convert_identifier(expect_next_rule(&mut pairs, Rule::identifier));

        let terms = expect_next_rule(pairs, Rule::terms)
            .into_inner()
            .map(Term::from)
            .collect();

        Self { predicate, terms }
    }
}

impl From<Pair<'_>> for Term {
    fn from(pair: Pair<'_>) -> Self {
        assert_eq!(pair.as_rule(), Rule::term);
        let pair = pair.into_inner().next().expect("empty term");

        match pair.as_rule() {
            Rule::wildcard => Term::Wildcard,
            Rule::identifier => Term::Variable(convert_identifier(pair)),
            Rule::integer_literal | Rule::string_literal => Term::Constant(Constant::from(pair)),
            _ => unreachable!(),
        }
    }
}

impl From<Pair<'_>> for Constant {
    fn from(pair: Pair<'_>) -> Self {
        match pair.as_rule() {
            Rule::integer_literal => Constant::Integer(
                pair.as_str()
                    .parse()
                    .expect("integer literal is a run of decimal digits"),
            ),

            Rule::string_literal => {
                let interior = expect_next_rule(pair.into_inner(), Rule::string_interior);
                Constant::String(interior.as_str().to_string())
            }

            _ => unreachable!(),
        }
    }
}

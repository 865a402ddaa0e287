pub mod ast;
pub mod error;
pub mod parser;
pub mod registry;
pub mod sql;
pub mod translator;


use anyhow::Result;

pub use error::{ParseError, TranslateError};
pub use parser::parse_program;
pub use translator::Translator;

/// Parses and translates a whole program with a fresh [`Translator`].
pub fn translate(code: &str) -> Result<Vec<String>> {
    let program = parse_program(code)?;
    Ok(Translator::new().translate(&program)?)
}

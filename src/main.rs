use std::path::PathBuf;

use anyhow::{Context, Result};
use log::info;
use rustyline::{error::ReadlineError, Editor};
use structopt::StructOpt;

use dlsql::{parse_program, Translator};

#[derive(Debug, StructOpt)]
#[structopt(name = "dlsql", about = "Translate Datalog programs into SQL statements")]
struct Opt {
    /// Program to translate. Starts an interactive session when omitted.
    #[structopt(parse(from_os_str))]
    input: Option<PathBuf>,

    /// Program loaded before the interactive session starts, if it exists
    #[structopt(long, parse(from_os_str), default_value = "prelude.dl")]
    prelude: PathBuf,
}

fn handle_input(translator: &mut Translator, code: &str) -> Result<()> {
    let program = parse_program(code)?;
    for statement in translator.translate(&program)? {
        println!("{};", statement);
    }
    Ok(())
}

fn repl(mut translator: Translator) -> Result<()> {
    let mut editor = Editor::<()>::new();

    loop {
        let readline = editor.readline("> ");
        match readline {
            Ok(line) => {
                editor.add_history_entry(line.as_str());

                // TODO: multiline inputs
                if let Err(e) = handle_input(&mut translator, &line) {
                    println!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    let mut translator = Translator::new();

    if let Some(input) = &opt.input {
        let code = std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?;
        return handle_input(&mut translator, &code);
    }

    if let Ok(code) = std::fs::read_to_string(&opt.prelude) {
        info!("loading prelude {}", opt.prelude.display());
        handle_input(&mut translator, &code)
            .with_context(|| format!("Failed to load {}", opt.prelude.display()))?;
    }

    repl(translator)
}

//! Tamarin interpreter command line.
//!
//! Without arguments it drops into an interactive read-evaluate-print loop:
//! each line is one program, its value is printed followed by a blank line,
//! and the top-level environment persists across lines (and across errors).
//! The sentinel input `quit` ends the session.
//!
//! With arguments, it runs the given script files in order in a single
//! interpreter session, so definitions made by one file are visible to the
//! next.

use std::fs;
use std::io::{self, Write};

use anyhow::Context;
use clap::Parser;

use tamarin::interpreter::Interpreter;

#[derive(Parser, Debug)]
#[command(version, about = "The Tamarin scripting language")]
struct Args {
    /// Script files to run in order; read from stdin when omitted.
    files: Vec<String>,
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    if args.files.is_empty() {
        run_prompt()?;
    } else {
        run_files(&args.files)?;
    }
    Ok(())
}

fn run_files(paths: &[String]) -> Result<(), anyhow::Error> {
    let mut interp_stdout = io::stdout();
    let mut interp = Interpreter::new(&mut interp_stdout);

    for path in paths {
        let source =
            fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?;
        interp
            .eval(&source)
            .with_context(|| format!("failed to run {}", path))?;
    }

    Ok(())
}

fn run_prompt() -> Result<(), io::Error> {
    let stdin = io::stdin();
    let mut repl_stdout = io::stdout();
    let mut interp_stdout = io::stdout();

    let mut interp = Interpreter::new(&mut interp_stdout);

    let mut input = String::new();
    loop {
        repl_stdout.write_all(b"> ")?;
        repl_stdout.flush()?;

        input.clear();
        let nbytes = stdin.read_line(&mut input)?;
        if nbytes == 0 {
            break;
        }

        let line = input.trim();
        if line == "quit" {
            break;
        }
        if line.is_empty() {
            println!();
            continue;
        }

        match interp.eval(line) {
            Ok(value) => println!("{}", value),
            Err(e) => println!("{}", e),
        }
        println!();
    }

    Ok(())
}

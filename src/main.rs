use std::cell::Cell;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::exit;
use std::rc::Rc;

use anyhow::Context;

use lingon::error::Reporter;
use lingon::parser::Parser;
use lingon::scanner::Scanner;
use lingon::{EvalResult, Interpreter, Object};

fn main() {
    let args: Vec<String> = env::args().collect();

    let had_error = match run(&args) {
        Ok(had_error) => had_error,
        Err(err) => {
            eprintln!("error: {err:#}");
            true
        }
    };

    if had_error {
        exit(1);
    }
}

fn run(args: &[String]) -> anyhow::Result<bool> {
    match args.get(1).map(String::as_str) {
        None => Ok(repl()),
        Some("--version") | Some("-v") => {
            println!("lingon {}", env!("CARGO_PKG_VERSION"));
            Ok(false)
        }
        Some("-e") => {
            let source = args.get(2).context("usage: lingon -e <source>")?;
            Ok(eval_and_print(source))
        }
        Some("-p") => {
            let source = args.get(2).context("usage: lingon -p <source>")?;
            Ok(print_tree(source))
        }
        Some(path) => {
            let source =
                fs::read_to_string(path).with_context(|| format!("failed to read {path}"))?;
            Ok(run_file(&source, args[2..].to_vec()))
        }
    }
}

/// A reporter that renders to stderr and remembers that anything at all
/// went wrong, for the exit code.
fn tracking_reporter(had_error: &Rc<Cell<bool>>) -> Reporter {
    let had_error = Rc::clone(had_error);
    Box::new(move |diagnostic| {
        had_error.set(true);
        eprintln!("{diagnostic}");
    })
}

fn run_file(source: &str, arguments: Vec<String>) -> bool {
    let had_error = Rc::new(Cell::new(false));
    let mut interpreter = Interpreter::with_options(
        tracking_reporter(&had_error),
        Box::new(|line| println!("{line}")),
        arguments,
        false,
    );
    interpreter.eval(source);
    had_error.get()
}

/// `-e`: evaluate one input and echo its value unless it is null.
fn eval_and_print(source: &str) -> bool {
    let had_error = Rc::new(Cell::new(false));
    let mut interpreter = Interpreter::with_options(
        tracking_reporter(&had_error),
        Box::new(|line| println!("{line}")),
        vec![],
        true,
    );
    if let EvalResult::Value(value) = interpreter.eval(source) {
        if !matches!(value, Object::Null) {
            println!("{value}");
        }
    }
    had_error.get()
}

/// `-p`: parse a single expression and print its tree rendering.
fn print_tree(source: &str) -> bool {
    let had_error = Rc::new(Cell::new(false));

    let mut scanner = Scanner::new(source);
    let tokens = scanner.scan_tokens();
    for diagnostic in scanner.take_diagnostics() {
        had_error.set(true);
        eprintln!("{diagnostic}");
    }

    let mut parser = Parser::new(tokens);
    let expression = parser.parse_expression();
    for diagnostic in parser.take_diagnostics() {
        had_error.set(true);
        eprintln!("{diagnostic}");
    }

    if let Some(expression) = expression {
        println!("{expression}");
    }
    had_error.get()
}

/// Line-oriented REPL over stdin. The prompt goes to stderr so stdout
/// stays machine-readable.
fn repl() -> bool {
    let had_error = Rc::new(Cell::new(false));
    let mut interpreter = Interpreter::with_options(
        tracking_reporter(&had_error),
        Box::new(|line| println!("{line}")),
        vec![],
        true,
    );

    let stdin = io::stdin();
    loop {
        eprint!("> ");
        let _ = io::stderr().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        if let EvalResult::Value(value) = interpreter.eval(&line) {
            if !matches!(value, Object::Null) {
                println!("{value}");
            }
        }
    }
    had_error.get()
}

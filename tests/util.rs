#![allow(dead_code)]
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use assert_cmd::Command;
use tempfile::NamedTempFile;

use lingon::{EvalResult, Interpreter};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;

/// An interpreter session that captures printed lines and rendered
/// diagnostics instead of touching stdout/stderr.
pub struct Session {
    interpreter: Interpreter,
    output: Rc<RefCell<Vec<String>>>,
    diagnostics: Rc<RefCell<Vec<String>>>,
}

pub fn session() -> Session {
    session_with_arguments(vec![])
}

pub fn session_with_arguments(arguments: Vec<String>) -> Session {
    let output = Rc::new(RefCell::new(Vec::new()));
    let diagnostics = Rc::new(RefCell::new(Vec::new()));

    let sink = Rc::clone(&output);
    let reported = Rc::clone(&diagnostics);
    let interpreter = Interpreter::with_options(
        Box::new(move |diagnostic| reported.borrow_mut().push(diagnostic.to_string())),
        Box::new(move |line| sink.borrow_mut().push(line.to_string())),
        arguments,
        true,
    );

    Session {
        interpreter,
        output,
        diagnostics,
    }
}

impl Session {
    pub fn eval(&mut self, source: &str) -> EvalResult {
        self.interpreter.eval(source)
    }

    /// Everything printed so far, in order.
    pub fn printed(&self) -> Vec<String> {
        self.output.borrow().clone()
    }

    /// Every diagnostic reported so far, rendered, in order.
    pub fn reported(&self) -> Vec<String> {
        self.diagnostics.borrow().clone()
    }
}

/// Writes the source to a temp file and runs it through the compiled
/// binary. Returns (stdout, stderr, exit code).
pub fn run_script(source: &str, arguments: &[&str]) -> (String, String, i32) {
    let mut script = NamedTempFile::new().expect("failed to create temp file");
    write!(script, "{source}").expect("failed to write temp file");

    let mut cmd = Command::cargo_bin("lingon").expect("binary not found");
    cmd.arg(script.path());
    cmd.args(arguments);

    let output = cmd.output().expect("failed to run binary");
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

/// Runs the binary with raw CLI arguments.
pub fn run_binary(arguments: &[&str]) -> (String, String, i32) {
    let mut cmd = Command::cargo_bin("lingon").expect("binary not found");
    cmd.args(arguments);

    let output = cmd.output().expect("failed to run binary");
    (
        String::from_utf8_lossy(&output.stdout).into_owned(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
        output.status.code().unwrap_or(-1),
    )
}

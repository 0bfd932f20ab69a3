use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::environment::Environment;
use crate::error::{stderr_reporter, Diagnostic, Reporter};
use crate::evaluator::{EvalContext, Evaluator, OutputSink};
use crate::native_functions::{default_registry, NativeRegistry};
use crate::object::Object;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::type_resolver::TypeResolver;
use crate::type_validator::TypeValidator;

/// What one `eval` call produced.
#[derive(Debug)]
pub enum EvalResult {
    /// The input was a single expression; this is its value.
    Value(Object),
    /// Statements only, or diagnostics were already reported.
    Empty,
    /// A runtime error was caught and reported; no value was produced.
    VoidMarker,
}

/// A persistent interpreter session. Each `eval` call appends the new
/// statements to the retained program, re-runs the analysis passes over
/// the whole concatenation (scope distances depend on statement order),
/// and then executes only the new statements. The globals environment is
/// the memory of previous runs; side effects are never replayed.
///
/// One instance is strictly single-threaded; using it from several
/// threads at once is undefined.
pub struct Interpreter {
    natives: NativeRegistry,
    globals: Rc<RefCell<Environment>>,
    history: Vec<Stmt>,
    reporter: Reporter,
    output: OutputSink,
    repl_mode: bool,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// A session with the default host library, reporting to stderr and
    /// printing to stdout, with no program arguments.
    pub fn new() -> Self {
        Self::with_options(
            stderr_reporter(),
            Box::new(|line| println!("{line}")),
            vec![],
            false,
        )
    }

    /// `reporter` receives every diagnostic; `output` receives each
    /// `print`ed line; `arguments` seeds the `ARGV` super-global;
    /// `repl_mode` lets the final semicolon of an input be omitted.
    pub fn with_options(
        reporter: Reporter,
        output: Box<dyn FnMut(&str)>,
        arguments: Vec<String>,
        repl_mode: bool,
    ) -> Self {
        Interpreter {
            natives: default_registry(arguments),
            globals: Rc::new(RefCell::new(Environment::new())),
            history: Vec::new(),
            reporter,
            output: Rc::new(RefCell::new(output)),
            repl_mode,
        }
    }

    /// Runs one input through the pipeline: scan, parse, resolve,
    /// type-resolve, validate, evaluate. The pipeline halts between
    /// passes as soon as one reported anything, and a batch that failed
    /// analysis is discarded whole; its statements never join the
    /// retained program.
    pub fn eval(&mut self, source: &str) -> EvalResult {
        let mut scanner = Scanner::new(source);
        let tokens = scanner.scan_tokens();
        if self.report(scanner.take_diagnostics()) {
            return EvalResult::Empty;
        }

        let mut parser = if self.repl_mode {
            Parser::new_repl(tokens)
        } else {
            Parser::new(tokens)
        };
        let statements = parser.parse();
        if self.report(parser.take_diagnostics()) {
            return EvalResult::Empty;
        }

        let checkpoint = self.history.len();
        self.history.extend(statements);

        let (bindings, diagnostics) = Resolver::new(&self.natives).resolve(&self.history);
        if self.report(diagnostics) {
            self.history.truncate(checkpoint);
            return EvalResult::Empty;
        }

        let diagnostics = TypeResolver::new(&bindings).run(&self.history);
        if self.report(diagnostics) {
            self.history.truncate(checkpoint);
            return EvalResult::Empty;
        }

        let diagnostics = TypeValidator::new(&bindings).run(&self.history);
        if self.report(diagnostics) {
            self.history.truncate(checkpoint);
            return EvalResult::Empty;
        }

        debug!(
            "analysis clean: {} retained statement(s), {} binding(s)",
            self.history.len(),
            bindings.len()
        );

        let single_expression = self.history.len() == checkpoint + 1
            && matches!(self.history[checkpoint], Stmt::Expression { .. });

        let context = Rc::new(EvalContext {
            bindings,
            output: Rc::clone(&self.output),
        });
        let mut evaluator = Evaluator::new(context, Rc::clone(&self.globals));
        match evaluator.interpret(&self.history[checkpoint..]) {
            Ok(Some(value)) if single_expression => EvalResult::Value(value),
            Ok(_) => EvalResult::Empty,
            Err(error) => {
                debug!("runtime error on line {}", error.token.line);
                let diagnostic = Diagnostic::from(error);
                (self.reporter)(&diagnostic);
                EvalResult::VoidMarker
            }
        }
    }

    fn report(&mut self, diagnostics: Vec<Diagnostic>) -> bool {
        let erred = !diagnostics.is_empty();
        for diagnostic in &diagnostics {
            (self.reporter)(diagnostic);
        }
        erred
    }
}

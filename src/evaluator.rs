use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::Binding;
use crate::environment::{assign_at, get_at, Environment};
use crate::error::RuntimeError;
use crate::expr::Expr;
use crate::function::UserFunction;
use crate::object::{arithmetic, compare, power, ArithOp, Object};
use crate::resolver::BindingMap;
use crate::stmt::Stmt;
use crate::token::Token;
use crate::token::TokenType::*;

/// How a statement finished. `Returning` unwinds a user function call;
/// only the call evaluator turns it back into a value.
pub enum Execution {
    Normal,
    Returning(Object),
}

/// The output sink injected by the host; receives one formatted line per
/// `print`.
pub type OutputSink = Rc<RefCell<Box<dyn FnMut(&str)>>>;

/// State shared by every evaluator in one run: the resolver's verdicts
/// and the output sink. Block and call evaluators clone the handle.
pub struct EvalContext {
    pub bindings: BindingMap,
    pub output: OutputSink,
}

/// Tree-walks statements against the current environment chain, reading
/// and writing names exactly where the resolver's bindings point. Does a
/// post-order traversal: each node evaluates its children before doing
/// its own work. Stops at the first runtime error.
pub struct Evaluator {
    context: Rc<EvalContext>,
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
}

impl Evaluator {
    pub fn new(context: Rc<EvalContext>, globals: Rc<RefCell<Environment>>) -> Self {
        let environment = Rc::clone(&globals);
        Evaluator {
            context,
            globals,
            environment,
        }
    }

    fn with_environment(
        context: Rc<EvalContext>,
        globals: Rc<RefCell<Environment>>,
        environment: Rc<RefCell<Environment>>,
    ) -> Self {
        Evaluator {
            context,
            globals,
            environment,
        }
    }

    /// Runs a batch of statements. The value of the last statement is
    /// handed back when that statement was a bare expression, so the REPL
    /// can echo it.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<Option<Object>, RuntimeError> {
        let mut last_value = None;
        for statement in statements {
            match statement {
                Stmt::Expression { expression } => {
                    last_value = Some(self.evaluate(expression)?);
                }
                _ => {
                    last_value = None;
                    // A top-level `Returning` cannot happen: the resolver
                    // rejects `return` outside a function.
                    if let Execution::Returning(_) = self.execute(statement)? {
                        break;
                    }
                }
            }
        }
        Ok(last_value)
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Execution, RuntimeError> {
        for statement in statements {
            if let Execution::Returning(value) = self.execute(statement)? {
                return Ok(Execution::Returning(value));
            }
        }
        Ok(Execution::Normal)
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<Execution, RuntimeError> {
        match stmt {
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
                Ok(Execution::Normal)
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                let mut output = self.context.output.borrow_mut();
                (*output)(&value.to_string());
                Ok(Execution::Normal)
            }
            Stmt::Var {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Object::Null,
                };
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), value);
                Ok(Execution::Normal)
            }
            Stmt::Block { statements } => {
                // The block body runs in a child evaluator holding a
                // fresh environment chained onto the current one, so the
                // previous environment is restored on every exit path.
                let scope = Rc::new(RefCell::new(Environment::from(&self.environment)));
                let mut block = Evaluator::with_environment(
                    Rc::clone(&self.context),
                    Rc::clone(&self.globals),
                    scope,
                );
                block.execute_block(statements)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Execution::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Execution::Returning(value) = self.execute(body)? {
                        return Ok(Execution::Returning(value));
                    }
                }
                Ok(Execution::Normal)
            }
            Stmt::Function { declaration } => {
                // The runtime representation closes over the environment
                // where the declaration executes.
                let function = UserFunction {
                    declaration: Rc::clone(declaration),
                    closure: Rc::clone(&self.environment),
                };
                self.environment.borrow_mut().define(
                    declaration.name.lexeme.clone(),
                    Object::Function(Rc::new(function)),
                );
                Ok(Execution::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Object::Null,
                };
                Ok(Execution::Returning(value))
            }
            Stmt::Class { name } => {
                self.environment.borrow_mut().define(
                    name.lexeme.clone(),
                    Object::Class {
                        name: name.lexeme.clone(),
                    },
                );
                Ok(Execution::Normal)
            }
        }
    }

    fn binding_of(&self, expr: &Expr) -> Option<Binding> {
        self.context.bindings.get(&(expr as *const Expr)).cloned()
    }

    pub fn evaluate(&mut self, expression: &Expr) -> Result<Object, RuntimeError> {
        match expression {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::Empty { .. } => Ok(Object::Null),
            Expr::Grouping {
                expression: inner, ..
            } => self.evaluate(inner),
            Expr::Unary {
                operator, right, ..
            } => {
                let value = self.evaluate(right)?;
                match operator.token_type {
                    BANG => Ok(Object::Bool(!value.is_truthy())),
                    MINUS => negate(&value)
                        .map_err(|message| RuntimeError::new(operator.clone(), message)),
                    _ => Err(RuntimeError::new(
                        operator.clone(),
                        "Operand must be a number.",
                    )),
                }
            }
            Expr::Postfix {
                left,
                operator,
                name,
                ..
            } => {
                let previous = self.evaluate(left)?;
                let one = previous.one_like().ok_or_else(|| {
                    RuntimeError::new(operator.clone(), "Operand must be a number.")
                })?;
                let op = match operator.token_type {
                    PLUS_PLUS => ArithOp::Add,
                    _ => ArithOp::Sub,
                };
                let next = arithmetic(op, &previous, &one)
                    .map_err(|message| RuntimeError::new(operator.clone(), message))?;
                self.assign_through_binding(expression, name, next)?;
                // Postfix operators answer the value from before the
                // store-back.
                Ok(previous)
            }
            Expr::Binary {
                left,
                operator,
                right,
                ..
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                self.binary(operator, left, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => {
                let left_value = self.evaluate(left)?;

                // Short-circuit: whichever operand fixes the result is
                // the result, with its own truthiness.
                if operator.token_type == PIPE_PIPE {
                    if left_value.is_truthy() {
                        return Ok(left_value);
                    }
                } else if !left_value.is_truthy() {
                    return Ok(left_value);
                }

                self.evaluate(right)
            }
            Expr::Variable { name, .. } => match self.binding_of(expression) {
                Some(Binding::Variable { distance, .. })
                | Some(Binding::Function { distance, .. }) => {
                    if distance >= 0 {
                        get_at(&self.environment, distance as usize, name)
                    } else {
                        self.globals.borrow().get(name)
                    }
                }
                Some(Binding::Native { method }) => Ok(Object::NativeMethod(method)),
                Some(Binding::NativeObject { class }) => Ok(Object::NativeClass(class)),
                Some(Binding::Class { .. }) | None => self.environment.borrow().get(name),
            },
            Expr::Assign { name, value, .. } => {
                let value = self.evaluate(value)?;
                self.assign_through_binding(expression, name, value.clone())?;
                // Assignment nests inside other expressions, so it has a
                // value of its own.
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
                ..
            } => {
                let callee_value = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }
                self.call(callee_value, args, paren)
            }
            Expr::Get { object, name, .. } => {
                let object = self.evaluate(object)?;
                match object {
                    Object::NativeClass(class) => match class.method(&name.lexeme) {
                        Some(method) => Ok(Object::NativeMethod(method)),
                        None => Err(RuntimeError::new(
                            name.clone(),
                            format!("Undefined property '{}'", name.lexeme),
                        )),
                    },
                    _ => Err(RuntimeError::new(
                        name.clone(),
                        "Only native objects have properties.",
                    )),
                }
            }
        }
    }

    /// Writes a value back through the binding emitted for `site`: a
    /// local at its known distance, or the globals frame.
    fn assign_through_binding(
        &mut self,
        site: &Expr,
        name: &Token,
        value: Object,
    ) -> Result<(), RuntimeError> {
        match self.binding_of(site) {
            Some(Binding::Variable { distance, .. })
            | Some(Binding::Function { distance, .. }) => {
                if distance >= 0 {
                    assign_at(&self.environment, distance as usize, name, value)
                } else {
                    self.globals.borrow_mut().assign(name, value)
                }
            }
            _ => self.globals.borrow_mut().assign(name, value),
        }
    }

    fn binary(
        &mut self,
        operator: &Token,
        left: Object,
        right: Object,
    ) -> Result<Object, RuntimeError> {
        let fail = |message: String| RuntimeError::new(operator.clone(), message);
        match operator.token_type {
            PLUS => match (&left, &right) {
                (Object::Str(a), Object::Str(b)) => Ok(Object::Str(format!("{a}{b}"))),
                _ if left.is_numeric() && right.is_numeric() => {
                    arithmetic(ArithOp::Add, &left, &right).map_err(fail)
                }
                _ => Err(fail(
                    "Operands must be two numbers or two strings.".to_string(),
                )),
            },
            MINUS => arithmetic(ArithOp::Sub, &left, &right).map_err(fail),
            STAR => arithmetic(ArithOp::Mul, &left, &right).map_err(fail),
            SLASH => arithmetic(ArithOp::Div, &left, &right).map_err(fail),
            PERCENT => arithmetic(ArithOp::Rem, &left, &right).map_err(fail),
            STAR_STAR => power(&left, &right).map_err(fail),
            GREATER => Ok(Object::Bool(compare(&left, &right).map_err(fail)?.is_gt())),
            GREATER_EQUAL => Ok(Object::Bool(compare(&left, &right).map_err(fail)?.is_ge())),
            LESS => Ok(Object::Bool(compare(&left, &right).map_err(fail)?.is_lt())),
            LESS_EQUAL => Ok(Object::Bool(compare(&left, &right).map_err(fail)?.is_le())),
            EQUAL_EQUAL => Ok(Object::Bool(left.is_equal(&right))),
            BANG_EQUAL => Ok(Object::Bool(!left.is_equal(&right))),
            _ => Err(fail(format!(
                "Unexpected binary operator '{}'.",
                operator.lexeme
            ))),
        }
    }

    fn call(
        &mut self,
        callee: Object,
        args: Vec<Object>,
        paren: &Token,
    ) -> Result<Object, RuntimeError> {
        match callee {
            Object::Function(function) => self.call_function(&function, args, paren),
            Object::NativeMethod(method) => {
                if args.len() != method.params.len() {
                    return Err(RuntimeError::new(
                        paren.clone(),
                        format!(
                            "Method '{}' has {} parameter(s) but was called with {} argument(s)",
                            method.name,
                            method.params.len(),
                            args.len()
                        ),
                    ));
                }
                // Host failures come back as bare messages; the call
                // site's token pins them to a source line.
                (method.func)(args).map_err(|message| RuntimeError::new(paren.clone(), message))
            }
            _ => Err(RuntimeError::new(
                paren.clone(),
                "Can only call functions and native methods.",
            )),
        }
    }

    /// The single place a `Returning` signal is converted back into a
    /// value.
    fn call_function(
        &mut self,
        function: &UserFunction,
        args: Vec<Object>,
        paren: &Token,
    ) -> Result<Object, RuntimeError> {
        if args.len() != function.arity() {
            return Err(RuntimeError::new(
                paren.clone(),
                format!(
                    "Expected {} arguments but got {}.",
                    function.arity(),
                    args.len()
                ),
            ));
        }

        // The body runs in a fresh environment chained to the closure the
        // function captured at declaration, not to the caller's scope.
        let scope = Rc::new(RefCell::new(Environment::from(&function.closure)));
        for (param, arg) in function.declaration.params.iter().zip(args) {
            scope.borrow_mut().define(param.name.lexeme.clone(), arg);
        }

        let mut body = Evaluator::with_environment(
            Rc::clone(&self.context),
            Rc::clone(&self.globals),
            scope,
        );
        match body.execute_block(&function.declaration.body)? {
            Execution::Returning(value) => Ok(value),
            Execution::Normal => Ok(Object::Null),
        }
    }
}

fn negate(value: &Object) -> Result<Object, String> {
    match value {
        Object::Int(n) => n
            .checked_neg()
            .map(Object::Int)
            .ok_or_else(|| "Integer overflow".to_string()),
        Object::Long(n) => n
            .checked_neg()
            .map(Object::Long)
            .ok_or_else(|| "Integer overflow".to_string()),
        Object::UInt(n) => Ok(Object::Long(-i64::from(*n))),
        Object::ULong(n) => i64::try_from(*n)
            .map(|n| Object::Long(-n))
            .map_err(|_| "Integer overflow".to_string()),
        Object::Float(n) => Ok(Object::Float(-n)),
        Object::Double(n) => Ok(Object::Double(-n)),
        Object::BigInt(n) => Ok(Object::BigInt(-n.clone())),
        _ => Err("Operand must be a number.".to_string()),
    }
}

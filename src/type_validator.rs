use std::rc::Rc;

use crate::binding::Binding;
use crate::error::Diagnostic;
use crate::expr::Expr;
use crate::function::FunctionDecl;
use crate::native_functions::NativeMethodDef;
use crate::resolver::BindingMap;
use crate::stmt::Stmt;
use crate::token::Token;
use crate::types::can_be_coerced_into;

/// The second type pass. Assumes the type resolver ran to fixpoint and
/// enforces what it could not: call-site arity and argument coercibility,
/// initializer coercibility, unknown annotation names, and assignment to
/// immutable identifiers. When everything else was clean it also checks
/// that every reachable type slot actually got resolved.
pub struct TypeValidator<'a> {
    bindings: &'a BindingMap,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeValidator<'a> {
    pub fn new(bindings: &'a BindingMap) -> Self {
        TypeValidator {
            bindings,
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self, statements: &[Stmt]) -> Vec<Diagnostic> {
        for statement in statements {
            self.validate_statement(statement);
        }
        // The unresolved-slot sweep only runs on an otherwise clean tree;
        // anything already diagnosed would drag a trail of unresolved
        // children behind it.
        if self.diagnostics.is_empty() {
            for statement in statements {
                self.sweep_statement(statement);
            }
        }
        self.diagnostics
    }

    fn validate_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.validate_expression(expression);
            }
            Stmt::Var {
                name,
                type_ref,
                initializer,
            } => {
                if let Some(expr) = initializer {
                    self.validate_expression(expr);
                }

                let declared = type_ref.borrow();
                match declared.resolved_type() {
                    Some(declared_type) => {
                        let initializer_type = initializer
                            .as_ref()
                            .and_then(|expr| expr.type_ref().borrow().resolved_type());
                        if let Some(initializer_type) = initializer_type {
                            if !can_be_coerced_into(declared_type, initializer_type) {
                                self.diagnostics.push(Diagnostic::TypeValidation {
                                    token: name.clone(),
                                    message: format!(
                                        "Cannot assign {initializer_type} value to {declared_type} variable '{}'",
                                        name.lexeme
                                    ),
                                });
                            }
                        }
                    }
                    None => {
                        if let Some(specifier) = declared.specifier() {
                            self.diagnostics.push(Diagnostic::TypeValidation {
                                token: specifier.clone(),
                                message: format!("Type not found: {}", specifier.lexeme),
                            });
                        } else if initializer.is_none() {
                            self.diagnostics.push(Diagnostic::TypeValidation {
                                token: name.clone(),
                                message: format!(
                                    "Cannot infer type of variable '{}' without an initializer",
                                    name.lexeme
                                ),
                            });
                        }
                    }
                }
            }
            Stmt::Block { statements } => {
                for statement in statements {
                    self.validate_statement(statement);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.validate_expression(condition);
                self.validate_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.validate_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.validate_expression(condition);
                self.validate_statement(body);
            }
            Stmt::Function { declaration } => {
                self.validate_function(declaration);
            }
            Stmt::Return { keyword, value } => {
                if let Some(expr) = value {
                    self.validate_expression(expr);
                    if !expr.type_ref().borrow().is_resolved() {
                        self.diagnostics.push(Diagnostic::Internal {
                            message: format!(
                                "return value on line {} has no resolved type",
                                keyword.line
                            ),
                        });
                    }
                }
            }
            Stmt::Class { .. } => {}
        }
    }

    fn validate_function(&mut self, declaration: &FunctionDecl) {
        let function_name = &declaration.name.lexeme;

        // Re-emits the inference limitation in case this pass runs on a
        // tree the first type pass was not run over.
        let return_slot = declaration.return_type.borrow();
        if !return_slot.is_explicit() {
            self.diagnostics.push(Diagnostic::TypeValidation {
                token: declaration.name.clone(),
                message: format!(
                    "Inferred typing is not yet supported for function '{function_name}'"
                ),
            });
        } else if !return_slot.is_resolved() {
            let specifier = return_slot.specifier().expect("explicit slot has a specifier");
            self.diagnostics.push(Diagnostic::TypeValidation {
                token: specifier.clone(),
                message: format!("Type not found: {}", specifier.lexeme),
            });
        }
        drop(return_slot);

        for param in &declaration.params {
            let slot = param.type_ref.borrow();
            if !slot.is_explicit() {
                self.diagnostics.push(Diagnostic::TypeValidation {
                    token: param.name.clone(),
                    message: format!(
                        "Inferred typing is not yet supported for parameter '{}' to function '{function_name}'",
                        param.name.lexeme
                    ),
                });
            } else if !slot.is_resolved() {
                let specifier = slot.specifier().expect("explicit slot has a specifier");
                self.diagnostics.push(Diagnostic::TypeValidation {
                    token: specifier.clone(),
                    message: format!("Type not found: {}", specifier.lexeme),
                });
            }
        }

        for statement in &declaration.body {
            self.validate_statement(statement);
        }
    }

    fn binding_of(&self, expr: &Expr) -> Option<&Binding> {
        self.bindings.get(&(expr as *const Expr))
    }

    fn validate_expression(&mut self, expression: &Expr) {
        match expression {
            Expr::Literal { .. } | Expr::Empty { .. } => {}
            Expr::Variable { .. } => {}
            Expr::Grouping {
                expression: inner, ..
            } => self.validate_expression(inner),
            Expr::Unary { right, .. } => self.validate_expression(right),
            Expr::Postfix { left, .. } => self.validate_expression(left),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.validate_expression(left);
                self.validate_expression(right);
            }
            Expr::Assign { name, value, .. } => {
                self.validate_expression(value);
                let immutable = matches!(
                    self.binding_of(expression),
                    Some(
                        Binding::Function { .. }
                            | Binding::Native { .. }
                            | Binding::NativeObject { .. }
                            | Binding::Class { .. }
                    )
                );
                if immutable {
                    self.diagnostics.push(Diagnostic::Immutability {
                        token: name.clone(),
                        message: format!(
                            "Cannot reassign immutable identifier '{}'",
                            name.lexeme
                        ),
                    });
                }
            }
            Expr::Get { object, .. } => self.validate_expression(object),
            Expr::Call {
                callee,
                paren,
                arguments,
                ..
            } => {
                for argument in arguments {
                    self.validate_expression(argument);
                }
                self.validate_call(callee, paren, arguments);
            }
        }
    }

    fn validate_call(&mut self, callee: &Expr, paren: &Token, arguments: &[Expr]) {
        match callee {
            Expr::Variable { .. } => match self.binding_of(callee).cloned() {
                Some(Binding::Function { declaration, .. }) => {
                    self.check_user_call(&declaration, paren, arguments);
                }
                Some(Binding::Native { method }) => {
                    self.check_native_call(&method, paren, arguments);
                }
                // Calling anything else is the evaluator's NotCallable;
                // there is no signature to check here.
                _ => {}
            },
            Expr::Get { object, name, .. } => {
                self.validate_expression(object);
                let method = match self.binding_of(object) {
                    Some(Binding::NativeObject { class }) => class.method(&name.lexeme),
                    _ => None,
                };
                if let Some(method) = method {
                    self.check_native_call(&method, paren, arguments);
                }
            }
            other => self.validate_expression(other),
        }
    }

    fn check_user_call(&mut self, declaration: &FunctionDecl, paren: &Token, arguments: &[Expr]) {
        let function_name = &declaration.name.lexeme;
        if declaration.params.len() != arguments.len() {
            self.diagnostics.push(Diagnostic::TypeValidation {
                token: paren.clone(),
                message: format!(
                    "Function '{function_name}' has {} parameter(s) but was called with {} argument(s)",
                    declaration.params.len(),
                    arguments.len()
                ),
            });
            return;
        }

        for (param, argument) in declaration.params.iter().zip(arguments) {
            let (Some(param_type), Some(argument_type)) = (
                param.type_ref.borrow().resolved_type(),
                argument.type_ref().borrow().resolved_type(),
            ) else {
                continue;
            };
            if !can_be_coerced_into(param_type, argument_type) {
                // The declared type reads as written in the source.
                let declared = param
                    .type_specifier
                    .as_ref()
                    .map(|t| t.lexeme.clone())
                    .unwrap_or_else(|| param_type.to_string());
                self.diagnostics.push(Diagnostic::TypeValidation {
                    token: paren.clone(),
                    message: format!(
                        "Cannot pass {argument_type} argument as parameter '{}: {declared}' to {function_name}()",
                        param.name.lexeme
                    ),
                });
            }
        }
    }

    fn check_native_call(
        &mut self,
        method: &Rc<NativeMethodDef>,
        paren: &Token,
        arguments: &[Expr],
    ) {
        if method.params.len() != arguments.len() {
            self.diagnostics.push(Diagnostic::TypeValidation {
                token: paren.clone(),
                message: format!(
                    "Method '{}' has {} parameter(s) but was called with {} argument(s)",
                    method.name,
                    method.params.len(),
                    arguments.len()
                ),
            });
            return;
        }

        for (param_type, argument) in method.params.iter().zip(arguments) {
            let Some(argument_type) = argument.type_ref().borrow().resolved_type() else {
                continue;
            };
            if !can_be_coerced_into(*param_type, argument_type) {
                self.diagnostics.push(Diagnostic::TypeValidation {
                    token: paren.clone(),
                    message: format!(
                        "Cannot pass {argument_type} argument as {param_type} parameter to {}()",
                        method.name
                    ),
                });
            }
        }
    }

    fn sweep_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.sweep_expression(expression);
            }
            Stmt::Var { initializer, .. } => {
                if let Some(expr) = initializer {
                    self.sweep_expression(expr);
                }
            }
            Stmt::Block { statements } => {
                for statement in statements {
                    self.sweep_statement(statement);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.sweep_expression(condition);
                self.sweep_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.sweep_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.sweep_expression(condition);
                self.sweep_statement(body);
            }
            Stmt::Function { declaration } => {
                for statement in &declaration.body {
                    self.sweep_statement(statement);
                }
            }
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.sweep_expression(expr);
                }
            }
            Stmt::Class { .. } => {}
        }
    }

    /// Every reachable expression must carry a resolved type by now, with
    /// one exemption: `Get` nodes (and calls through them) dispatch on
    /// host objects at evaluation time.
    fn sweep_expression(&mut self, expression: &Expr) {
        match expression {
            Expr::Get { object, .. } => {
                self.sweep_expression(object);
                return;
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                if let Expr::Get { object, .. } = callee.as_ref() {
                    self.sweep_expression(object);
                } else {
                    self.sweep_expression(callee);
                }
                for argument in arguments {
                    self.sweep_expression(argument);
                }
            }
            Expr::Grouping {
                expression: inner, ..
            } => self.sweep_expression(inner),
            Expr::Unary { right, .. } => self.sweep_expression(right),
            Expr::Postfix { left, .. } => self.sweep_expression(left),
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.sweep_expression(left);
                self.sweep_expression(right);
            }
            Expr::Assign { value, .. } => self.sweep_expression(value),
            Expr::Literal { .. } | Expr::Empty { .. } | Expr::Variable { .. } => {}
        }

        if !expression.type_ref().borrow().is_resolved() {
            self.diagnostics.push(Diagnostic::Internal {
                message: format!("unresolved type for expression '{expression}'"),
            });
        }
    }
}

use crate::binding::Binding;
use crate::error::Diagnostic;
use crate::expr::Expr;
use crate::function::FunctionDecl;
use crate::resolver::BindingMap;
use crate::stmt::Stmt;
use crate::token::TokenType::*;
use crate::types::{lookup_type_name, promote, TypeId, TypeRef};

/// The first type pass: walks the tree depth-first and, after visiting an
/// expression's children, computes and stores its type. Explicit
/// annotations resolve by short-name lookup; `var` declarations without an
/// annotation adopt their initializer's type. Like the resolver, this pass
/// collects diagnostics and keeps going.
pub struct TypeResolver<'a> {
    bindings: &'a BindingMap,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeResolver<'a> {
    pub fn new(bindings: &'a BindingMap) -> Self {
        TypeResolver {
            bindings,
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self, statements: &[Stmt]) -> Vec<Diagnostic> {
        for statement in statements {
            self.check_statement(statement);
        }
        self.diagnostics
    }

    fn check_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.check_expression(expression);
            }
            Stmt::Var {
                type_ref,
                initializer,
                ..
            } => {
                if let Some(expr) = initializer {
                    self.check_expression(expr);
                }
                self.resolve_annotation(type_ref);
                // Inference: with no annotation the declaration takes the
                // initializer's type.
                if !type_ref.borrow().is_explicit() {
                    if let Some(expr) = initializer {
                        if let Some(inferred) = expr.type_ref().borrow().resolved_type() {
                            type_ref.borrow_mut().resolve(inferred);
                        }
                    }
                }
            }
            Stmt::Block { statements } => {
                for statement in statements {
                    self.check_statement(statement);
                }
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_expression(condition);
                self.check_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.check_expression(condition);
                self.check_statement(body);
            }
            Stmt::Function { declaration } => {
                self.check_function(declaration);
            }
            Stmt::Return { value, .. } => {
                if let Some(expr) = value {
                    self.check_expression(expr);
                }
            }
            Stmt::Class { .. } => {}
        }
    }

    /// Function signatures must be fully annotated; inferring them is a
    /// known limitation and is diagnosed rather than attempted.
    fn check_function(&mut self, declaration: &FunctionDecl) {
        let function_name = &declaration.name.lexeme;
        if declaration.return_type.borrow().is_explicit() {
            self.resolve_annotation(&declaration.return_type);
        } else {
            self.diagnostics.push(Diagnostic::TypeValidation {
                token: declaration.name.clone(),
                message: format!(
                    "Inferred typing is not yet supported for function '{function_name}'"
                ),
            });
        }

        for param in &declaration.params {
            if param.type_ref.borrow().is_explicit() {
                self.resolve_annotation(&param.type_ref);
            } else {
                self.diagnostics.push(Diagnostic::TypeValidation {
                    token: param.name.clone(),
                    message: format!(
                        "Inferred typing is not yet supported for parameter '{}' to function '{function_name}'",
                        param.name.lexeme
                    ),
                });
            }
        }

        for statement in &declaration.body {
            self.check_statement(statement);
        }
    }

    /// Short-name lookup for an explicit annotation. An unknown name
    /// leaves the slot unresolved; the validator surfaces it as
    /// `Type not found`.
    fn resolve_annotation(&mut self, type_ref: &TypeRef) {
        let specifier = {
            let slot = type_ref.borrow();
            if !slot.is_explicit() || slot.is_resolved() {
                return;
            }
            slot.specifier().cloned()
        };
        if let Some(specifier) = specifier {
            if let Some(type_id) = lookup_type_name(&specifier.lexeme) {
                type_ref.borrow_mut().resolve(type_id);
            }
        }
    }

    fn binding_of(&self, expr: &Expr) -> Option<&Binding> {
        self.bindings.get(&(expr as *const Expr))
    }

    fn check_expression(&mut self, expression: &Expr) {
        match expression {
            Expr::Literal { value, type_ref } => {
                type_ref.borrow_mut().resolve(value.type_id());
            }
            Expr::Empty { type_ref } => {
                type_ref.borrow_mut().resolve(TypeId::Null);
            }
            Expr::Grouping {
                expression: inner,
                type_ref,
            } => {
                self.check_expression(inner);
                if let Some(inner_type) = inner.type_ref().borrow().resolved_type() {
                    type_ref.borrow_mut().resolve(inner_type);
                }
            }
            Expr::Unary {
                right, type_ref, ..
            } => {
                self.check_expression(right);
                if let Some(operand) = right.type_ref().borrow().resolved_type() {
                    type_ref.borrow_mut().resolve(operand);
                }
            }
            Expr::Postfix {
                left, type_ref, ..
            } => {
                self.check_expression(left);
                if let Some(operand) = left.type_ref().borrow().resolved_type() {
                    type_ref.borrow_mut().resolve(operand);
                }
            }
            Expr::Binary { .. } => self.check_binary(expression),
            Expr::Logical {
                left,
                right,
                type_ref,
                ..
            } => {
                self.check_expression(left);
                self.check_expression(right);
                // The value of a logical operator is one of its operands;
                // when the operands disagree the result is only known to
                // be usable as a condition.
                let left_type = left.type_ref().borrow().resolved_type();
                let right_type = right.type_ref().borrow().resolved_type();
                match (left_type, right_type) {
                    (Some(l), Some(r)) if l == r => type_ref.borrow_mut().resolve(l),
                    (Some(_), Some(_)) => type_ref.borrow_mut().resolve(TypeId::Bool),
                    _ => {}
                }
            }
            Expr::Variable { name, type_ref } => {
                let Some(binding) = self.binding_of(expression).cloned() else {
                    self.diagnostics.push(Diagnostic::NameResolution {
                        token: name.clone(),
                        message: format!("Undefined identifier '{}'", name.lexeme),
                    });
                    return;
                };
                match binding {
                    Binding::Variable { type_ref: slot, .. }
                    | Binding::Function { type_ref: slot, .. } => {
                        self.resolve_annotation(&slot);
                        if let Some(slot_type) = slot.borrow().resolved_type() {
                            type_ref.borrow_mut().resolve(slot_type);
                        }
                    }
                    Binding::Native { method } => {
                        type_ref.borrow_mut().resolve(method.return_type);
                    }
                    Binding::NativeObject { .. } | Binding::Class { .. } => {
                        type_ref.borrow_mut().resolve(TypeId::Object);
                    }
                }
            }
            Expr::Assign {
                name,
                value,
                type_ref,
            } => {
                self.check_expression(value);
                let Some(binding) = self.binding_of(expression).cloned() else {
                    self.diagnostics.push(Diagnostic::NameResolution {
                        token: name.clone(),
                        message: format!("Undefined variable '{}'", name.lexeme),
                    });
                    return;
                };
                if let Binding::Variable { type_ref: slot, .. } = binding {
                    self.resolve_annotation(&slot);
                    if let Some(slot_type) = slot.borrow().resolved_type() {
                        type_ref.borrow_mut().resolve(slot_type);
                        return;
                    }
                }
                if let Some(value_type) = value.type_ref().borrow().resolved_type() {
                    type_ref.borrow_mut().resolve(value_type);
                }
            }
            Expr::Call { .. } => self.check_call(expression),
            Expr::Get { object, .. } => {
                // Method dispatch on host objects happens at evaluation
                // time; the node's own slot may stay unresolved.
                self.check_expression(object);
            }
        }
    }

    fn check_binary(&mut self, expression: &Expr) {
        let Expr::Binary {
            left,
            operator,
            right,
            type_ref,
        } = expression
        else {
            return;
        };
        self.check_expression(left);
        self.check_expression(right);

        // An unresolved operand means an upstream diagnostic was already
        // recorded for it; this node is abandoned rather than piled on.
        let (Some(left_type), Some(right_type)) = (
            left.type_ref().borrow().resolved_type(),
            right.type_ref().borrow().resolved_type(),
        ) else {
            return;
        };

        if !left_type.is_comparable() || !right_type.is_comparable() {
            self.diagnostics.push(Diagnostic::TypeValidation {
                token: operator.clone(),
                message: format!(
                    "Operands of type {left_type} and {right_type} are not comparable"
                ),
            });
            return;
        }

        match operator.token_type {
            PLUS if left_type == TypeId::Str || right_type == TypeId::Str => {
                // String concatenation takes the left operand's type.
                type_ref.borrow_mut().resolve(left_type);
            }
            PLUS | MINUS | STAR | SLASH | PERCENT => {
                match promote(left_type, right_type) {
                    Some(promoted) => type_ref.borrow_mut().resolve(promoted),
                    None => self.diagnostics.push(Diagnostic::TypeValidation {
                        token: operator.clone(),
                        message: format!(
                            "Invalid operands of type {left_type} and {right_type} to binary operator '{}'",
                            operator.lexeme
                        ),
                    }),
                }
            }
            STAR_STAR => {
                if !left_type.is_arithmetic() || !right_type.is_arithmetic() {
                    self.diagnostics.push(Diagnostic::TypeValidation {
                        token: operator.clone(),
                        message: format!(
                            "Invalid operands of type {left_type} and {right_type} to binary operator '**'"
                        ),
                    });
                } else if left_type.is_floating() || right_type.is_floating() {
                    type_ref.borrow_mut().resolve(TypeId::Double);
                } else {
                    type_ref.borrow_mut().resolve(TypeId::BigInt);
                }
            }
            GREATER | GREATER_EQUAL | LESS | LESS_EQUAL | EQUAL_EQUAL | BANG_EQUAL => {
                type_ref.borrow_mut().resolve(TypeId::Bool);
            }
            _ => {
                self.diagnostics.push(Diagnostic::Internal {
                    message: format!(
                        "unexpected binary operator '{}' in type resolution",
                        operator.lexeme
                    ),
                });
            }
        }
    }

    fn check_call(&mut self, expression: &Expr) {
        let Expr::Call {
            callee,
            arguments,
            type_ref,
            ..
        } = expression
        else {
            return;
        };

        for argument in arguments {
            self.check_expression(argument);
        }

        match callee.as_ref() {
            Expr::Variable { name, .. } => {
                let Some(binding) = self.binding_of(callee).cloned() else {
                    self.diagnostics.push(Diagnostic::NameResolution {
                        token: name.clone(),
                        message: format!(
                            "Attempting to call undefined function '{}'",
                            name.lexeme
                        ),
                    });
                    return;
                };
                // Typing the callee also resolves its annotation, so the
                // binding's slot below is as resolved as it can get.
                self.check_expression(callee);
                match binding {
                    Binding::Function { type_ref: slot, .. }
                    | Binding::Variable { type_ref: slot, .. } => {
                        if let Some(slot_type) = slot.borrow().resolved_type() {
                            type_ref.borrow_mut().resolve(slot_type);
                        }
                    }
                    Binding::Native { method } => {
                        type_ref.borrow_mut().resolve(method.return_type);
                    }
                    Binding::NativeObject { .. } | Binding::Class { .. } => {
                        type_ref.borrow_mut().resolve(TypeId::Object);
                    }
                }
            }
            Expr::Get { object, name, .. } => {
                self.check_expression(object);
                let host_class = match self.binding_of(object) {
                    Some(Binding::NativeObject { class }) => Some(class.clone()),
                    _ => None,
                };
                if let Some(class) = host_class {
                    match class.method(&name.lexeme) {
                        Some(method) => {
                            type_ref.borrow_mut().resolve(method.return_type);
                        }
                        None => {
                            self.diagnostics.push(Diagnostic::NameResolution {
                                token: name.clone(),
                                message: format!(
                                    "Attempting to call undefined function '{}'",
                                    name.lexeme
                                ),
                            });
                        }
                    }
                }
            }
            other => {
                self.check_expression(other);
                if let Some(callee_type) = other.type_ref().borrow().resolved_type() {
                    type_ref.borrow_mut().resolve(callee_type);
                }
            }
        }
    }
}

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::binding::{Binding, GLOBAL_DISTANCE};
use crate::error::Diagnostic;
use crate::expr::Expr;
use crate::function::FunctionDecl;
use crate::native_functions::NativeRegistry;
use crate::stmt::Stmt;
use crate::token::Token;
use crate::types::{TypeId, TypeRef, TypeReference};

/// The resolver's verdicts, keyed by the address of the referring
/// expression node. Rebuilt from scratch on every resolution pass.
pub type BindingMap = HashMap<*const Expr, Binding>;

/// What a scope frame knows about one name. A `Declared` slot exists but
/// cannot be read yet; `define` upgrades it. There is no transition back.
#[derive(Debug, Clone)]
enum SlotState {
    Declared,
    Defined(DefinedSlot),
}

#[derive(Debug, Clone)]
struct DefinedSlot {
    type_ref: TypeRef,
    function: Option<Rc<FunctionDecl>>,
    class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionContext {
    None,
    Function,
}

/// Walks the statement list once after parsing and decides, for every
/// name-referring expression, where the name lives: a local slot at a
/// known distance, a global, or one of the host directories. Also catches
/// the purely lexical errors (duplicate declarations, reading a variable
/// in its own initializer, `return` outside a function).
pub struct Resolver<'a> {
    natives: &'a NativeRegistry,

    /// The stack of local scopes; the innermost is at the end. Global
    /// declarations go into the separate `globals` frame instead.
    scopes: Vec<IndexMap<String, SlotState>>,
    globals: IndexMap<String, SlotState>,

    bindings: BindingMap,
    current_function: FunctionContext,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    pub fn new(natives: &'a NativeRegistry) -> Self {
        Resolver {
            natives,
            scopes: Vec::new(),
            globals: IndexMap::new(),
            bindings: HashMap::new(),
            current_function: FunctionContext::None,
            diagnostics: Vec::new(),
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> (BindingMap, Vec<Diagnostic>) {
        self.resolve_statements(statements);
        (self.bindings, self.diagnostics)
    }

    fn resolve_statements(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_statement(statement);
        }
    }

    fn resolve_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_statements(statements);
                self.end_scope();
            }
            Stmt::Var {
                name,
                type_ref,
                initializer,
            } => {
                // Binding is split into declaring and defining so that an
                // initializer mentioning the variable itself is caught.
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expression(expr);
                }
                // The slot adopts the initializer's type slot; with no
                // initializer the annotation slot stands in.
                let slot_type = match initializer {
                    Some(expr) => Rc::clone(expr.type_ref()),
                    None => Rc::clone(type_ref),
                };
                self.define(name, slot_type, None, None);
            }
            Stmt::Function { declaration } => {
                // Declared and defined eagerly, so the body can refer to
                // the function recursively.
                self.declare(&declaration.name);
                self.define(
                    &declaration.name,
                    Rc::clone(&declaration.return_type),
                    Some(Rc::clone(declaration)),
                    None,
                );
                self.resolve_function(declaration);
            }
            Stmt::Class { name } => {
                self.declare(name);
                self.define(
                    name,
                    TypeReference::of(TypeId::Object),
                    None,
                    Some(name.lexeme.clone()),
                );
            }
            Stmt::Expression { expression } | Stmt::Print { expression } => {
                self.resolve_expression(expression);
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                // Static analysis is conservative: both branches could
                // run, so both are resolved.
                self.resolve_expression(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_statement(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionContext::None {
                    self.diagnostics.push(Diagnostic::Resolve {
                        token: keyword.clone(),
                        message: "Cannot return from top-level code.".to_string(),
                    });
                }
                if let Some(expr) = value {
                    self.resolve_expression(expr);
                }
            }
        }
    }

    fn resolve_expression(&mut self, expression: &Expr) {
        match expression {
            Expr::Variable { name, .. } => {
                self.resolve_local(expression, name);
            }
            Expr::Assign { name, value, .. } => {
                self.resolve_expression(value);
                self.resolve_local(expression, name);
            }
            Expr::Postfix { left, name, .. } => {
                self.resolve_expression(left);
                self.resolve_local(expression, name);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expression(left);
                self.resolve_expression(right);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expression(callee);
                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            Expr::Get { object, .. } => {
                // The property itself is dispatched by the evaluator;
                // only the object expression resolves here.
                self.resolve_expression(object);
            }
            Expr::Grouping { expression, .. } => {
                self.resolve_expression(expression);
            }
            Expr::Unary { right, .. } => {
                self.resolve_expression(right);
            }
            Expr::Literal { .. } | Expr::Empty { .. } => {}
        }
    }

    fn resolve_function(&mut self, declaration: &Rc<FunctionDecl>) {
        let enclosing = self.current_function;
        self.current_function = FunctionContext::Function;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(&param.name);
            self.define(&param.name, Rc::clone(&param.type_ref), None, None);
        }
        self.resolve_statements(&declaration.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Inserts the name into the innermost scope as not-ready-yet, so it
    /// shadows any outer one. Redeclaring inside one frame is an error;
    /// at global level declaration is a no-op and `define` takes over.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics.push(Diagnostic::Resolve {
                    token: name.clone(),
                    message: "Variable with this name already declared in this scope."
                        .to_string(),
                });
            }
            scope.insert(name.lexeme.clone(), SlotState::Declared);
        }
    }

    /// Marks the name fully initialized and available. At global level the
    /// slot lands in the globals frame, where a duplicate is the same
    /// error `declare` reports for locals.
    fn define(
        &mut self,
        name: &Token,
        type_ref: TypeRef,
        function: Option<Rc<FunctionDecl>>,
        class: Option<String>,
    ) {
        let slot = SlotState::Defined(DefinedSlot {
            type_ref,
            function,
            class,
        });
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), slot);
        } else {
            if self.globals.contains_key(&name.lexeme) {
                self.diagnostics.push(Diagnostic::Resolve {
                    token: name.clone(),
                    message: "Variable with this name already declared in this scope."
                        .to_string(),
                });
            }
            self.globals.insert(name.lexeme.clone(), slot);
        }
    }

    /// Works outwards from the innermost scope. The first frame holding
    /// the name wins; failing every frame, the lookup falls through to
    /// the native callables, the globals frame, and the host class and
    /// super-global directories. A name found nowhere gets no binding at
    /// all; the type passes report it as undefined.
    fn resolve_local(&mut self, expr: &Expr, name: &Token) {
        let key = expr as *const Expr;

        for (i, scope) in self.scopes.iter().enumerate().rev() {
            let Some(state) = scope.get(&name.lexeme) else {
                continue;
            };
            match state {
                SlotState::Declared => {
                    self.diagnostics.push(Diagnostic::Resolve {
                        token: name.clone(),
                        message: "Cannot read local variable in its own initializer."
                            .to_string(),
                    });
                }
                SlotState::Defined(slot) => {
                    let distance = (self.scopes.len() - 1 - i) as isize;
                    let binding = Self::slot_binding(slot, distance);
                    self.bindings.insert(key, binding);
                }
            }
            return;
        }

        if let Some(method) = self.natives.callable(&name.lexeme) {
            self.bindings.insert(key, Binding::Native { method });
            return;
        }

        if let Some(SlotState::Defined(slot)) = self.globals.get(&name.lexeme) {
            let binding = Self::slot_binding(slot, GLOBAL_DISTANCE);
            self.bindings.insert(key, binding);
            return;
        }

        if let Some(class) = self
            .natives
            .class(&name.lexeme)
            .or_else(|| self.natives.super_global(&name.lexeme))
        {
            self.bindings.insert(key, Binding::NativeObject { class });
        }
    }

    fn slot_binding(slot: &DefinedSlot, distance: isize) -> Binding {
        if let Some(declaration) = &slot.function {
            Binding::Function {
                declaration: Rc::clone(declaration),
                type_ref: Rc::clone(&slot.type_ref),
                distance,
            }
        } else if let Some(name) = &slot.class {
            Binding::Class { name: name.clone() }
        } else {
            Binding::Variable {
                type_ref: Rc::clone(&slot.type_ref),
                distance,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native_functions::default_registry;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let mut scanner = Scanner::new(source);
        let mut parser = Parser::new(scanner.scan_tokens());
        let statements = parser.parse();
        assert!(parser.take_diagnostics().is_empty(), "test source must parse");
        statements
    }

    fn resolve(statements: &[Stmt]) -> (BindingMap, Vec<Diagnostic>) {
        let natives = default_registry(vec![]);
        Resolver::new(&natives).resolve(statements)
    }

    fn messages(diagnostics: &[Diagnostic]) -> Vec<String> {
        diagnostics.iter().map(|d| d.to_string()).collect()
    }

    #[test]
    fn duplicate_declaration_in_one_scope_is_an_error() {
        let statements = parse("{ var a = 1; var a = 2; }");
        let (_, diagnostics) = resolve(&statements);
        assert_eq!(
            messages(&diagnostics),
            vec!["[line 1] Error at 'a': Variable with this name already declared in this scope."]
        );
    }

    #[test]
    fn duplicate_global_definition_is_an_error() {
        let statements = parse("var a = 42; var a = 44;");
        let (_, diagnostics) = resolve(&statements);
        assert_eq!(
            messages(&diagnostics),
            vec!["[line 1] Error at 'a': Variable with this name already declared in this scope."]
        );
    }

    #[test]
    fn shadowing_in_a_nested_scope_is_accepted() {
        let statements = parse("var a = 1; { var a = 2; { var a = 3; } }");
        let (_, diagnostics) = resolve(&statements);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_an_error() {
        let statements = parse("{ var a = a; }");
        let (_, diagnostics) = resolve(&statements);
        assert_eq!(
            messages(&diagnostics),
            vec!["[line 1] Error at 'a': Cannot read local variable in its own initializer."]
        );
    }

    #[test]
    fn returning_from_top_level_code_is_an_error() {
        let statements = parse("return 1;");
        let (_, diagnostics) = resolve(&statements);
        assert_eq!(
            messages(&diagnostics),
            vec!["[line 1] Error at 'return': Cannot return from top-level code."]
        );
    }

    fn print_operand(stmt: &Stmt) -> &Expr {
        match stmt {
            Stmt::Print { expression } => expression,
            other => panic!("expected a print statement, got {other:?}"),
        }
    }

    #[test]
    fn local_reads_know_their_scope_distance() {
        let statements = parse("{ var a = 1; { print a; print a; } print a; }");
        let (bindings, diagnostics) = resolve(&statements);
        assert!(diagnostics.is_empty());

        let Stmt::Block { statements: outer } = &statements[0] else {
            panic!("expected a block");
        };
        let Stmt::Block { statements: inner } = &outer[1] else {
            panic!("expected a nested block");
        };

        for stmt in inner {
            let expr = print_operand(stmt);
            let binding = bindings.get(&(expr as *const Expr)).expect("binding");
            assert_eq!(binding.distance(), Some(1));
        }
        let expr = print_operand(&outer[2]);
        let binding = bindings.get(&(expr as *const Expr)).expect("binding");
        assert_eq!(binding.distance(), Some(0));
    }

    #[test]
    fn global_reads_bind_at_distance_minus_one() {
        let statements = parse("var a = 1; print a;");
        let (bindings, diagnostics) = resolve(&statements);
        assert!(diagnostics.is_empty());

        let expr = print_operand(&statements[1]);
        let binding = bindings.get(&(expr as *const Expr)).expect("binding");
        assert_eq!(binding.distance(), Some(GLOBAL_DISTANCE));
        assert!(!binding.is_local());
    }

    #[test]
    fn host_directories_are_the_last_fallback() {
        let statements = parse("print clock; print Base64; print ARGV;");
        let (bindings, diagnostics) = resolve(&statements);
        assert!(diagnostics.is_empty());

        let clock = print_operand(&statements[0]);
        assert!(matches!(
            bindings.get(&(clock as *const Expr)),
            Some(Binding::Native { .. })
        ));
        let base64 = print_operand(&statements[1]);
        assert!(matches!(
            bindings.get(&(base64 as *const Expr)),
            Some(Binding::NativeObject { .. })
        ));
        let argv = print_operand(&statements[2]);
        assert!(matches!(
            bindings.get(&(argv as *const Expr)),
            Some(Binding::NativeObject { .. })
        ));
    }

    #[test]
    fn unknown_names_get_no_binding_and_no_resolver_diagnostic() {
        let statements = parse("print nowhere;");
        let (bindings, diagnostics) = resolve(&statements);
        assert!(diagnostics.is_empty());
        let expr = print_operand(&statements[0]);
        assert!(!bindings.contains_key(&(expr as *const Expr)));
    }

    #[test]
    fn resolving_twice_yields_identical_bindings() {
        let statements =
            parse("var g = 1; fun f(x: int): int { { print x; print g; } return x; } f(2);");
        let natives = default_registry(vec![]);
        let (first, first_diags) = Resolver::new(&natives).resolve(&statements);
        let (second, second_diags) = Resolver::new(&natives).resolve(&statements);

        assert!(first_diags.is_empty());
        assert!(second_diags.is_empty());
        assert_eq!(first.len(), second.len());
        for (key, binding) in &first {
            let other = second.get(key).expect("same nodes bound in both passes");
            assert_eq!(
                std::mem::discriminant(binding),
                std::mem::discriminant(other)
            );
            assert_eq!(binding.distance(), other.distance());
        }
    }
}

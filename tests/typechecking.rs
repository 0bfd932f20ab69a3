mod util;

use lingon::EvalResult;
use pretty_assertions::assert_eq;
use util::session;

#[test]
fn arity_mismatch_names_both_counts() {
    let mut session = session();
    session.eval("fun one(x: int): int { return x; }");
    session.eval("one();");
    session.eval("one(1, 2);");
    assert_eq!(
        session.reported(),
        vec![
            "[line 1] Error: Function 'one' has 1 parameter(s) but was called with 0 argument(s)",
            "[line 1] Error: Function 'one' has 1 parameter(s) but was called with 2 argument(s)",
        ]
    );
}

#[test]
fn argument_coercion_is_identity_only() {
    let mut session = session();
    session.eval("fun greet(who: string): void { print who; }");
    session.eval("greet(42);");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Cannot pass Int argument as parameter 'who: string' to greet()"]
    );

    // Numeric widening applies inside expressions, never at call sites.
    session.eval("fun take(x: long): void { print x; }");
    session.eval("take(1);");
    assert_eq!(
        session.reported()[1],
        "[line 1] Error: Cannot pass Int argument as parameter 'x: long' to take()"
    );
}

#[test]
fn unknown_annotation_names_are_reported() {
    let mut session = session();
    session.eval("var a: gurka = 1;");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Type not found: gurka"]
    );
}

#[test]
fn annotation_aliases_resolve() {
    let mut session = session();
    session.eval("var a: Int32 = 1; var b: String = \"x\"; print a; print b;");
    assert_eq!(session.reported(), Vec::<String>::new());
    assert_eq!(session.printed(), vec!["1", "x"]);
}

#[test]
fn a_declaration_needs_an_annotation_or_an_initializer() {
    let mut session = session();
    session.eval("var a;");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Cannot infer type of variable 'a' without an initializer"]
    );
}

#[test]
fn initializers_must_coerce_into_the_declared_type() {
    let mut session = session();
    session.eval("var a: string = 42;");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Cannot assign Int value to String variable 'a'"]
    );
}

#[test]
fn inferred_declarations_adopt_the_initializer_type() {
    let mut session = session();
    session.eval("var a = 42; var b: int = a; print b;");
    assert_eq!(session.reported(), Vec::<String>::new());
    assert_eq!(session.printed(), vec!["42"]);
}

#[test]
fn function_signatures_must_be_annotated() {
    let mut session = session();
    session.eval("fun f(x): void { print x; }");
    session.eval("fun g() { }");
    assert_eq!(
        session.reported(),
        vec![
            "[line 1] Error: Inferred typing is not yet supported for parameter 'x' to function 'f'",
            "[line 1] Error: Inferred typing is not yet supported for function 'g'",
        ]
    );
}

#[test]
fn redeclaring_a_global_is_a_resolve_error() {
    let mut session = session();
    session.eval("var a = 42;");
    let result = session.eval("var a = 44;");
    assert!(matches!(result, EvalResult::Empty));
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error at 'a': Variable with this name already declared in this scope."]
    );
    // The failed batch was discarded; the original value survives.
    session.eval("print a;");
    assert_eq!(session.printed(), vec!["42"]);
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    let mut session = session();
    session.eval("{ var a = a; }");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error at 'a': Cannot read local variable in its own initializer."]
    );
}

#[test]
fn returning_from_the_top_level_is_rejected() {
    let mut session = session();
    session.eval("return 1;");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error at 'return': Cannot return from top-level code."]
    );
}

#[test]
fn assigning_to_a_function_name_is_immutable() {
    let mut session = session();
    session.eval("fun f(): void { }");
    session.eval("f = 3;");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Cannot reassign immutable identifier 'f'"]
    );
}

#[test]
fn class_handles_are_not_comparable() {
    let mut session = session();
    session.eval("print Base64 == 1;");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Operands of type Object and Int are not comparable"]
    );
}

#[test]
fn diagnostics_follow_traversal_order() {
    let mut session = session();
    session.eval("var a: gurka = 1; var b: tomat = 2;");
    assert_eq!(
        session.reported(),
        vec![
            "[line 1] Error: Type not found: gurka",
            "[line 1] Error: Type not found: tomat",
        ]
    );
}

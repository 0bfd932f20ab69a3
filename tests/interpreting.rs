mod util;

use lingon::{EvalResult, Object};
use pretty_assertions::assert_eq;
use util::session;

#[test]
fn declares_and_prints_a_variable() {
    let mut session = session();
    session.eval("var a = 42; print a;");
    assert_eq!(session.printed(), vec!["42"]);
    assert_eq!(session.reported(), Vec::<String>::new());
}

#[test]
fn an_empty_program_produces_nothing() {
    let mut session = session();
    let result = session.eval("");
    assert!(matches!(result, EvalResult::Empty));
    assert_eq!(session.printed(), Vec::<String>::new());
    assert_eq!(session.reported(), Vec::<String>::new());
}

#[test]
fn blocks_shadow_without_clobbering() {
    let mut session = session();
    session.eval("var a = \"global\"; { var a = \"inner\"; print a; } print a;");
    assert_eq!(session.printed(), vec!["inner", "global"]);
}

#[test]
fn functions_close_over_their_declaration_scope() {
    let mut session = session();
    session.eval(
        "var x = \"outer\";\n\
         fun show(): void { print x; }\n\
         fun shadow(): void { var x = \"inner\"; show(); }\n\
         shadow();",
    );
    // `show` reads the global x, not the caller's local one.
    assert_eq!(session.printed(), vec!["outer"]);
}

#[test]
fn calls_return_values() {
    let mut session = session();
    session.eval("fun add(a: int, b: int): int { return a + b; } print add(40, 2);");
    assert_eq!(session.printed(), vec!["42"]);
}

#[test]
fn a_function_without_return_yields_null() {
    let mut session = session();
    session.eval("fun hello(): void { print 1; } hello();");
    assert_eq!(session.printed(), vec!["1"]);

    let result = session.eval("hello()");
    assert_eq!(session.printed(), vec!["1", "1"]);
    assert!(matches!(result, EvalResult::Value(Object::Null)));
}

#[test]
fn return_unwinds_out_of_nested_statements() {
    let mut session = session();
    session.eval(
        "fun find(limit: int): int {\n\
             var i = 0;\n\
             while (true) {\n\
                 if (i >= limit) { return i; }\n\
                 i = i + 1;\n\
             }\n\
         }\n\
         print find(3);",
    );
    assert_eq!(session.printed(), vec!["3"]);
}

#[test]
fn while_loops_run_to_their_condition() {
    let mut session = session();
    session.eval("var f = 1; var n = 1; while (n < 6) { f = f * n; n = n + 1; } print f;");
    assert_eq!(session.printed(), vec!["120"]);
}

#[test]
fn if_takes_the_truthy_branch() {
    let mut session = session();
    session.eval("if (1 < 2) { print \"then\"; } else { print \"else\"; }");
    session.eval("if (null) { print \"then\"; } else { print \"else\"; }");
    assert_eq!(session.printed(), vec!["then", "else"]);
}

#[test]
fn logical_operators_short_circuit_and_keep_operand_values() {
    let mut session = session();
    session.eval("fun boom(): bool { print \"evaluated\"; return true; }");
    session.eval("print false && boom();");
    session.eval("print true || boom();");
    // Neither call ever ran.
    assert_eq!(session.printed(), vec!["false", "true"]);
}

#[test]
fn postfix_operators_return_the_previous_value() {
    let mut session = session();
    session.eval("var i = 5; print i++; print i; print i--; print i;");
    assert_eq!(session.printed(), vec!["5", "6", "6", "5"]);
}

#[test]
fn integer_division_truncates_in_kind() {
    let mut session = session();
    session.eval("print 7 / 2;");
    assert_eq!(session.printed(), vec!["3"]);
}

#[test]
fn arithmetic_follows_precedence() {
    let mut session = session();
    session.eval("print 10 - 4 * 2;");
    session.eval("print (10 - 4) * 2;");
    assert_eq!(session.printed(), vec!["2", "12"]);
}

#[test]
fn string_concatenation() {
    let mut session = session();
    session.eval("print \"hej\" + \" \" + \"hej\";");
    assert_eq!(session.printed(), vec!["hej hej"]);
}

#[test]
fn power_uses_big_integers() {
    let mut session = session();
    session.eval("print 2 ** 100;");
    assert_eq!(session.printed(), vec!["1267650600228229401496703205376"]);
}

#[test]
fn power_with_floats_stays_floating() {
    let mut session = session();
    session.eval("print 2.0 ** 10;");
    assert_eq!(session.printed(), vec!["1024"]);
}

#[test]
fn null_equality_semantics() {
    let mut session = session();
    session.eval("print null == null; print null == 1; print 1 == 1;");
    assert_eq!(session.printed(), vec!["true", "false", "true"]);
}

#[test]
fn numbers_widen_across_kinds() {
    let mut session = session();
    // The left literal is too wide for an int, so the sum is computed as
    // longs and does not overflow.
    session.eval("print 2147483648 + 1;");
    assert_eq!(session.reported(), Vec::<String>::new());
    assert_eq!(session.printed(), vec!["2147483649"]);
}

#[test]
fn division_by_zero_is_a_runtime_error() {
    let mut session = session();
    let result = session.eval("print 1 / 0;");
    assert!(matches!(result, EvalResult::VoidMarker));
    assert_eq!(
        session.reported(),
        vec!["[line 1] Attempted to divide by zero"]
    );
    assert_eq!(session.printed(), Vec::<String>::new());
}

#[test]
fn integer_overflow_is_a_runtime_error() {
    let mut session = session();
    let result = session.eval("print 2147483647 + 2147483647;");
    assert!(matches!(result, EvalResult::VoidMarker));
    assert_eq!(session.reported(), vec!["[line 1] Integer overflow"]);
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    let mut session = session();
    session.eval("var a = 1;");
    let result = session.eval("a();");
    assert!(matches!(result, EvalResult::VoidMarker));
    assert_eq!(
        session.reported(),
        vec!["[line 1] Can only call functions and native methods."]
    );
}

mod util;

use lingon::{EvalResult, Object};
use pretty_assertions::assert_eq;
use util::{session, session_with_arguments};

#[test]
fn base64_decode_returns_the_plain_string() {
    let mut session = session();
    let result = session.eval("Base64.decode(\"aGVqIGhlag==\")");
    match result {
        EvalResult::Value(Object::Str(s)) => assert_eq!(s, "hej hej"),
        other => panic!("expected a string value, got {other:?}"),
    }
}

#[test]
fn base64_decode_accepts_unpadded_input() {
    let mut session = session();
    let result = session.eval("Base64.decode(\"aGVqIGhlag\")");
    match result {
        EvalResult::Value(Object::Str(s)) => assert_eq!(s, "hej hej"),
        other => panic!("expected a string value, got {other:?}"),
    }
}

#[test]
fn base64_encode_pads_its_output() {
    let mut session = session();
    session.eval("print Base64.encode(\"hej hej\");");
    assert_eq!(session.printed(), vec!["aGVqIGhlag=="]);
}

#[test]
fn base64_decode_with_no_arguments_is_an_arity_error() {
    let mut session = session();
    session.eval("Base64.decode()");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Method 'decode' has 1 parameter(s) but was called with 0 argument(s)"]
    );
}

#[test]
fn base64_decode_rejects_a_float_argument() {
    let mut session = session();
    session.eval("Base64.decode(123.45)");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Cannot pass Float argument as String parameter to decode()"]
    );
}

#[test]
fn base64_decode_propagates_host_errors_with_the_call_site() {
    let mut session = session();
    let result = session.eval("Base64.decode(\"a!b\")");
    assert!(matches!(result, EvalResult::VoidMarker));
    assert_eq!(
        session.reported(),
        vec!["[line 1] Invalid base64 character '!'"]
    );
}

#[test]
fn undefined_native_methods_are_reported() {
    let mut session = session();
    session.eval("Base64.compress(\"x\")");
    assert_eq!(
        session.reported(),
        vec!["[line 1] Error: Attempting to call undefined function 'compress'"]
    );
}

#[test]
fn argv_pop_consumes_arguments_front_first() {
    let mut session = session_with_arguments(vec!["first".to_string(), "second".to_string()]);
    session.eval("print ARGV.pop(); print ARGV.pop();");
    assert_eq!(session.printed(), vec!["first", "second"]);
}

#[test]
fn argv_pop_with_no_arguments_left_is_a_runtime_error() {
    let mut session = session();
    let result = session.eval("ARGV.pop()");
    assert!(matches!(result, EvalResult::VoidMarker));
    assert_eq!(session.reported(), vec!["[line 1] No arguments left"]);
}

#[test]
fn clock_returns_seconds_since_the_epoch() {
    let mut session = session();
    let result = session.eval("clock()");
    match result {
        EvalResult::Value(Object::Double(seconds)) => {
            assert!(seconds > 1_000_000_000.0, "implausible clock: {seconds}");
        }
        other => panic!("expected a double, got {other:?}"),
    }
}

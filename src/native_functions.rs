use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::object::Object;
use crate::types::TypeId;

/// A host method body. Errors are plain messages; the evaluator annotates
/// them with the call-site token.
pub type NativeFn = Rc<dyn Fn(Vec<Object>) -> Result<Object, String>>;

/// Descriptor for one host-provided callable: the typed signature the
/// validator checks against, plus the body the evaluator invokes.
#[derive(Clone)]
pub struct NativeMethodDef {
    pub name: String,
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
    pub func: NativeFn,
}

impl fmt::Debug for NativeMethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// A host class or super-global object: a named bag of methods.
pub struct NativeClassDef {
    pub name: String,
    pub methods: IndexMap<String, Rc<NativeMethodDef>>,
}

impl NativeClassDef {
    pub fn method(&self, name: &str) -> Option<Rc<NativeMethodDef>> {
        self.methods.get(name).map(Rc::clone)
    }
}

impl fmt::Debug for NativeClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// The three host directories the resolver falls through to: callables
/// under global names, classes, and super-global objects.
pub struct NativeRegistry {
    pub callables: IndexMap<String, Rc<NativeMethodDef>>,
    pub classes: IndexMap<String, Rc<NativeClassDef>>,
    pub super_globals: IndexMap<String, Rc<NativeClassDef>>,
}

impl NativeRegistry {
    pub fn callable(&self, name: &str) -> Option<Rc<NativeMethodDef>> {
        self.callables.get(name).map(Rc::clone)
    }

    pub fn class(&self, name: &str) -> Option<Rc<NativeClassDef>> {
        self.classes.get(name).map(Rc::clone)
    }

    pub fn super_global(&self, name: &str) -> Option<Rc<NativeClassDef>> {
        self.super_globals.get(name).map(Rc::clone)
    }
}

/// The standard host library: `clock()`, the `Base64` class, and the
/// `ARGV` super-global fed from the CLI argument list.
pub fn default_registry(arguments: Vec<String>) -> NativeRegistry {
    let mut callables = IndexMap::new();
    callables.insert(
        "clock".to_string(),
        Rc::new(NativeMethodDef {
            name: "clock".to_string(),
            params: vec![],
            return_type: TypeId::Double,
            func: Rc::new(|_args| {
                let seconds = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|_| "System clock is before the Unix epoch".to_string())?
                    .as_secs_f64();
                Ok(Object::Double(seconds))
            }),
        }),
    );

    let mut classes = IndexMap::new();
    classes.insert("Base64".to_string(), Rc::new(base64_class()));

    let mut super_globals = IndexMap::new();
    super_globals.insert("ARGV".to_string(), Rc::new(argv_class(arguments)));

    NativeRegistry {
        callables,
        classes,
        super_globals,
    }
}

fn base64_class() -> NativeClassDef {
    let mut methods = IndexMap::new();
    methods.insert(
        "decode".to_string(),
        Rc::new(NativeMethodDef {
            name: "decode".to_string(),
            params: vec![TypeId::Str],
            return_type: TypeId::Str,
            func: Rc::new(|mut args| {
                let encoded = expect_string(args.remove(0))?;
                let bytes = decode_base64(&encoded)?;
                String::from_utf8(bytes)
                    .map(Object::Str)
                    .map_err(|_| "Decoded data is not valid UTF-8".to_string())
            }),
        }),
    );
    methods.insert(
        "encode".to_string(),
        Rc::new(NativeMethodDef {
            name: "encode".to_string(),
            params: vec![TypeId::Str],
            return_type: TypeId::Str,
            func: Rc::new(|mut args| {
                let plain = expect_string(args.remove(0))?;
                Ok(Object::Str(encode_base64(plain.as_bytes())))
            }),
        }),
    );
    NativeClassDef {
        name: "Base64".to_string(),
        methods,
    }
}

fn argv_class(arguments: Vec<String>) -> NativeClassDef {
    let remaining = Rc::new(RefCell::new(VecDeque::from(arguments)));
    let mut methods = IndexMap::new();
    methods.insert(
        "pop".to_string(),
        Rc::new(NativeMethodDef {
            name: "pop".to_string(),
            params: vec![],
            return_type: TypeId::Str,
            func: Rc::new(move |_args| {
                remaining
                    .borrow_mut()
                    .pop_front()
                    .map(Object::Str)
                    .ok_or_else(|| "No arguments left".to_string())
            }),
        }),
    );
    NativeClassDef {
        name: "ARGV".to_string(),
        methods,
    }
}

fn expect_string(value: Object) -> Result<String, String> {
    match value {
        Object::Str(s) => Ok(s),
        other => Err(format!("Expected a string argument, got {other}")),
    }
}

/// The standard base64 alphabet.
const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Padding character.
const PAD: u8 = b'=';

fn encode_base64(input: &[u8]) -> String {
    let mut out = Vec::with_capacity(input.len().div_ceil(3) * 4);
    for chunk in input.chunks(3) {
        let b0 = chunk[0];
        let b1 = chunk.get(1).copied().unwrap_or(0);
        let b2 = chunk.get(2).copied().unwrap_or(0);
        let group = (u32::from(b0) << 16) | (u32::from(b1) << 8) | u32::from(b2);
        out.push(BASE64_ALPHABET[(group >> 18) as usize & 0x3f]);
        out.push(BASE64_ALPHABET[(group >> 12) as usize & 0x3f]);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[(group >> 6) as usize & 0x3f]
        } else {
            PAD
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[group as usize & 0x3f]
        } else {
            PAD
        });
    }
    String::from_utf8(out).expect("alphabet is ASCII")
}

/// Decodes standard base64. Padding is optional, so both `aGVqIGhlag==`
/// and `aGVqIGhlag` are accepted.
fn decode_base64(input: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(input.len() / 4 * 3 + 2);
    let mut buffer = 0u32;
    let mut bits = 0u32;
    for &c in input.as_bytes() {
        if c == PAD {
            break;
        }
        buffer = (buffer << 6) | u32::from(decode_base64_char(c)?);
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
        }
    }
    Ok(out)
}

fn decode_base64_char(c: u8) -> Result<u8, String> {
    match c {
        b'A'..=b'Z' => Ok(c - b'A'),
        b'a'..=b'z' => Ok(c - b'a' + 26),
        b'0'..=b'9' => Ok(c - b'0' + 52),
        b'+' => Ok(62),
        b'/' => Ok(63),
        _ => Err(format!("Invalid base64 character '{}'", char::from(c))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_padded_and_unpadded_input() {
        assert_eq!(decode_base64("aGVqIGhlag==").unwrap(), b"hej hej");
        assert_eq!(decode_base64("aGVqIGhlag").unwrap(), b"hej hej");
    }

    #[test]
    fn rejects_characters_outside_the_alphabet() {
        let err = decode_base64("aGV!").unwrap_err();
        assert_eq!(err, "Invalid base64 character '!'");
    }

    #[test]
    fn encodes_with_padding() {
        assert_eq!(encode_base64(b"hej hej"), "aGVqIGhlag==");
        assert_eq!(encode_base64(b"hej"), "aGVq");
    }

    #[test]
    fn argv_pop_consumes_front_first_and_then_errors() {
        let registry = default_registry(vec!["first".to_string(), "second".to_string()]);
        let argv = registry.super_global("ARGV").unwrap();
        let pop = argv.method("pop").unwrap();
        assert!(matches!((pop.func)(vec![]), Ok(Object::Str(s)) if s == "first"));
        assert!(matches!((pop.func)(vec![]), Ok(Object::Str(s)) if s == "second"));
        assert_eq!((pop.func)(vec![]).unwrap_err(), "No arguments left");
    }
}

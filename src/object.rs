use std::cmp::Ordering;
use std::fmt::Display;
use std::rc::Rc;

use num_bigint::{BigInt, ToBigInt};
use num_traits::{Pow, Signed, ToPrimitive, Zero};

use crate::function::UserFunction;
use crate::native_functions::{NativeClassDef, NativeMethodDef};
use crate::types::TypeId;

/// A runtime value. The numeric variants mirror [`TypeId`]; operator
/// evaluation promotes both operands to the greater kind and applies the
/// operation there.
#[derive(Debug, Clone)]
pub enum Object {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    BigInt(BigInt),
    Str(String),
    Null,
    Function(Rc<UserFunction>),
    NativeClass(Rc<NativeClassDef>),
    NativeMethod(Rc<NativeMethodDef>),
    Class { name: String },
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::Bool(b) => write!(f, "{b}"),
            Object::Int(n) => write!(f, "{n}"),
            Object::UInt(n) => write!(f, "{n}"),
            Object::Long(n) => write!(f, "{n}"),
            Object::ULong(n) => write!(f, "{n}"),
            Object::Float(n) => write!(f, "{n}"),
            Object::Double(n) => write!(f, "{n}"),
            Object::BigInt(n) => write!(f, "{n}"),
            Object::Str(s) => f.write_str(s),
            Object::Null => f.write_str("null"),
            Object::Function(func) => write!(f, "<fn {}>", func.name()),
            Object::NativeMethod(method) => write!(f, "<native fn {}>", method.name),
            Object::NativeClass(class) => write!(f, "<class {}>", class.name),
            Object::Class { name } => write!(f, "<class {name}>"),
        }
    }
}

impl Object {
    /// The dynamic type, used to type literal expressions.
    pub fn type_id(&self) -> TypeId {
        match self {
            Object::Bool(_) => TypeId::Bool,
            Object::Int(_) => TypeId::Int,
            Object::UInt(_) => TypeId::UInt,
            Object::Long(_) => TypeId::Long,
            Object::ULong(_) => TypeId::ULong,
            Object::Float(_) => TypeId::Float,
            Object::Double(_) => TypeId::Double,
            Object::BigInt(_) => TypeId::BigInt,
            Object::Str(_) => TypeId::Str,
            Object::Null => TypeId::Null,
            Object::Function(_)
            | Object::NativeClass(_)
            | Object::NativeMethod(_)
            | Object::Class { .. } => TypeId::Object,
        }
    }

    /// `null` is falsey, booleans are themselves, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Object::Bool(b) => *b,
            Object::Null => false,
            _ => true,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.type_id().is_arithmetic()
    }

    /// Structural equality with null handling: `null == null`, but `null`
    /// never equals a non-null value. Numeric operands compare by value
    /// after promotion.
    pub fn is_equal(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Null, _) | (_, Object::Null) => false,
            (Object::Bool(a), Object::Bool(b)) => a == b,
            (Object::Str(a), Object::Str(b)) => a == b,
            _ if self.is_numeric() && other.is_numeric() => {
                matches!(compare(self, other), Ok(Ordering::Equal))
            }
            _ => false,
        }
    }

    /// The unit value in this operand's own kind, used by postfix `++`/`--`.
    pub fn one_like(&self) -> Option<Object> {
        match self {
            Object::Int(_) => Some(Object::Int(1)),
            Object::UInt(_) => Some(Object::UInt(1)),
            Object::Long(_) => Some(Object::Long(1)),
            Object::ULong(_) => Some(Object::ULong(1)),
            Object::Float(_) => Some(Object::Float(1.0)),
            Object::Double(_) => Some(Object::Double(1.0)),
            Object::BigInt(_) => Some(Object::BigInt(BigInt::from(1))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// Both operands converted to their promoted common kind.
enum NumPair {
    Int(i32, i32),
    UInt(u32, u32),
    Long(i64, i64),
    ULong(u64, u64),
    Float(f32, f32),
    Double(f64, f64),
    Big(BigInt, BigInt),
}

const NOT_NUMBERS: &str = "Operands must be numbers.";
const OVERFLOW: &str = "Integer overflow";
const DIV_BY_ZERO: &str = "Attempted to divide by zero";

fn as_u32(value: &Object) -> Result<u32, String> {
    match value {
        Object::Int(n) => u32::try_from(*n).map_err(|_| OVERFLOW.to_string()),
        Object::UInt(n) => Ok(*n),
        _ => Err(NOT_NUMBERS.to_string()),
    }
}

fn as_i64(value: &Object) -> Result<i64, String> {
    match value {
        Object::Int(n) => Ok(i64::from(*n)),
        Object::UInt(n) => Ok(i64::from(*n)),
        Object::Long(n) => Ok(*n),
        _ => Err(NOT_NUMBERS.to_string()),
    }
}

fn as_u64(value: &Object) -> Result<u64, String> {
    match value {
        Object::Int(n) => u64::try_from(*n).map_err(|_| OVERFLOW.to_string()),
        Object::UInt(n) => Ok(u64::from(*n)),
        Object::Long(n) => u64::try_from(*n).map_err(|_| OVERFLOW.to_string()),
        Object::ULong(n) => Ok(*n),
        _ => Err(NOT_NUMBERS.to_string()),
    }
}

fn as_f32(value: &Object) -> Result<f32, String> {
    match value {
        Object::Int(n) => Ok(*n as f32),
        Object::UInt(n) => Ok(*n as f32),
        Object::Long(n) => Ok(*n as f32),
        Object::ULong(n) => Ok(*n as f32),
        Object::Float(n) => Ok(*n),
        _ => Err(NOT_NUMBERS.to_string()),
    }
}

fn as_f64(value: &Object) -> Result<f64, String> {
    match value {
        Object::Int(n) => Ok(f64::from(*n)),
        Object::UInt(n) => Ok(f64::from(*n)),
        Object::Long(n) => Ok(*n as f64),
        Object::ULong(n) => Ok(*n as f64),
        Object::Float(n) => Ok(f64::from(*n)),
        Object::Double(n) => Ok(*n),
        _ => Err(NOT_NUMBERS.to_string()),
    }
}

fn as_bigint(value: &Object) -> Result<BigInt, String> {
    match value {
        Object::Int(n) => Ok(BigInt::from(*n)),
        Object::UInt(n) => Ok(BigInt::from(*n)),
        Object::Long(n) => Ok(BigInt::from(*n)),
        Object::ULong(n) => Ok(BigInt::from(*n)),
        Object::Float(n) => n.to_bigint().ok_or_else(|| NOT_NUMBERS.to_string()),
        Object::Double(n) => n.to_bigint().ok_or_else(|| NOT_NUMBERS.to_string()),
        Object::BigInt(n) => Ok(n.clone()),
        _ => Err(NOT_NUMBERS.to_string()),
    }
}

fn promote_pair(left: &Object, right: &Object) -> Result<NumPair, String> {
    let promoted = crate::types::promote(left.type_id(), right.type_id())
        .ok_or_else(|| NOT_NUMBERS.to_string())?;
    let pair = match promoted {
        TypeId::Int => match (left, right) {
            (Object::Int(a), Object::Int(b)) => NumPair::Int(*a, *b),
            _ => return Err(NOT_NUMBERS.to_string()),
        },
        TypeId::UInt => NumPair::UInt(as_u32(left)?, as_u32(right)?),
        TypeId::Long => NumPair::Long(as_i64(left)?, as_i64(right)?),
        TypeId::ULong => NumPair::ULong(as_u64(left)?, as_u64(right)?),
        TypeId::Float => NumPair::Float(as_f32(left)?, as_f32(right)?),
        TypeId::Double => NumPair::Double(as_f64(left)?, as_f64(right)?),
        TypeId::BigInt => NumPair::Big(as_bigint(left)?, as_bigint(right)?),
        _ => return Err(NOT_NUMBERS.to_string()),
    };
    Ok(pair)
}

macro_rules! checked {
    ($op:expr, $a:expr, $b:expr, $wrap:expr, $add:ident, $sub:ident, $mul:ident, $div:ident, $rem:ident) => {
        match $op {
            ArithOp::Add => $a.$add($b).map($wrap).ok_or_else(|| OVERFLOW.to_string()),
            ArithOp::Sub => $a.$sub($b).map($wrap).ok_or_else(|| OVERFLOW.to_string()),
            ArithOp::Mul => $a.$mul($b).map($wrap).ok_or_else(|| OVERFLOW.to_string()),
            ArithOp::Div if $b == 0 => Err(DIV_BY_ZERO.to_string()),
            ArithOp::Div => $a.$div($b).map($wrap).ok_or_else(|| OVERFLOW.to_string()),
            ArithOp::Rem if $b == 0 => Err(DIV_BY_ZERO.to_string()),
            ArithOp::Rem => $a.$rem($b).map($wrap).ok_or_else(|| OVERFLOW.to_string()),
        }
    };
}

/// `+ - * / %` over two numeric values. Integer kinds use checked
/// arithmetic, big integers are exact, floats follow IEEE semantics.
pub fn arithmetic(op: ArithOp, left: &Object, right: &Object) -> Result<Object, String> {
    match promote_pair(left, right)? {
        NumPair::Int(a, b) => checked!(
            op,
            a,
            b,
            Object::Int,
            checked_add,
            checked_sub,
            checked_mul,
            checked_div,
            checked_rem
        ),
        NumPair::UInt(a, b) => checked!(
            op,
            a,
            b,
            Object::UInt,
            checked_add,
            checked_sub,
            checked_mul,
            checked_div,
            checked_rem
        ),
        NumPair::Long(a, b) => checked!(
            op,
            a,
            b,
            Object::Long,
            checked_add,
            checked_sub,
            checked_mul,
            checked_div,
            checked_rem
        ),
        NumPair::ULong(a, b) => checked!(
            op,
            a,
            b,
            Object::ULong,
            checked_add,
            checked_sub,
            checked_mul,
            checked_div,
            checked_rem
        ),
        NumPair::Float(a, b) => Ok(Object::Float(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
        })),
        NumPair::Double(a, b) => Ok(Object::Double(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::Rem => a % b,
        })),
        NumPair::Big(a, b) => match op {
            ArithOp::Add => Ok(Object::BigInt(a + b)),
            ArithOp::Sub => Ok(Object::BigInt(a - b)),
            ArithOp::Mul => Ok(Object::BigInt(a * b)),
            ArithOp::Div if b.is_zero() => Err(DIV_BY_ZERO.to_string()),
            ArithOp::Div => Ok(Object::BigInt(a / b)),
            ArithOp::Rem if b.is_zero() => Err(DIV_BY_ZERO.to_string()),
            ArithOp::Rem => Ok(Object::BigInt(a % b)),
        },
    }
}

/// Numeric comparison after promotion, for `> >= < <=` and numeric `==`.
pub fn compare(left: &Object, right: &Object) -> Result<Ordering, String> {
    let ordering = match promote_pair(left, right)? {
        NumPair::Int(a, b) => a.partial_cmp(&b),
        NumPair::UInt(a, b) => a.partial_cmp(&b),
        NumPair::Long(a, b) => a.partial_cmp(&b),
        NumPair::ULong(a, b) => a.partial_cmp(&b),
        NumPair::Float(a, b) => a.partial_cmp(&b),
        NumPair::Double(a, b) => a.partial_cmp(&b),
        NumPair::Big(a, b) => a.partial_cmp(&b),
    };
    ordering.ok_or_else(|| NOT_NUMBERS.to_string())
}

/// `**`: big-integer power unless either operand is floating or the
/// exponent is negative, in which case the computation happens in `f64`.
pub fn power(left: &Object, right: &Object) -> Result<Object, String> {
    if !left.is_numeric() || !right.is_numeric() {
        return Err(NOT_NUMBERS.to_string());
    }

    let negative_exponent = match right {
        Object::Int(n) => *n < 0,
        Object::Long(n) => *n < 0,
        Object::BigInt(n) => n.is_negative(),
        _ => false,
    };
    if left.type_id().is_floating() || right.type_id().is_floating() || negative_exponent {
        return Ok(Object::Double(as_f64(left)?.powf(as_f64(right)?)));
    }

    let base = as_bigint(left)?;
    let exponent = match right {
        Object::BigInt(n) => n.to_u64(),
        _ => as_u64(right).ok(),
    }
    .ok_or_else(|| "Exponent is too large".to_string())?;
    Ok(Object::BigInt(Pow::pow(base, exponent)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_widens_to_the_larger_operand() {
        let sum = arithmetic(ArithOp::Add, &Object::Int(1), &Object::Long(2)).unwrap();
        assert!(matches!(sum, Object::Long(3)));

        let sum = arithmetic(ArithOp::Add, &Object::Int(1), &Object::Double(0.5)).unwrap();
        assert!(matches!(sum, Object::Double(v) if v == 1.5));
    }

    #[test]
    fn integer_division_by_zero_is_an_error() {
        let err = arithmetic(ArithOp::Div, &Object::Int(1), &Object::Int(0)).unwrap_err();
        assert_eq!(err, DIV_BY_ZERO);
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let err = arithmetic(ArithOp::Add, &Object::Int(i32::MAX), &Object::Int(1)).unwrap_err();
        assert_eq!(err, OVERFLOW);
    }

    #[test]
    fn power_uses_big_integers_for_integral_operands() {
        let value = power(&Object::Int(2), &Object::Int(100)).unwrap();
        match value {
            Object::BigInt(n) => assert_eq!(n.to_string(), "1267650600228229401496703205376"),
            other => panic!("expected big integer, got {other:?}"),
        }
    }

    #[test]
    fn power_with_negative_exponent_is_floating() {
        let value = power(&Object::Int(2), &Object::Int(-2)).unwrap();
        assert!(matches!(value, Object::Double(v) if v == 0.25));
    }

    #[test]
    fn null_equality() {
        assert!(Object::Null.is_equal(&Object::Null));
        assert!(!Object::Null.is_equal(&Object::Int(0)));
        assert!(!Object::Int(0).is_equal(&Object::Null));
    }

    #[test]
    fn numeric_equality_crosses_kinds() {
        assert!(Object::Int(42).is_equal(&Object::Long(42)));
        assert!(!Object::Int(42).is_equal(&Object::Long(43)));
    }
}

//! Runtime values of sketch script
//!
//! Numbers keep the C flavour of the sketches they come from: integers stay
//! integers (wrapping `i64` arithmetic, truncating division) until a float
//! enters the expression.

use core::cmp::Ordering;
use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use super::ast::{BinaryOp, CastKind, FunctionDecl, UnaryOp};
use super::scope::WeakScope;
use crate::capabilities::Builtin;
use crate::channel::ButtonId;
use crate::error::CallError;
use crate::strip::StripId;

/// Native object reachable from script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Strip(StripId),
    Button(ButtonId),
    Serial,
    /// Static color helpers (`Adafruit_NeoPixel::Color` and friends)
    NeoPixel,
}

/// A script function together with the scope it was declared in
#[derive(Debug)]
pub struct Closure {
    pub decl: Rc<FunctionDecl>,
    pub scope: WeakScope,
}

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Array(Rc<RefCell<Vec<Value>>>),
    Function(Rc<Closure>),
    Builtin(Builtin),
    Object(Handle),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        loose_eq(self, other)
    }
}

enum Numeric {
    Int(i64),
    Float(f64),
}

impl Value {
    pub fn array(items: Vec<Self>) -> Self {
        Self::Array(Rc::new(RefCell::new(items)))
    }

    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Bool(_) => "bool",
            Self::Int(_) | Self::Float(_) => "number",
            Self::Str(_) => "string",
            Self::Array(_) => "array",
            Self::Function(_) | Self::Builtin(_) => "function",
            Self::Object(_) => "object",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined => false,
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Float(x) => *x != 0.0 && !x.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::Array(_) | Self::Function(_) | Self::Builtin(_) | Self::Object(_) => true,
        }
    }

    fn numeric(&self) -> Result<Numeric, CallError> {
        match self {
            Self::Int(n) => Ok(Numeric::Int(*n)),
            Self::Float(x) => Ok(Numeric::Float(*x)),
            Self::Bool(b) => Ok(Numeric::Int(i64::from(*b))),
            other => Err(CallError::type_error(format!(
                "expected a number, found {}",
                other.type_name()
            ))),
        }
    }

    /// Integer view; floats truncate toward zero
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Result<i64, CallError> {
        Ok(match self.numeric()? {
            Numeric::Int(n) => n,
            Numeric::Float(x) => x as i64,
        })
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Result<f64, CallError> {
        Ok(match self.numeric()? {
            Numeric::Int(n) => n as f64,
            Numeric::Float(x) => x,
        })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }
}

impl fmt::Display for Value {
    /// Formats the way `Serial.print` does
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Bool(b) => write!(f, "{}", u8::from(*b)),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x:.2}"),
            Self::Str(s) => f.write_str(s),
            Self::Array(items) => {
                let items = items.borrow();
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Function(closure) => write!(f, "function {}", closure.decl.name),
            Self::Builtin(builtin) => write!(f, "function {}", builtin.name()),
            Self::Object(handle) => write!(f, "{handle:?}"),
        }
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Undefined, Value::Undefined) => true,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
        (Value::Builtin(a), Value::Builtin(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a == b,
        _ => match (left.numeric(), right.numeric()) {
            (Ok(Numeric::Int(a)), Ok(Numeric::Int(b))) => a == b,
            (Ok(_), Ok(_)) => match (left.as_f64(), right.as_f64()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            },
            _ => false,
        },
    }
}

fn compare(left: &Value, right: &Value) -> Result<Option<Ordering>, CallError> {
    if let (Value::Str(a), Value::Str(b)) = (left, right) {
        return Ok(Some(a.cmp(b)));
    }
    Ok(match (left.numeric()?, right.numeric()?) {
        (Numeric::Int(a), Numeric::Int(b)) => Some(a.cmp(&b)),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    })
}

/// Apply a binary operator
pub(super) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, CallError> {
    match op {
        BinaryOp::Add => {
            if matches!(left, Value::Str(_)) || matches!(right, Value::Str(_)) {
                return Ok(Value::Str(format!("{left}{right}").into()));
            }
            arithmetic(left, right, i64::wrapping_add, |a, b| a + b)
        }
        BinaryOp::Sub => arithmetic(left, right, i64::wrapping_sub, |a, b| a - b),
        BinaryOp::Mul => arithmetic(left, right, i64::wrapping_mul, |a, b| a * b),
        BinaryOp::Div | BinaryOp::Rem => divide(op, left, right),
        BinaryOp::BitAnd => Ok(Value::Int(left.as_i64()? & right.as_i64()?)),
        BinaryOp::BitOr => Ok(Value::Int(left.as_i64()? | right.as_i64()?)),
        BinaryOp::BitXor => Ok(Value::Int(left.as_i64()? ^ right.as_i64()?)),
        BinaryOp::Shl | BinaryOp::Shr => {
            let value = left.as_i64()?;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let shift = (right.as_i64()? & 63) as u32;
            Ok(Value::Int(if op == BinaryOp::Shl {
                value.wrapping_shl(shift)
            } else {
                value.wrapping_shr(shift)
            }))
        }
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_eq(left, right))),
        BinaryOp::Lt => Ok(Value::Bool(compare(left, right)? == Some(Ordering::Less))),
        BinaryOp::Gt => Ok(Value::Bool(compare(left, right)? == Some(Ordering::Greater))),
        BinaryOp::Le => Ok(Value::Bool(matches!(
            compare(left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        ))),
        BinaryOp::Ge => Ok(Value::Bool(matches!(
            compare(left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ))),
    }
}

fn arithmetic(
    left: &Value,
    right: &Value,
    int: fn(i64, i64) -> i64,
    float: fn(f64, f64) -> f64,
) -> Result<Value, CallError> {
    match (left.numeric()?, right.numeric()?) {
        (Numeric::Int(a), Numeric::Int(b)) => Ok(Value::Int(int(a, b))),
        _ => Ok(Value::Float(float(left.as_f64()?, right.as_f64()?))),
    }
}

fn divide(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, CallError> {
    match (left.numeric()?, right.numeric()?) {
        (Numeric::Int(_), Numeric::Int(0)) => Err(CallError::type_error("division by zero")),
        (Numeric::Int(a), Numeric::Int(b)) => Ok(Value::Int(if op == BinaryOp::Div {
            a.wrapping_div(b)
        } else {
            a.wrapping_rem(b)
        })),
        _ => {
            let (a, b) = (left.as_f64()?, right.as_f64()?);
            Ok(Value::Float(if op == BinaryOp::Div { a / b } else { a % b }))
        }
    }
}

/// Apply a unary operator
pub(super) fn unary(op: UnaryOp, operand: &Value) -> Result<Value, CallError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
        UnaryOp::BitNot => Ok(Value::Int(!operand.as_i64()?)),
        UnaryOp::Neg => Ok(match operand.numeric()? {
            Numeric::Int(n) => Value::Int(n.wrapping_neg()),
            Numeric::Float(x) => Value::Float(-x),
        }),
        UnaryOp::Plus => Ok(match operand.numeric()? {
            Numeric::Int(n) => Value::Int(n),
            Numeric::Float(x) => Value::Float(x),
        }),
    }
}

/// Convert like a C cast
pub(super) fn cast(kind: CastKind, value: &Value) -> Result<Value, CallError> {
    match kind {
        CastKind::Float => Ok(Value::Float(value.as_f64()?)),
        CastKind::Bool => Ok(Value::Bool(value.truthy())),
        CastKind::Int { bits: 64, .. } => Ok(Value::Int(value.as_i64()?)),
        CastKind::Int { bits, signed } => {
            let modulus = 1i64 << bits;
            let wrapped = value.as_i64()? & (modulus - 1);
            Ok(Value::Int(if signed && wrapped >= modulus >> 1 {
                wrapped - modulus
            } else {
                wrapped
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_division_truncates() {
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(-7), &Value::Int(2)),
            Ok(Value::Int(-3))
        );
        assert_eq!(
            binary(BinaryOp::Div, &Value::Float(7.0), &Value::Int(2)),
            Ok(Value::Float(3.5))
        );
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        assert!(binary(BinaryOp::Rem, &Value::Int(1), &Value::Int(0)).is_err());
    }

    #[test]
    fn test_string_concatenation() {
        let joined = binary(BinaryOp::Add, &Value::Str("n=".into()), &Value::Int(4));
        assert_eq!(joined, Ok(Value::Str("n=4".into())));
    }

    #[test]
    fn test_casts_wrap() {
        let int8 = |signed| CastKind::Int { bits: 8, signed };
        assert_eq!(cast(int8(false), &Value::Int(300)), Ok(Value::Int(44)));
        assert_eq!(cast(int8(true), &Value::Int(200)), Ok(Value::Int(-56)));
        assert_eq!(cast(int8(false), &Value::Float(3.9)), Ok(Value::Int(3)));
    }

    #[test]
    fn test_bool_is_numeric() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Bool(true), &Value::Int(1)),
            Ok(Value::Int(2))
        );
        assert_eq!(Value::Bool(true).to_string(), "1");
    }

    #[test]
    fn test_undefined_is_not_a_number() {
        assert!(binary(BinaryOp::Sub, &Value::Undefined, &Value::Int(1)).is_err());
    }
}

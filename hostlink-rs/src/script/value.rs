//! Runtime value type for the reference engine.
//!
//! The engine is dynamically typed.  Text is reference-counted inside the
//! engine; anything that leaves it goes through [`crate::marshal`], which
//! copies.

use std::fmt;
use std::rc::Rc;

use crate::trampoline::FunctionHandle;
use crate::value::OpaqueHandle;

use super::stmt::Stmt;

/// A function defined in script source.
#[derive(Debug)]
pub struct ScriptFn {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

/// A script runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Nil,
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Closure(Rc<ScriptFn>),
    Foreign(FunctionHandle),
    Opaque(OpaqueHandle),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Value {
        Value::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(items))
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Name of the type, as returned by the `type()` builtin.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "text",
            Value::List(_) => "list",
            Value::Closure(_) => "function",
            Value::Foreign(_) => "foreign function",
            Value::Opaque(_) => "opaque",
        }
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => a
                .checked_add(*b)
                .map(Value::Int)
                .ok_or_else(|| "integer overflow".to_owned()),
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::str(format!("{self}{rhs}"))),
            (Value::List(a), Value::List(b)) => {
                let mut items = Vec::with_capacity(a.len() + b.len());
                items.extend(a.iter().cloned());
                items.extend(b.iter().cloned());
                Ok(Value::list(items))
            }
            _ => Err(binop_error("add", self, rhs)),
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = int_pair("subtract", self, rhs)?;
        a.checked_sub(b).map(Value::Int).ok_or_else(|| "integer overflow".to_owned())
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = int_pair("multiply", self, rhs)?;
        a.checked_mul(b).map(Value::Int).ok_or_else(|| "integer overflow".to_owned())
    }

    pub fn arith_div(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = int_pair("divide", self, rhs)?;
        if b == 0 {
            return Err("division by zero".into());
        }
        a.checked_div(b).map(Value::Int).ok_or_else(|| "integer overflow".to_owned())
    }

    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, String> {
        let (a, b) = int_pair("take remainder of", self, rhs)?;
        if b == 0 {
            return Err("modulo by zero".into());
        }
        a.checked_rem(b).map(Value::Int).ok_or_else(|| "integer overflow".to_owned())
    }

    pub fn arith_neg(&self) -> Result<Value, String> {
        match self {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| "integer overflow".to_owned()),
            other => Err(format!("cannot negate {}", other.type_name())),
        }
    }

    /// Ordering for `<`, `<=`, `>`, `>=`: integers and text only.
    pub fn cmp_value(&self, rhs: &Value) -> Result<std::cmp::Ordering, String> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => Err(binop_error("compare", self, rhs)),
        }
    }
}

fn int_pair(verb: &str, a: &Value, b: &Value) -> Result<(i64, i64), String> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok((*x, *y)),
        _ => Err(binop_error(verb, a, b)),
    }
}

fn binop_error(verb: &str, a: &Value, b: &Value) -> String {
    format!("cannot {verb} {} and {}", a.type_name(), b.type_name())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Foreign(a), Value::Foreign(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Closure(func) => write!(f, "<fn {}>", func.name),
            Value::Foreign(h) => write!(f, "<foreign fn {}>", h.name()),
            Value::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::str(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Value::Int(42).to_string(), "42");
        assert_eq!(Value::str("hello").to_string(), "hello");
        assert_eq!(Value::Bool(true).to_string(), "true");
        assert_eq!(Value::Nil.to_string(), "nil");
        assert_eq!(
            Value::list(vec![Value::Int(1), Value::str("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Int(0).is_truthy());
        assert!(Value::str("").is_truthy());
    }

    #[test]
    fn arithmetic() {
        let a = Value::Int(10);
        let b = Value::Int(3);
        assert_eq!(a.arith_add(&b), Ok(Value::Int(13)));
        assert_eq!(a.arith_sub(&b), Ok(Value::Int(7)));
        assert_eq!(a.arith_mul(&b), Ok(Value::Int(30)));
        assert_eq!(a.arith_div(&b), Ok(Value::Int(3)));
        assert_eq!(a.arith_rem(&b), Ok(Value::Int(1)));
    }

    #[test]
    fn div_by_zero() {
        assert_eq!(Value::Int(1).arith_div(&Value::Int(0)), Err("division by zero".into()));
        assert!(Value::Int(1).arith_rem(&Value::Int(0)).is_err());
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(Value::Int(i64::MAX).arith_add(&Value::Int(1)).is_err());
        assert!(Value::Int(i64::MIN).arith_neg().is_err());
        assert!(Value::Int(i64::MIN).arith_div(&Value::Int(-1)).is_err());
    }

    #[test]
    fn text_concatenation() {
        assert_eq!(Value::str("n=").arith_add(&Value::Int(4)), Ok(Value::str("n=4")));
        assert_eq!(Value::Int(4).arith_add(&Value::str("!")), Ok(Value::str("4!")));
    }

    #[test]
    fn mixed_types_rejected() {
        let err = Value::Int(1).arith_sub(&Value::Bool(true)).unwrap_err();
        assert_eq!(err, "cannot subtract integer and boolean");
        assert!(Value::Int(1).cmp_value(&Value::str("1")).is_err());
    }

    #[test]
    fn equality_is_structural_for_data() {
        assert_eq!(Value::str("a"), Value::str("a"));
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_eq!(
            Value::list(vec![Value::Int(1)]),
            Value::list(vec![Value::Int(1)])
        );
    }
}

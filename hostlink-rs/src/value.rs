//! Host-side dynamic value.
//!
//! A [`DynamicValue`] is what the host hands to, and receives from, the
//! bridge.  It is a closed set of variants; anything a script produces that
//! has no counterpart here is reported as a type mismatch rather than coerced.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::trampoline::FunctionHandle;

// ── ValueKind ─────────────────────────────────────────────────────────────────

/// The tag of a [`DynamicValue`], used in foreign-function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Nil,
    Integer,
    Boolean,
    Text,
    Function,
    Opaque,
    /// Signature slot that accepts every kind.
    Any,
}

impl ValueKind {
    /// Whether a value of kind `actual` may be passed where `self` is expected.
    pub fn accepts(self, actual: ValueKind) -> bool {
        self == ValueKind::Any || self == actual
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Nil => "nil",
            ValueKind::Integer => "integer",
            ValueKind::Boolean => "boolean",
            ValueKind::Text => "text",
            ValueKind::Function => "function",
            ValueKind::Opaque => "opaque",
            ValueKind::Any => "any",
        };
        f.write_str(s)
    }
}

// ── OpaqueHandle ──────────────────────────────────────────────────────────────

/// A host object the script can hold and pass back but never inspect.
///
/// Crosses the boundary by identity; equality is pointer equality.
#[derive(Clone)]
pub struct OpaqueHandle(Arc<dyn Any + Send + Sync>);

impl OpaqueHandle {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        OpaqueHandle(Arc::new(value))
    }

    /// Borrow the wrapped object if it is a `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &OpaqueHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for OpaqueHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for OpaqueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueHandle({:p})", Arc::as_ptr(&self.0))
    }
}

// ── DynamicValue ──────────────────────────────────────────────────────────────

/// A value on the host side of the boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Nil,
    Integer(i64),
    Boolean(bool),
    /// Always an owned copy; never borrows host or script storage.
    Text(String),
    Function(FunctionHandle),
    Opaque(OpaqueHandle),
}

impl DynamicValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            DynamicValue::Nil => ValueKind::Nil,
            DynamicValue::Integer(_) => ValueKind::Integer,
            DynamicValue::Boolean(_) => ValueKind::Boolean,
            DynamicValue::Text(_) => ValueKind::Text,
            DynamicValue::Function(_) => ValueKind::Function,
            DynamicValue::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DynamicValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DynamicValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionHandle> {
        match self {
            DynamicValue::Function(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_opaque(&self) -> Option<&OpaqueHandle> {
        match self {
            DynamicValue::Opaque(h) => Some(h),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, DynamicValue::Nil)
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Nil => f.write_str("nil"),
            DynamicValue::Integer(n) => write!(f, "{n}"),
            DynamicValue::Boolean(b) => write!(f, "{b}"),
            DynamicValue::Text(s) => f.write_str(s),
            DynamicValue::Function(h) => write!(f, "<foreign fn {}>", h.name()),
            DynamicValue::Opaque(_) => f.write_str("<opaque>"),
        }
    }
}

impl From<i64> for DynamicValue {
    fn from(n: i64) -> Self {
        DynamicValue::Integer(n)
    }
}

impl From<i32> for DynamicValue {
    fn from(n: i32) -> Self {
        DynamicValue::Integer(n as i64)
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Boolean(b)
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::Text(s)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::Text(s.to_owned())
    }
}

impl From<&String> for DynamicValue {
    fn from(s: &String) -> Self {
        DynamicValue::Text(s.clone())
    }
}

impl From<FunctionHandle> for DynamicValue {
    fn from(h: FunctionHandle) -> Self {
        DynamicValue::Function(h)
    }
}

impl From<OpaqueHandle> for DynamicValue {
    fn from(h: OpaqueHandle) -> Self {
        DynamicValue::Opaque(h)
    }
}

impl From<()> for DynamicValue {
    fn from(_: ()) -> Self {
        DynamicValue::Nil
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

//! Value marshaling between [`DynamicValue`] and the reference engine's
//! [`ScriptValue`].
//!
//! | Host (`DynamicValue`) | Script (`ScriptValue`) | Notes                        |
//! |-----------------------|------------------------|------------------------------|
//! | `Nil`                 | `Nil`                  |                              |
//! | `Integer`             | `Int`                  | bit-for-bit                  |
//! | `Boolean`             | `Bool`                 | bit-for-bit                  |
//! | `Text`                | `Str`                  | copied on every crossing     |
//! | `Function`            | `Foreign`              | same trampoline, by identity |
//! | `Opaque`              | `Opaque`               | same object, by identity     |
//! | —                     | `List`, `Closure`      | `TypeMismatch`               |

use std::rc::Rc;

use crate::error::{BridgeError, Result};
use crate::value::{DynamicValue, ValueKind};

pub use crate::script::Value as ScriptValue;

/// Convert a host value into a script value.  Never fails.
pub fn to_script(value: &DynamicValue) -> ScriptValue {
    match value {
        DynamicValue::Nil => ScriptValue::Nil,
        DynamicValue::Integer(n) => ScriptValue::Int(*n),
        DynamicValue::Boolean(b) => ScriptValue::Bool(*b),
        DynamicValue::Text(s) => ScriptValue::Str(Rc::from(s.as_str())),
        DynamicValue::Function(h) => ScriptValue::Foreign(h.clone()),
        DynamicValue::Opaque(h) => ScriptValue::Opaque(h.clone()),
    }
}

/// Convert a script value into a host value.
///
/// Script-native collections and closures have no host representation and
/// are reported as [`BridgeError::TypeMismatch`].
pub fn from_script(value: &ScriptValue) -> Result<DynamicValue> {
    match value {
        ScriptValue::Nil => Ok(DynamicValue::Nil),
        ScriptValue::Int(n) => Ok(DynamicValue::Integer(*n)),
        ScriptValue::Bool(b) => Ok(DynamicValue::Boolean(*b)),
        ScriptValue::Str(s) => Ok(DynamicValue::Text(s.to_string())),
        ScriptValue::Foreign(h) => Ok(DynamicValue::Function(h.clone())),
        ScriptValue::Opaque(h) => Ok(DynamicValue::Opaque(h.clone())),
        ScriptValue::List(_) | ScriptValue::Closure(_) => Err(BridgeError::type_mismatch(
            ValueKind::Any,
            format!("{} (no host representation)", value.type_name()),
        )),
    }
}

/// Check that `value` fits a signature slot of kind `expected`.
pub fn check_kind(value: &DynamicValue, expected: ValueKind) -> Result<()> {
    if expected.accepts(value.kind()) {
        Ok(())
    } else {
        Err(BridgeError::type_mismatch(expected, value.kind().to_string()))
    }
}

/// Marshal a whole argument list, failing on the first bad entry.
pub fn from_script_all(values: &[ScriptValue]) -> Result<Vec<DynamicValue>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| from_script(v).map_err(|e| e.at_argument(i)))
        .collect()
}

pub fn to_script_all(values: &[DynamicValue]) -> Vec<ScriptValue> {
    values.iter().map(to_script).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trampoline::{FunctionHandle, Trampoline};
    use crate::value::OpaqueHandle;

    #[test]
    fn primitives_round_trip() {
        for v in [
            DynamicValue::Nil,
            DynamicValue::Integer(i64::MIN),
            DynamicValue::Integer(0),
            DynamicValue::Integer(i64::MAX),
            DynamicValue::Boolean(true),
            DynamicValue::Boolean(false),
        ] {
            assert_eq!(from_script(&to_script(&v)).unwrap(), v);
        }
    }

    #[test]
    fn text_is_copied_into_script_storage() {
        let mut host = String::from("hello");
        let script = to_script(&DynamicValue::Text(host.clone()));
        host.push_str(" world");
        drop(host);
        assert_eq!(script, ScriptValue::Str(Rc::from("hello")));
        assert_eq!(from_script(&script).unwrap(), DynamicValue::from("hello"));
    }

    #[test]
    fn function_crosses_by_identity() {
        let h = FunctionHandle::new(Trampoline::new("f", vec![], |_, _| Ok(DynamicValue::Nil)));
        let back = from_script(&to_script(&DynamicValue::Function(h.clone()))).unwrap();
        assert!(back.as_function().unwrap().ptr_eq(&h));
    }

    #[test]
    fn opaque_crosses_by_identity() {
        let h = OpaqueHandle::new(vec![1u8, 2, 3]);
        let back = from_script(&to_script(&DynamicValue::Opaque(h.clone()))).unwrap();
        assert!(back.as_opaque().unwrap().ptr_eq(&h));
    }

    #[test]
    fn list_has_no_host_representation() {
        let list = ScriptValue::list(vec![ScriptValue::Int(1)]);
        let err = from_script(&list).unwrap_err();
        assert!(matches!(err, BridgeError::TypeMismatch { .. }));
        assert!(err.to_string().contains("list"), "{err}");
    }

    #[test]
    fn check_kind_rules() {
        assert!(check_kind(&DynamicValue::Integer(1), ValueKind::Integer).is_ok());
        assert!(check_kind(&DynamicValue::Integer(1), ValueKind::Any).is_ok());
        assert!(check_kind(&DynamicValue::from("1"), ValueKind::Integer).is_err());
    }

    #[test]
    fn from_script_all_reports_position() {
        let args = vec![ScriptValue::Int(1), ScriptValue::list(vec![])];
        match from_script_all(&args) {
            Err(BridgeError::TypeMismatch { position, .. }) => assert_eq!(position, Some(1)),
            other => panic!("unexpected: {other:?}"),
        }
    }
}

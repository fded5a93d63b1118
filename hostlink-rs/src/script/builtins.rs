//! Built-in script functions.
//!
//! Each function receives already-evaluated arguments and returns
//! `Result<Value, String>`.  Builtins are found after script globals and
//! foreign bindings, so a script or host may shadow any of them.

use super::value::Value;

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not a builtin.
pub fn call_builtin(name: &str, args: &[Value]) -> Option<Result<Value, String>> {
    fn inner(name: &str, args: &[Value]) -> Result<Option<Value>, String> {
        Ok(Some(match name {
            // ── Inspection ───────────────────────────────────────────────────
            "len" => {
                arity(name, args, 1)?;
                match &args[0] {
                    Value::Str(s) => Value::Int(s.chars().count() as i64),
                    Value::List(items) => Value::Int(items.len() as i64),
                    other => return Err(format!("len: cannot take length of {}", other.type_name())),
                }
            }
            "type" => {
                arity(name, args, 1)?;
                Value::str(args[0].type_name())
            }

            // ── Conversion ───────────────────────────────────────────────────
            "str" => {
                arity(name, args, 1)?;
                Value::str(args[0].to_string())
            }
            "int" => {
                arity(name, args, 1)?;
                match &args[0] {
                    Value::Int(n) => Value::Int(*n),
                    Value::Bool(b) => Value::Int(i64::from(*b)),
                    Value::Str(s) => s
                        .trim()
                        .parse()
                        .map(Value::Int)
                        .map_err(|_| format!("int: '{s}' is not an integer"))?,
                    other => return Err(format!("int: cannot convert {}", other.type_name())),
                }
            }

            // ── Text ─────────────────────────────────────────────────────────
            "upper" => {
                arity(name, args, 1)?;
                Value::str(get_str(args, 0, name)?.to_uppercase())
            }
            "lower" => {
                arity(name, args, 1)?;
                Value::str(get_str(args, 0, name)?.to_lowercase())
            }
            "substr" => {
                if !(2..=3).contains(&args.len()) {
                    return Err(format!("substr: expected 2 or 3 arguments, got {}", args.len()));
                }
                let s = get_str(args, 0, name)?;
                let start = get_int(args, 1, name)?.max(0) as usize;
                let chars: Vec<char> = s.chars().collect();
                let start = start.min(chars.len());
                let end = match args.get(2) {
                    Some(_) => start.saturating_add(get_int(args, 2, name)?.max(0) as usize),
                    None => chars.len(),
                }
                .min(chars.len());
                Value::str(chars[start..end].iter().collect::<String>())
            }

            // ── Numeric ──────────────────────────────────────────────────────
            "abs" => {
                arity(name, args, 1)?;
                get_int(args, 0, name)?
                    .checked_abs()
                    .map(Value::Int)
                    .ok_or_else(|| "integer overflow".to_owned())?
            }
            "min" | "max" => {
                if args.is_empty() {
                    return Err(format!("{name}: expected at least 1 argument"));
                }
                let mut best = get_int(args, 0, name)?;
                for i in 1..args.len() {
                    let n = get_int(args, i, name)?;
                    best = if name == "min" { best.min(n) } else { best.max(n) };
                }
                Value::Int(best)
            }

            _ => return Ok(None),
        }))
    }
    inner(name, args).transpose()
}

pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "len" | "type" | "str" | "int" | "upper" | "lower" | "substr" | "abs" | "min" | "max"
    )
}

fn arity(name: &str, args: &[Value], n: usize) -> Result<(), String> {
    if args.len() == n {
        Ok(())
    } else {
        Err(format!("{name}: expected {n} argument(s), got {}", args.len()))
    }
}

fn get_str<'a>(args: &'a [Value], i: usize, name: &str) -> Result<&'a str, String> {
    match args.get(i) {
        Some(Value::Str(s)) => Ok(&**s),
        Some(other) => Err(format!(
            "{name}: argument {} must be text, not {}",
            i + 1,
            other.type_name()
        )),
        None => Err(format!("{name}: missing argument {}", i + 1)),
    }
}

fn get_int(args: &[Value], i: usize, name: &str) -> Result<i64, String> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(format!(
            "{name}: argument {} must be an integer, not {}",
            i + 1,
            other.type_name()
        )),
        None => Err(format!("{name}: missing argument {}", i + 1)),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        call_builtin(name, args).expect("not a builtin").expect("builtin failed")
    }

    #[test]
    fn unknown_is_none() {
        assert!(call_builtin("nope", &[]).is_none());
        assert!(!is_builtin("nope"));
        assert!(is_builtin("len"));
    }

    #[test]
    fn len_counts_chars() {
        assert_eq!(call("len", &[Value::str("héllo")]), Value::Int(5));
        assert_eq!(call("len", &[Value::list(vec![Value::Nil; 3])]), Value::Int(3));
        assert!(call_builtin("len", &[Value::Int(1)]).unwrap().is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call("str", &[Value::Int(-7)]), Value::str("-7"));
        assert_eq!(call("int", &[Value::str(" 42 ")]), Value::Int(42));
        assert_eq!(call("int", &[Value::Bool(true)]), Value::Int(1));
        assert!(call_builtin("int", &[Value::str("4x")]).unwrap().is_err());
        assert_eq!(call("type", &[Value::Nil]), Value::str("nil"));
    }

    #[test]
    fn substr_clamps() {
        let s = Value::str("abcdef");
        assert_eq!(call("substr", &[s.clone(), Value::Int(2)]), Value::str("cdef"));
        assert_eq!(call("substr", &[s.clone(), Value::Int(1), Value::Int(2)]), Value::str("bc"));
        assert_eq!(call("substr", &[s.clone(), Value::Int(10)]), Value::str(""));
        assert_eq!(call("substr", &[s, Value::Int(4), Value::Int(99)]), Value::str("ef"));
    }

    #[test]
    fn case_mapping() {
        assert_eq!(call("upper", &[Value::str("abc")]), Value::str("ABC"));
        assert_eq!(call("lower", &[Value::str("ÀB")]), Value::str("àb"));
    }

    #[test]
    fn numeric() {
        assert_eq!(call("abs", &[Value::Int(-3)]), Value::Int(3));
        assert!(call_builtin("abs", &[Value::Int(i64::MIN)]).unwrap().is_err());
        assert_eq!(call("min", &[Value::Int(3), Value::Int(-1), Value::Int(2)]), Value::Int(-1));
        assert_eq!(call("max", &[Value::Int(3), Value::Int(-1)]), Value::Int(3));
        assert!(call_builtin("max", &[]).unwrap().is_err());
    }

    #[test]
    fn wrong_arity() {
        let err = call_builtin("type", &[]).unwrap().unwrap_err();
        assert_eq!(err, "type: expected 1 argument(s), got 0");
    }
}

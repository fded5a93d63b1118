use proptest::prelude::*;

use hostlink::marshal::{from_script, to_script};
use hostlink::script::stmt::parse_script;
use hostlink::{DynamicValue, FailureKind, RuntimeHandle, ValueKind};

fn scalar() -> impl Strategy<Value = DynamicValue> {
    prop_oneof![
        Just(DynamicValue::Nil),
        any::<i64>().prop_map(DynamicValue::Integer),
        any::<bool>().prop_map(DynamicValue::Boolean),
        ".*".prop_map(DynamicValue::Text),
    ]
}

/// Text that survives a single-quoted script literal unchanged.
fn plain_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.,:-]{0,24}"
}

proptest! {
    #[test]
    fn scalar_round_trip(v in scalar()) {
        prop_assert_eq!(from_script(&to_script(&v)).unwrap(), v);
    }

    #[test]
    fn integer_survives_script_run(n in any::<i64>()) {
        let mut rt = RuntimeHandle::initialize().unwrap();
        rt.declare_foreign_variable("n", n).unwrap();
        prop_assert!(rt.run("foreign var n\nvar m = n\nn = m").is_ok());
        prop_assert_eq!(rt.foreign_variable("n"), Some(DynamicValue::Integer(n)));
    }

    #[test]
    fn text_survives_script_run(s in plain_text()) {
        let mut rt = RuntimeHandle::initialize().unwrap();
        let mut host = s.clone();
        rt.declare_foreign_variable("t", &host).unwrap();
        host.push_str("-mutated");

        prop_assert!(rt.run("foreign var t\nprint t").is_ok());
        prop_assert_eq!(rt.take_output(), vec![s.clone()]);
        prop_assert_eq!(rt.foreign_variable("t"), Some(DynamicValue::Text(s)));
    }

    #[test]
    fn last_declaration_wins(values in prop::collection::vec(any::<i64>(), 1..8)) {
        let mut rt = RuntimeHandle::initialize().unwrap();
        for v in &values {
            rt.declare_foreign_variable("x", *v).unwrap();
        }
        let last = *values.last().unwrap();
        prop_assert!(rt.run("foreign var x\nprint x").is_ok());
        prop_assert_eq!(rt.take_output(), vec![last.to_string()]);
    }

    #[test]
    fn wrong_arity_always_rejected(expected in 0usize..4, found in 0usize..6) {
        prop_assume!(expected != found);
        let mut rt = RuntimeHandle::initialize().unwrap();
        rt.register_foreign_function("f", vec![ValueKind::Any; expected], |_, _| {
            panic!("must not run")
        })
        .unwrap();
        let args = vec!["1"; found].join(", ");
        let r = rt.run(&format!("foreign fn f\nf({args})"));
        prop_assert_eq!(r.kind(), Some(FailureKind::ArityMismatch));
    }

    #[test]
    fn integer_literals_parse(n in 0i64..=i64::MAX) {
        let src = format!("print {n}");
        prop_assert!(parse_script(&src).is_ok());
    }

    #[test]
    fn arithmetic_matches_host(a in -1000i64..1000, b in 1i64..1000) {
        let mut rt = RuntimeHandle::initialize().unwrap();
        let src = format!("print {a} + {b}\nprint {a} * {b}\nprint {a} / {b}\nprint {a} % {b}");
        prop_assert!(rt.run(&src).is_ok());
        let expected = vec![
            (a + b).to_string(),
            (a * b).to_string(),
            (a / b).to_string(),
            (a % b).to_string(),
        ];
        prop_assert_eq!(rt.take_output(), expected);
    }

    #[test]
    fn parser_never_panics(src in "[a-z0-9 ()\\[\\]{}+*/=<>!,;'\"\n-]{0,64}") {
        let _ = parse_script(&src);
    }
}

//! Integration tests for URI Charge parsing
//!
//! These tests drive the public entry points end to end: lexing, the grammar,
//! the receivers and the configured error modes.

use churi::{
    parse_uc, parse_uc_value, UcError, UcErrorMode, UcMapRx, UcPathStep, UcReaderOptions,
    UcTypedRx, UcValue, UcValueRx, UcrxRejection, UcrxRejectionCode, UcrxRejectionDetails,
};
use num_bigint::BigInt;
use std::sync::{Arc, Mutex};

fn collect(input: &str) -> (Option<UcValue>, Vec<UcrxRejection>) {
    let mut rx = UcValueRx::new();
    let rejections =
        parse_uc_value(input, &mut rx, UcReaderOptions::new().collect_errors()).unwrap();
    (rx.into_value(), rejections)
}

fn key(name: &str) -> UcPathStep {
    UcPathStep::Key(name.to_string())
}

#[test]
fn test_boolean_and_null_literals() {
    assert_eq!(parse_uc("!").unwrap(), UcValue::Bool(true));
    assert_eq!(parse_uc("-").unwrap(), UcValue::Bool(false));
    assert_eq!(parse_uc("--").unwrap(), UcValue::Null);
}

#[test]
fn test_bigints() {
    assert_eq!(parse_uc("0n123").unwrap(), UcValue::BigInt(BigInt::from(123)));
    assert_eq!(parse_uc("-0n123").unwrap(), UcValue::BigInt(BigInt::from(-123)));
    assert_eq!(parse_uc("0n0xff").unwrap(), UcValue::BigInt(BigInt::from(255)));
    assert_eq!(parse_uc("0n").unwrap(), UcValue::BigInt(BigInt::from(0)));
}

#[test]
fn test_numbers() {
    assert_eq!(parse_uc("1").unwrap(), UcValue::Number(1.0));
    assert_eq!(parse_uc("-12.5").unwrap(), UcValue::Number(-12.5));
    assert_eq!(parse_uc("0x1F").unwrap(), UcValue::Number(31.0));

    match parse_uc("-0").unwrap() {
        UcValue::Number(zero) => assert!(zero == 0.0 && zero.is_sign_negative()),
        other => panic!("Expected number, got {:?}", other),
    }
}

#[test]
fn test_simple_map() {
    assert_eq!(
        parse_uc("foo(bar)").unwrap(),
        UcValue::map([("foo", UcValue::from("bar"))])
    );
}

#[test]
fn test_list_of_groups() {
    assert_eq!(
        parse_uc("(1)(2)(3)").unwrap(),
        UcValue::list([
            UcValue::Number(1.0),
            UcValue::Number(2.0),
            UcValue::Number(3.0)
        ])
    );
}

#[test]
fn test_single_value_or_list() {
    assert_eq!(parse_uc("1").unwrap(), UcValue::Number(1.0));
    assert_eq!(
        parse_uc("1,2").unwrap(),
        UcValue::list([UcValue::Number(1.0), UcValue::Number(2.0)])
    );
    // A trailing comma forces a list
    assert_eq!(parse_uc("1,").unwrap(), UcValue::list([UcValue::Number(1.0)]));
}

#[test]
fn test_empty_containers() {
    assert_eq!(parse_uc("!!").unwrap(), UcValue::list([]));
    assert_eq!(parse_uc("$").unwrap(), UcValue::map::<_, &str>([]));
    assert_eq!(parse_uc("").unwrap(), UcValue::from(""));
}

#[test]
fn test_strings() {
    assert_eq!(parse_uc("hello").unwrap(), UcValue::from("hello"));
    assert_eq!(parse_uc("'!not-an-entity").unwrap(), UcValue::from("!not-an-entity"));
    assert_eq!(parse_uc("'123").unwrap(), UcValue::from("123"));
    assert_eq!(parse_uc("a%20b").unwrap(), UcValue::from("a b"));
    assert_eq!(parse_uc("%28x%29").unwrap(), UcValue::from("(x)"));
    assert_eq!(parse_uc("'a(b)c").unwrap(), UcValue::from("a(b)c"));
}

#[test]
fn test_nested_structures() {
    let value = parse_uc("user(name(Alice)roles((admin)(dev)))active(!)limit(--)").unwrap();
    assert_eq!(
        value,
        UcValue::map([
            (
                "user",
                UcValue::map([
                    ("name", UcValue::from("Alice")),
                    (
                        "roles",
                        UcValue::list([UcValue::from("admin"), UcValue::from("dev")])
                    ),
                ])
            ),
            ("active", UcValue::Bool(true)),
            ("limit", UcValue::Null),
        ])
    );
}

#[test]
fn test_repeated_groups_make_entry_list() {
    assert_eq!(
        parse_uc("tags(a)(b)size(2)").unwrap(),
        UcValue::map([
            ("tags", UcValue::list([UcValue::from("a"), UcValue::from("b")])),
            ("size", UcValue::Number(2.0)),
        ])
    );
}

#[test]
fn test_bare_key_flags() {
    assert_eq!(
        parse_uc("mode(fast)verbose").unwrap(),
        UcValue::map([("mode", UcValue::from("fast")), ("verbose", UcValue::from(""))])
    );
    assert_eq!(
        parse_uc("$flag").unwrap(),
        UcValue::map([("flag", UcValue::from(""))])
    );
}

#[test]
fn test_dollar_escaped_keys() {
    assert_eq!(
        parse_uc("$!bang(1)$$dollar(2)").unwrap(),
        UcValue::map([("!bang", UcValue::Number(1.0)), ("$dollar", UcValue::Number(2.0))])
    );
}

#[test]
fn test_unclaimed_entities_are_kept() {
    assert_eq!(parse_uc("!now").unwrap(), UcValue::Entity("!now".into()));
    assert_eq!(
        parse_uc("at(!now)").unwrap(),
        UcValue::map([("at", UcValue::Entity("!now".into()))])
    );
}

#[test]
fn test_multiline_input() {
    let value = parse_uc("name(churi)\r\ntags(\n  (a)\n  (b)\n)\n").unwrap();
    assert_eq!(
        value,
        UcValue::map([
            ("name", UcValue::from("churi")),
            ("tags", UcValue::list([UcValue::from("a"), UcValue::from("b")])),
        ])
    );
}

#[test]
fn test_unterminated_group_collected() {
    let (value, rejections) = collect("foo(bar)baz(1");

    let value = value.unwrap();
    assert_eq!(value.get("foo"), Some(&UcValue::from("bar")));
    assert_eq!(value.get("baz"), Some(&UcValue::Number(1.0)));

    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].code, UcrxRejectionCode::InvalidSyntax);
    assert_eq!(rejections[0].message, "Unterminated group");
    assert_eq!(rejections[0].path, vec![key("baz")]);
}

#[test]
fn test_unterminated_group_raised() {
    let mut rx = UcValueRx::new();
    let err = parse_uc_value("foo(bar)baz(1", &mut rx, UcReaderOptions::new()).unwrap_err();

    let rejection = err.rejection().expect("rejection error");
    assert_eq!(rejection.code, UcrxRejectionCode::InvalidSyntax);
    assert_eq!(rejection.path, vec![key("baz")]);
    assert_eq!(err.to_string(), "invalidSyntax at $.baz: Unterminated group");
}

#[test]
fn test_rejections_reported_to_callback() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let options = UcReaderOptions::new().with_error_mode(UcErrorMode::Callback(Box::new(
        move |rejection: UcrxRejection| {
            sink.lock().unwrap().push(rejection.code);
            Ok(())
        },
    )));

    let mut rx = UcValueRx::new();
    let returned = parse_uc_value("a(1)b(2", &mut rx, options).unwrap();

    assert!(returned.is_empty());
    assert_eq!(*seen.lock().unwrap(), vec![UcrxRejectionCode::InvalidSyntax]);
    assert_eq!(rx.into_value().unwrap().get("a"), Some(&UcValue::Number(1.0)));
}

#[test]
fn test_callback_error_aborts() {
    let options = UcReaderOptions::new().with_error_mode(UcErrorMode::Callback(Box::new(
        |rejection: UcrxRejection| Err(UcError::Serde(rejection.message)),
    )));

    let mut rx = UcValueRx::new();
    let err = parse_uc_value("a(1", &mut rx, options).unwrap_err();
    assert!(matches!(err, UcError::Serde(message) if message == "Unterminated group"));
}

#[test]
fn test_declared_map_entries() {
    let mut rx = UcMapRx::new()
        .required("id", &["number"])
        .required("name", &["string"])
        .entry("note", &["string"]);
    let rejections = parse_uc_value(
        "id(7)extra(x)note(hi)",
        &mut rx,
        UcReaderOptions::new().collect_errors(),
    )
    .unwrap();

    assert_eq!(rejections.len(), 2);
    assert_eq!(rejections[0].code, UcrxRejectionCode::UnexpectedEntry);
    assert_eq!(rejections[0].path, vec![key("extra")]);
    assert_eq!(rejections[1].code, UcrxRejectionCode::MissingEntries);
    assert_eq!(
        rejections[1].details,
        UcrxRejectionDetails::Entries(vec!["name".to_string()])
    );
    assert!(rejections[1].path.is_empty());

    assert_eq!(
        rx.into_value(),
        UcValue::map([("id", UcValue::Number(7.0)), ("note", UcValue::from("hi"))])
    );
}

#[test]
fn test_typed_entry_mismatch() {
    let mut rx = UcMapRx::new()
        .required("id", &["number"])
        .entry("tags", &["list"]);
    let rejections = parse_uc_value(
        "id(abc)tags((a)(b))",
        &mut rx,
        UcReaderOptions::new().collect_errors(),
    )
    .unwrap();

    assert_eq!(rejections.len(), 1);
    let rejection = &rejections[0];
    assert_eq!(rejection.code, UcrxRejectionCode::UnexpectedType);
    assert_eq!(rejection.path, vec![key("id")]);
    assert_eq!(rejection.expected_types(), ["number".to_string()]);
    assert_eq!(rejection.message, "Unexpected string, while number expected");

    assert_eq!(
        rx.into_value().get("tags"),
        Some(&UcValue::list([UcValue::from("a"), UcValue::from("b")]))
    );
}

#[test]
fn test_entry_rejection_raised_before_later_syntax_error() {
    let declared = || UcMapRx::new().required("a", &["number"]).entry("b", &["any"]);

    let mut rx = declared();
    let err = parse_uc_value("a(x)b(1", &mut rx, UcReaderOptions::new()).unwrap_err();
    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.code, UcrxRejectionCode::UnexpectedType);
    assert_eq!(rejection.path, vec![key("a")]);

    let mut rx = declared();
    let rejections =
        parse_uc_value("a(x)b(1", &mut rx, UcReaderOptions::new().collect_errors()).unwrap();
    let seen: Vec<_> = rejections
        .iter()
        .map(|rejection| (rejection.code, rejection.path.clone()))
        .collect();
    assert_eq!(
        seen,
        vec![
            (UcrxRejectionCode::UnexpectedType, vec![key("a")]),
            (UcrxRejectionCode::InvalidSyntax, vec![key("b")]),
        ]
    );
    assert_eq!(rx.into_value(), UcValue::map([("b", UcValue::Number(1.0))]));
}

#[test]
fn test_list_entry_accepts_repeated_groups() {
    let mut rx = UcMapRx::new().entry("tags", &["list"]);
    let rejections = parse_uc_value(
        "tags(a)(b)",
        &mut rx,
        UcReaderOptions::new().collect_errors(),
    )
    .unwrap();

    assert!(rejections.is_empty());
    assert_eq!(
        rx.into_value(),
        UcValue::map([(
            "tags",
            UcValue::list([UcValue::from("a"), UcValue::from("b")])
        )])
    );
}

#[test]
fn test_list_refused_by_scalar_receiver() {
    let mut rx = UcTypedRx::new(&["number"]);
    let err = parse_uc_value("1,2", &mut rx, UcReaderOptions::new()).unwrap_err();
    let rejection = err.rejection().unwrap();
    assert_eq!(rejection.code, UcrxRejectionCode::UnexpectedType);
    assert_eq!(rejection.expected_types(), ["number".to_string()]);
}

#[test]
fn test_unexpected_token_is_skipped() {
    let (value, rejections) = collect("(a)x(b),c");
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].code, UcrxRejectionCode::InvalidSyntax);
    assert_eq!(
        value,
        Some(UcValue::list([
            UcValue::list([UcValue::from("a")]),
            UcValue::from("c")
        ]))
    );
}

#[test]
fn test_invalid_number_literal() {
    let (value, rejections) = collect("n(12abc)m(1)");
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].code, UcrxRejectionCode::InvalidSyntax);
    assert_eq!(rejections[0].path, vec![key("n")]);
    assert_eq!(
        rejections[0].details,
        UcrxRejectionDetails::Input("12abc".to_string())
    );
    assert_eq!(value.unwrap().get("m"), Some(&UcValue::Number(1.0)));
}

#[test]
fn test_depth_limit() {
    let mut rx = UcValueRx::new();
    let err = parse_uc_value("(((1)))", &mut rx, UcReaderOptions::new().with_max_depth(2))
        .unwrap_err();
    assert!(matches!(err, UcError::DepthExceeded { limit: 2, .. }));

    let mut rx = UcValueRx::new();
    parse_uc_value("((1))", &mut rx, UcReaderOptions::new().with_max_depth(3)).unwrap();
    assert_eq!(
        rx.into_value(),
        Some(UcValue::list([UcValue::list([UcValue::Number(1.0)])]))
    );
}

//! Tests for chunked input, the asynchronous reader and insets

use churi::{
    lex_uc_stream, parse_uc, parse_uc_async, parse_uc_tokens, parse_uc_value_async, tokenize_uc,
    UcChargeLexer, UcError, UcJsonLexer, UcLexer, UcLexerFactory, UcPlainTextLexer,
    UcReaderOptions, UcUriParamsLexer, UcValue, UcValueRx, UcrxRejectionCode,
};
use futures::executor::block_on;
use futures::stream;
use std::convert::Infallible;
use std::sync::Arc;

const JSON_INSET: u16 = 7;

fn json_factory() -> UcLexerFactory {
    Arc::new(|| Box::new(UcJsonLexer::new()) as Box<dyn UcLexer + Send>)
}

fn chunks<'a>(parts: &[&'a str]) -> impl futures::Stream<Item = Result<&'a str, Infallible>> + Unpin {
    stream::iter(parts.to_vec().into_iter().map(Ok))
}

fn expected_query() -> UcValue {
    UcValue::map([
        (
            "q",
            UcValue::map([(
                "a",
                UcValue::list([UcValue::Number(1.0), UcValue::Bool(true)]),
            )]),
        ),
        ("page", UcValue::Number(2.0)),
    ])
}

#[test]
fn test_chunks_split_anywhere() {
    let input = "name(rust%20book)tags((a)(b))count(12)";
    let whole = parse_uc(input).unwrap();

    for at in 1..input.len() {
        let (head, tail) = input.split_at(at);
        let value = block_on(parse_uc_async(chunks(&[head, tail]))).unwrap();
        assert_eq!(value, whole, "split at {}", at);
    }
}

#[test]
fn test_one_byte_chunks() {
    let input = "a(!)b(--)c(-0n42)d('x%2Cy)";
    let parts: Vec<&str> = (0..input.len()).map(|i| &input[i..i + 1]).collect();

    let value = block_on(parse_uc_async(chunks(&parts))).unwrap();
    assert_eq!(value, parse_uc(input).unwrap());
    assert_eq!(value.get("d"), Some(&UcValue::from("x,y")));
}

#[test]
fn test_async_collects_rejections() {
    let tokens = Box::pin(lex_uc_stream(
        chunks(&["foo(b", "ar)ba", "z(1"]),
        Box::new(UcChargeLexer::new()),
    ));
    let mut rx = UcValueRx::new();
    let rejections = block_on(parse_uc_value_async(
        tokens,
        &mut rx,
        UcReaderOptions::new().collect_errors(),
    ))
    .unwrap();

    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].code, UcrxRejectionCode::InvalidSyntax);
    assert_eq!(rx.into_value().unwrap().get("foo"), Some(&UcValue::from("bar")));
}

#[test]
fn test_stream_error_ends_parse() {
    let parts = stream::iter(vec![Ok("foo("), Err("connection reset")]);
    let err = block_on(parse_uc_async(parts)).unwrap_err();
    assert!(matches!(err, UcError::Stream(message) if message == "connection reset"));
}

#[test]
fn test_stream_closed_after_value() {
    let parts = stream::iter(vec![Ok::<_, &str>("a(1)")]);
    assert_eq!(
        block_on(parse_uc_async(parts)).unwrap(),
        UcValue::map([("a", UcValue::Number(1.0))])
    );
}

#[test]
fn test_query_params_with_json_inset() {
    let input = "q=%7B%22a%22%3A%5B1%2Ctrue%5D%7D&page=2";
    let mut lexer = UcUriParamsLexer::new().with_inset(JSON_INSET);
    let tokens = tokenize_uc(&mut lexer, input).unwrap();

    let mut rx = UcValueRx::new();
    parse_uc_tokens(
        tokens,
        &mut rx,
        UcReaderOptions::new().with_inset(JSON_INSET, json_factory()),
    )
    .unwrap();

    assert_eq!(rx.into_value(), Some(expected_query()));
}

#[test]
fn test_query_params_with_json_inset_async() {
    let tokens = Box::pin(lex_uc_stream(
        chunks(&["q=%7B%22a%2", "2%3A%5B1%2Ctr", "ue%5D%7D&pa", "ge=2"]),
        Box::new(UcUriParamsLexer::new().with_inset(JSON_INSET)),
    ));

    let mut rx = UcValueRx::new();
    block_on(parse_uc_value_async(
        tokens,
        &mut rx,
        UcReaderOptions::new().with_inset(JSON_INSET, json_factory()),
    ))
    .unwrap();

    assert_eq!(rx.into_value(), Some(expected_query()));
}

#[test]
fn test_unregistered_inset_reads_as_charge() {
    let mut lexer = UcUriParamsLexer::new().with_inset(JSON_INSET);
    let tokens = tokenize_uc(&mut lexer, "a=(1)(2)&b=x").unwrap();

    let mut rx = UcValueRx::new();
    parse_uc_tokens(tokens, &mut rx, UcReaderOptions::new()).unwrap();

    assert_eq!(
        rx.into_value(),
        Some(UcValue::map([
            (
                "a",
                UcValue::list([UcValue::Number(1.0), UcValue::Number(2.0)])
            ),
            ("b", UcValue::from("x")),
        ]))
    );
}

#[test]
fn test_plain_text_param_values() {
    let factory: UcLexerFactory =
        Arc::new(|| Box::new(UcPlainTextLexer::new()) as Box<dyn UcLexer + Send>);
    let mut lexer = UcUriParamsLexer::new().with_value_lexer(factory);
    let tokens = tokenize_uc(&mut lexer, "title=(draft)&n=12").unwrap();

    let mut rx = UcValueRx::new();
    parse_uc_tokens(tokens, &mut rx, UcReaderOptions::new()).unwrap();

    assert_eq!(
        rx.into_value(),
        Some(UcValue::map([
            ("title", UcValue::from("(draft)")),
            ("n", UcValue::from("12")),
        ]))
    );
}

#[test]
fn test_invalid_json_inset() {
    let mut lexer = UcUriParamsLexer::new().with_inset(JSON_INSET);
    let tokens = tokenize_uc(&mut lexer, "q=%7Bnope").unwrap();

    let mut rx = UcValueRx::new();
    let err = parse_uc_tokens(
        tokens,
        &mut rx,
        UcReaderOptions::new().with_inset(JSON_INSET, json_factory()),
    )
    .unwrap_err();
    assert!(matches!(err, UcError::Lex(_)));
}

//! Primitive value decoding
//!
//! Pure dispatch over the first byte of a decoded token. [`decode_uc_primitive`]
//! covers the whole table, including the `!`, `'` and `$` prefixes;
//! [`decode_uc_text`] is the subset for text whose first character did not
//! come from a reserved token (an escaped `%21` is just a `!` in a string).

use crate::error::UcrxRejection;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Decoded primitive
#[derive(Debug, Clone, PartialEq)]
pub enum UcPrimitive<'a> {
    Bool(bool),
    Null,
    Number(f64),
    BigInt(BigInt),
    String(&'a str),
    /// `!!`
    EmptyList,
    /// `!name...`
    Entity(&'a str),
    /// `$`
    EmptyMap,
    /// `$key`: map with a single entry mapped to the empty string
    SuffixKey(&'a str),
}

/// Decodes a token using the full first-character table
pub fn decode_uc_primitive(input: &str) -> Result<UcPrimitive<'_>, UcrxRejection> {
    match input.as_bytes().first() {
        Some(b'!') => Ok(match input {
            "!" => UcPrimitive::Bool(true),
            "!!" => UcPrimitive::EmptyList,
            _ => UcPrimitive::Entity(input),
        }),
        Some(b'\'') => Ok(UcPrimitive::String(&input[1..])),
        Some(b'$') => Ok(match &input[1..] {
            "" => UcPrimitive::EmptyMap,
            key => UcPrimitive::SuffixKey(key),
        }),
        _ => decode_uc_text(input),
    }
}

/// Decodes bare text: booleans, null, numbers, or the text itself
pub fn decode_uc_text(input: &str) -> Result<UcPrimitive<'_>, UcrxRejection> {
    let bytes = input.as_bytes();
    match bytes.first() {
        Some(b'-') => match bytes.get(1) {
            None => Ok(UcPrimitive::Bool(false)),
            Some(b'-') if bytes.len() == 2 => Ok(UcPrimitive::Null),
            Some(b'0'..=b'9') => decode_uc_number(input, true),
            _ => Ok(UcPrimitive::String(input)),
        },
        Some(b'0'..=b'9') => decode_uc_number(input, false),
        _ => Ok(UcPrimitive::String(input)),
    }
}

/// Decodes a number or bigint, with an optional leading `-`
///
/// A bigint is recognized by an `n` right after the first digit (`0n123`);
/// the digits after it are parsed exactly, `0x` selects hex, and no digits
/// at all mean zero. Anything else is a float literal, `0x` again selecting
/// hex. The sign is applied by negation, so `-0` stays negative zero.
pub fn decode_uc_number(input: &str, negative: bool) -> Result<UcPrimitive<'_>, UcrxRejection> {
    let body = if negative { &input[1..] } else { input };

    if body.as_bytes().get(1) == Some(&b'n') {
        let digits = &body[2..];
        let magnitude = if digits.is_empty() {
            Some(BigInt::from(0))
        } else if let Some(hex) = strip_hex_prefix(digits) {
            parse_unsigned_bigint(hex, 16)
        } else {
            parse_unsigned_bigint(digits, 10)
        };

        return match magnitude {
            Some(value) if negative => Ok(UcPrimitive::BigInt(-value)),
            Some(value) => Ok(UcPrimitive::BigInt(value)),
            None => Err(UcrxRejection::invalid_literal("bigint", input)),
        };
    }

    let magnitude = if let Some(hex) = strip_hex_prefix(body) {
        parse_unsigned_bigint(hex, 16).and_then(|value| value.to_f64())
    } else {
        parse_decimal(body)
    };

    match magnitude {
        Some(value) if negative => Ok(UcPrimitive::Number(-value)),
        Some(value) => Ok(UcPrimitive::Number(value)),
        None => Err(UcrxRejection::invalid_literal("number", input)),
    }
}

fn strip_hex_prefix(input: &str) -> Option<&str> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
}

fn parse_unsigned_bigint(digits: &str, radix: u32) -> Option<BigInt> {
    // parse_bytes would accept a sign
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    BigInt::parse_bytes(digits.as_bytes(), radix)
}

fn parse_decimal(input: &str) -> Option<f64> {
    // str::parse accepts forms like "inf" that are not numeric literals here
    let valid = input
        .bytes()
        .all(|b| matches!(b, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid {
        return None;
    }
    input.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UcrxRejectionCode;

    #[test]
    fn test_booleans_and_null() {
        assert_eq!(decode_uc_primitive("!"), Ok(UcPrimitive::Bool(true)));
        assert_eq!(decode_uc_primitive("-"), Ok(UcPrimitive::Bool(false)));
        assert_eq!(decode_uc_primitive("--"), Ok(UcPrimitive::Null));
        assert_eq!(decode_uc_primitive("!!"), Ok(UcPrimitive::EmptyList));
        assert_eq!(decode_uc_primitive("---"), Ok(UcPrimitive::String("---")));
    }

    #[test]
    fn test_prefixed_forms() {
        assert_eq!(decode_uc_primitive("!entity"), Ok(UcPrimitive::Entity("!entity")));
        assert_eq!(decode_uc_primitive("'123"), Ok(UcPrimitive::String("123")));
        assert_eq!(decode_uc_primitive("$"), Ok(UcPrimitive::EmptyMap));
        assert_eq!(decode_uc_primitive("$key"), Ok(UcPrimitive::SuffixKey("key")));
        assert_eq!(decode_uc_primitive("plain"), Ok(UcPrimitive::String("plain")));
        assert_eq!(decode_uc_primitive(""), Ok(UcPrimitive::String("")));
    }

    #[test]
    fn test_escaped_prefixes_are_text() {
        assert_eq!(decode_uc_text("!"), Ok(UcPrimitive::String("!")));
        assert_eq!(decode_uc_text("'a"), Ok(UcPrimitive::String("'a")));
        assert_eq!(decode_uc_text("$"), Ok(UcPrimitive::String("$")));
    }

    #[test]
    fn test_numbers() {
        assert_eq!(decode_uc_primitive("123"), Ok(UcPrimitive::Number(123.0)));
        assert_eq!(decode_uc_primitive("-1.5"), Ok(UcPrimitive::Number(-1.5)));
        assert_eq!(decode_uc_primitive("1e3"), Ok(UcPrimitive::Number(1000.0)));
        assert_eq!(decode_uc_primitive("0xff"), Ok(UcPrimitive::Number(255.0)));
        assert_eq!(decode_uc_primitive("-0x10"), Ok(UcPrimitive::Number(-16.0)));
        assert_eq!(decode_uc_primitive("-a"), Ok(UcPrimitive::String("-a")));

        let wide = format!("0x1{}", "0".repeat(33));
        assert_eq!(decode_uc_primitive(&wide), Ok(UcPrimitive::Number(2f64.powi(132))));
    }

    #[test]
    fn test_negative_zero_is_preserved() {
        match decode_uc_primitive("-0") {
            Ok(UcPrimitive::Number(value)) => {
                assert_eq!(value, 0.0);
                assert!(value.is_sign_negative());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bigints() {
        assert_eq!(
            decode_uc_primitive("0n123"),
            Ok(UcPrimitive::BigInt(BigInt::from(123)))
        );
        assert_eq!(
            decode_uc_primitive("-0n123"),
            Ok(UcPrimitive::BigInt(BigInt::from(-123)))
        );
        assert_eq!(
            decode_uc_primitive("0n0xFF"),
            Ok(UcPrimitive::BigInt(BigInt::from(255)))
        );
        assert_eq!(decode_uc_primitive("0n"), Ok(UcPrimitive::BigInt(BigInt::from(0))));
        assert_eq!(
            decode_uc_primitive("0n123456789012345678901234567890"),
            Ok(UcPrimitive::BigInt(
                "123456789012345678901234567890".parse().unwrap()
            ))
        );
    }

    #[test]
    fn test_invalid_numbers() {
        for input in ["1x", "0n12z", "0n-5", "12abc", "1inf", "0xZZ", "0x+1", "-0x-1", "0x"] {
            let rejection = decode_uc_primitive(input).unwrap_err();
            assert_eq!(rejection.code, UcrxRejectionCode::InvalidSyntax, "{}", input);
        }
    }
}

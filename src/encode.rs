//! URI Charge serialization
//!
//! Everything outside the URI-safe character set is percent-encoded, so the
//! output can be embedded in a URI as is and contains no structural
//! characters other than those produced by the encoder itself.

use crate::token::UC_CHAR_TABLE;
use crate::value::UcValue;
use num_bigint::{BigInt, Sign};
use std::fmt::{self, Write};

/// Encodes a value into a string
pub fn encode_uc_value(value: &UcValue) -> String {
    let mut out = String::new();
    let mut encoder = UcEncoder::new(&mut out);
    // Writing into a String never fails
    let _ = encoder.encode(value);
    out
}

/// Writes values as URI Charge into any [`fmt::Write`]
pub struct UcEncoder<W: Write> {
    out: W,
}

impl<W: Write> UcEncoder<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Encodes a document
    pub fn encode(&mut self, value: &UcValue) -> fmt::Result {
        match value {
            UcValue::Null => self.out.write_str("--"),
            UcValue::Bool(true) => self.out.write_char('!'),
            UcValue::Bool(false) => self.out.write_char('-'),
            UcValue::Number(number) => self.encode_number(*number),
            UcValue::BigInt(number) => self.encode_bigint(number),
            UcValue::String(text) => self.encode_string(text),
            UcValue::List(items) => {
                if items.is_empty() {
                    return self.out.write_str("!!");
                }
                for item in items.iter() {
                    self.out.write_char('(')?;
                    self.encode(item)?;
                    self.out.write_char(')')?;
                }
                Ok(())
            }
            UcValue::Map(entries) => {
                if entries.is_empty() {
                    return self.out.write_char('$');
                }
                for (key, value) in entries {
                    self.encode_key(key)?;
                    // A list value keeps its own groups: `key((a)(b))`
                    self.out.write_char('(')?;
                    self.encode(value)?;
                    self.out.write_char(')')?;
                }
                Ok(())
            }
            UcValue::Entity(entity) => self.out.write_str(entity),
            UcValue::Formatted { format, data } => {
                write!(self.out, "!format'{}({})", format, data)
            }
        }
    }

    fn encode_number(&mut self, number: f64) -> fmt::Result {
        if number.is_nan() {
            self.out.write_str("!NaN")
        } else if number.is_infinite() {
            self.out.write_str(if number > 0.0 { "!Infinity" } else { "!-Infinity" })
        } else {
            write!(self.out, "{}", number)
        }
    }

    fn encode_bigint(&mut self, number: &BigInt) -> fmt::Result {
        if number.sign() == Sign::Minus {
            self.out.write_char('-')?;
        }
        write!(self.out, "0n{}", number.magnitude())
    }

    fn encode_string(&mut self, text: &str) -> fmt::Result {
        let quote = match text.as_bytes().first() {
            None => true,
            Some(&first) => matches!(first, b'!' | b'$' | b'\'' | b'-') || first.is_ascii_digit(),
        };
        if quote {
            self.out.write_char('\'')?;
        }
        self.write_escaped(text)
    }

    fn encode_key(&mut self, key: &str) -> fmt::Result {
        let escape = match key.as_bytes().first() {
            None => true,
            Some(&first) => matches!(first, b'!' | b'$' | b'\''),
        };
        if escape {
            self.out.write_char('$')?;
        }
        self.write_escaped(key)
    }

    fn write_escaped(&mut self, text: &str) -> fmt::Result {
        for ch in text.chars() {
            if ch.is_ascii() && UC_CHAR_TABLE.is_uri_safe(ch as u8) {
                self.out.write_char(ch)?;
            } else {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    write!(self.out, "%{:02X}", byte)?;
                }
            }
        }
        Ok(())
    }
}

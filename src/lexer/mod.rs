//! URI Charge lexers
//!
//! A lexer turns text chunks into [`UcToken`]s. Chunks may be split anywhere,
//! including inside a percent-escape or between the CR and LF of a line
//! terminator; every lexer produces the same tokens however the input is
//! chunked. Tokens are handed to an emitter supplied per call, so one lexer
//! can forward its output straight into another consumer.

mod charge;
mod inset;
mod json;
mod params;
mod text;

pub use charge::{UcChargeLexer, UcChargeLexerConfig};
pub use inset::UcInsetLexer;
pub use json::UcJsonLexer;
pub use params::UcUriParamsLexer;
pub use text::{UcPlainTextLexer, UcUriEncodedLexer};

use crate::error::UcLexError;
use crate::token::{append_uc_token, UcToken};
use std::sync::Arc;

/// Streaming lexer
pub trait UcLexer {
    /// Scans the next chunk of input
    fn scan(&mut self, chunk: &str, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError>;

    /// Signals the end of input, emitting whatever is still pending
    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError>;
}

/// Builds fresh lexer instances, e.g. for insets
pub type UcLexerFactory = Arc<dyn Fn() -> Box<dyn UcLexer + Send> + Send + Sync>;

/// Factory of [`UcChargeLexer`]s with the default configuration
pub fn uc_charge_lexer_factory() -> UcLexerFactory {
    Arc::new(|| Box::new(UcChargeLexer::new()) as Box<dyn UcLexer + Send>)
}

/// Lexes a complete input, coalescing the emitted tokens
pub fn tokenize_uc(lexer: &mut dyn UcLexer, input: &str) -> Result<Vec<UcToken>, UcLexError> {
    let mut tokens = Vec::new();
    lexer.scan(input, &mut |token| append_uc_token(&mut tokens, token))?;
    lexer.flush(&mut |token| append_uc_token(&mut tokens, token))?;
    Ok(tokens)
}

/// Lexes charge text with a default [`UcChargeLexer`]
pub fn tokenize_uc_charge(input: &str) -> Result<Vec<UcToken>, UcLexError> {
    tokenize_uc(&mut UcChargeLexer::new(), input)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EscapeState {
    #[default]
    Idle,
    Percent,
    Hex(char, u8),
}

/// Percent-decoder surviving chunk boundaries
///
/// Decoded bytes are collected until a character outside an escape arrives,
/// so multi-byte UTF-8 sequences spelled as several escapes decode to one
/// character. Invalid sequences decode lossily to U+FFFD. A `%` not followed
/// by two hex digits is kept literally.
#[derive(Debug, Default)]
pub(crate) struct UcPercentDecoder {
    state: EscapeState,
    bytes: Vec<u8>,
}

impl UcPercentDecoder {
    /// True when no escape is in progress
    pub(crate) fn is_idle(&self) -> bool {
        self.state == EscapeState::Idle
    }

    /// Feeds one character
    ///
    /// Escape characters are consumed and decoded into `text`. Any other
    /// character is returned to the caller after pending decoded bytes were
    /// appended to `text`.
    pub(crate) fn feed(&mut self, ch: char, text: &mut String) -> Option<char> {
        match self.state {
            EscapeState::Idle => {
                if ch == '%' {
                    self.state = EscapeState::Percent;
                    None
                } else {
                    self.flush_bytes(text);
                    Some(ch)
                }
            }
            EscapeState::Percent => match ch.to_digit(16) {
                Some(hi) => {
                    self.state = EscapeState::Hex(ch, hi as u8);
                    None
                }
                None => {
                    self.state = EscapeState::Idle;
                    self.flush_bytes(text);
                    text.push('%');
                    self.feed(ch, text)
                }
            },
            EscapeState::Hex(hi_char, hi) => match ch.to_digit(16) {
                Some(lo) => {
                    self.state = EscapeState::Idle;
                    self.bytes.push((hi << 4) | lo as u8);
                    None
                }
                None => {
                    self.state = EscapeState::Idle;
                    self.flush_bytes(text);
                    text.push('%');
                    text.push(hi_char);
                    self.feed(ch, text)
                }
            },
        }
    }

    /// Appends decoded bytes to `text`
    pub(crate) fn flush_bytes(&mut self, text: &mut String) {
        if !self.bytes.is_empty() {
            text.push_str(&String::from_utf8_lossy(&self.bytes));
            self.bytes.clear();
        }
    }

    /// Ends the input: an unfinished escape is kept literally
    pub(crate) fn finish(&mut self, text: &mut String) {
        let state = std::mem::take(&mut self.state);
        self.flush_bytes(text);
        match state {
            EscapeState::Idle => {}
            EscapeState::Percent => text.push('%'),
            EscapeState::Hex(hi_char, _) => {
                text.push('%');
                text.push(hi_char);
            }
        }
    }
}

/// Percent-decodes a complete string
pub fn decode_uri_component(input: &str) -> String {
    let mut decoder = UcPercentDecoder::default();
    let mut text = String::with_capacity(input.len());
    for ch in input.chars() {
        if let Some(ch) = decoder.feed(ch, &mut text) {
            text.push(ch);
        }
    }
    decoder.finish(&mut text);
    text
}

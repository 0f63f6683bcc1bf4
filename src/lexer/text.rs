use super::{UcLexer, UcPercentDecoder};
use crate::error::UcLexError;
use crate::token::{UcToken, UC_TOKEN_APOSTROPHE};

/// Emits the whole input as one string, taken verbatim
///
/// The input is announced as a quoted string, so text starting with `!` or a
/// digit still decodes as a string.
#[derive(Debug, Default)]
pub struct UcPlainTextLexer {
    started: bool,
}

impl UcPlainTextLexer {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self, emit: &mut dyn FnMut(UcToken)) {
        if !self.started {
            self.started = true;
            emit(UcToken::Reserved(UC_TOKEN_APOSTROPHE));
        }
    }
}

impl UcLexer for UcPlainTextLexer {
    fn scan(&mut self, chunk: &str, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.start(emit);
        if !chunk.is_empty() {
            emit(UcToken::text(chunk));
        }
        Ok(())
    }

    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.start(emit);
        Ok(())
    }
}

/// Emits the whole input as one percent-decoded string
///
/// Unlike form encoding, `+` is kept as is.
#[derive(Debug, Default)]
pub struct UcUriEncodedLexer {
    decoder: UcPercentDecoder,
    started: bool,
}

impl UcUriEncodedLexer {
    pub fn new() -> Self {
        Self::default()
    }

    fn start(&mut self, emit: &mut dyn FnMut(UcToken)) {
        if !self.started {
            self.started = true;
            emit(UcToken::Reserved(UC_TOKEN_APOSTROPHE));
        }
    }
}

impl UcLexer for UcUriEncodedLexer {
    fn scan(&mut self, chunk: &str, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.start(emit);

        let mut text = String::with_capacity(chunk.len());
        for ch in chunk.chars() {
            if let Some(ch) = self.decoder.feed(ch, &mut text) {
                text.push(ch);
            }
        }
        if !text.is_empty() {
            emit(UcToken::Text(text));
        }
        Ok(())
    }

    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.start(emit);

        let mut text = String::new();
        self.decoder.finish(&mut text);
        if !text.is_empty() {
            emit(UcToken::Text(text));
        }
        Ok(())
    }
}

use super::{UcLexer, UcPercentDecoder};
use crate::error::UcLexError;
use crate::token::{append_uc_token, UcLineEnd, UcToken, UC_CHAR_TABLE};

/// Configuration options for the charge lexer
#[derive(Debug, Clone)]
pub struct UcChargeLexerConfig {
    /// Maximum length of a single text token to prevent memory exhaustion
    pub max_text_length: usize,
}

impl Default for UcChargeLexerConfig {
    fn default() -> Self {
        Self {
            max_text_length: 1024 * 1024, // 1MB default
        }
    }
}

impl UcChargeLexerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum text token length
    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }
}

/// Lexer for URI Charge notation
///
/// Reserved characters and line terminators become codes. Percent-escapes
/// are decoded, and decoded characters are always text. Whitespace next to a
/// reserved character, a line terminator, or either end of input becomes
/// padding; whitespace between text characters stays in the text.
#[derive(Debug)]
pub struct UcChargeLexer {
    config: UcChargeLexerConfig,
    decoder: UcPercentDecoder,
    /// Text of the token being built
    text: String,
    /// Whitespace after `text`, undecided between text and padding
    whitespace: Vec<u8>,
    /// Finished tokens not emitted yet
    queue: Vec<UcToken>,
    hanging_cr: bool,
    flushed: bool,
}

impl Default for UcChargeLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl UcChargeLexer {
    pub fn new() -> Self {
        Self::with_config(UcChargeLexerConfig::default())
    }

    pub fn with_config(config: UcChargeLexerConfig) -> Self {
        Self {
            config,
            decoder: UcPercentDecoder::default(),
            text: String::new(),
            whitespace: Vec::new(),
            queue: Vec::new(),
            hanging_cr: false,
            flushed: false,
        }
    }

    fn push_char(&mut self, ch: char) -> Result<(), UcLexError> {
        if self.hanging_cr {
            self.hanging_cr = false;
            if ch == '\n' {
                self.queue_token(UcToken::LineEnd(UcLineEnd::CrLf));
                return Ok(());
            }
            self.queue_token(UcToken::LineEnd(UcLineEnd::Cr));
        }

        if ch == '%' || !self.decoder.is_idle() {
            self.commit_whitespace();
        }
        let ch = match self.decoder.feed(ch, &mut self.text) {
            Some(ch) => ch,
            None => return self.check_length(),
        };

        if ch.is_ascii() {
            let byte = ch as u8;
            if UC_CHAR_TABLE.is_reserved(byte) {
                self.end_text();
                self.queue_token(UcToken::Reserved(byte));
                return Ok(());
            }
            if byte == b'\n' {
                self.end_text();
                self.queue_token(UcToken::LineEnd(UcLineEnd::Lf));
                return Ok(());
            }
            if byte == b'\r' {
                self.end_text();
                self.hanging_cr = true;
                return Ok(());
            }
            if UC_CHAR_TABLE.is_padding(byte) {
                if self.text.is_empty() {
                    self.queue_token(UcToken::Padding { byte, count: 1 });
                } else {
                    self.whitespace.push(byte);
                }
                return Ok(());
            }
        }

        self.commit_whitespace();
        self.text.push(ch);
        self.check_length()
    }

    fn check_length(&self) -> Result<(), UcLexError> {
        if self.text.len() > self.config.max_text_length {
            return Err(UcLexError::TextTooLong {
                limit: self.config.max_text_length,
            });
        }
        Ok(())
    }

    /// Whitespace followed by text is part of the text
    fn commit_whitespace(&mut self) {
        for &byte in &self.whitespace {
            self.text.push(byte as char);
        }
        self.whitespace.clear();
    }

    /// Finishes the text token; trailing whitespace becomes padding
    fn end_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            append_uc_token(&mut self.queue, UcToken::Text(text));
        }
        for byte in std::mem::take(&mut self.whitespace) {
            append_uc_token(&mut self.queue, UcToken::Padding { byte, count: 1 });
        }
    }

    fn queue_token(&mut self, token: UcToken) {
        append_uc_token(&mut self.queue, token);
    }

    /// Emits finished tokens; trailing padding may still grow unless `all`
    fn emit_ready(&mut self, emit: &mut dyn FnMut(UcToken), all: bool) {
        let keep = usize::from(!all && matches!(self.queue.last(), Some(UcToken::Padding { .. })));
        let ready = self.queue.len() - keep;
        for token in self.queue.drain(..ready) {
            emit(token);
        }
    }
}

impl UcLexer for UcChargeLexer {
    fn scan(&mut self, chunk: &str, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        if self.flushed {
            return Err(UcLexError::AfterFlush);
        }
        for ch in chunk.chars() {
            self.push_char(ch)?;
        }
        self.emit_ready(emit, false);
        Ok(())
    }

    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        if !self.decoder.is_idle() {
            self.commit_whitespace();
        }
        self.decoder.finish(&mut self.text);
        self.check_length()?;
        if self.hanging_cr {
            self.hanging_cr = false;
            self.queue_token(UcToken::LineEnd(UcLineEnd::Cr));
        }
        self.end_text();
        self.emit_ready(emit, true);
        Ok(())
    }
}

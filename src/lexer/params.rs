use super::{decode_uri_component, uc_charge_lexer_factory, UcLexer, UcLexerFactory};
use crate::error::UcLexError;
use crate::token::{
    UcInsetId, UcToken, UC_TOKEN_CLOSING_PARENTHESIS, UC_TOKEN_DOLLAR_SIGN,
    UC_TOKEN_OPENING_PARENTHESIS,
};
use std::fmt;

enum ParamState {
    Key(String),
    Value(Box<dyn UcLexer + Send>),
}

/// Lexer for URI search parameters
///
/// `key=value&key2=value2` becomes the charge map `$key(value)$key2(value2)`.
/// Keys are form-decoded (`+` is a space). Values are form-decoded `+`s and
/// then lexed by a fresh value lexer per parameter, which does its own
/// percent-decoding. A parameter without `=` maps to the empty string.
pub struct UcUriParamsLexer {
    separator: char,
    value_lexer: UcLexerFactory,
    inset: Option<UcInsetId>,
    state: ParamState,
    params: usize,
}

impl fmt::Debug for UcUriParamsLexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UcUriParamsLexer")
            .field("separator", &self.separator)
            .field("inset", &self.inset)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl Default for UcUriParamsLexer {
    fn default() -> Self {
        Self::new()
    }
}

impl UcUriParamsLexer {
    pub fn new() -> Self {
        Self {
            separator: '&',
            value_lexer: uc_charge_lexer_factory(),
            inset: None,
            state: ParamState::Key(String::new()),
            params: 0,
        }
    }

    /// Sets the parameter separator, `&` by default
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Sets the factory of parameter value lexers
    pub fn with_value_lexer(mut self, factory: UcLexerFactory) -> Self {
        self.value_lexer = factory;
        self
    }

    /// Wraps every parameter value into inset markers with the given id
    pub fn with_inset(mut self, id: UcInsetId) -> Self {
        self.inset = Some(id);
        self
    }

    fn start_value(&mut self, raw_key: &str, emit: &mut dyn FnMut(UcToken)) {
        let key = decode_uri_component(&raw_key.replace('+', " "));
        emit(UcToken::Reserved(UC_TOKEN_DOLLAR_SIGN));
        if !key.is_empty() {
            emit(UcToken::Text(key));
        }
        emit(UcToken::Reserved(UC_TOKEN_OPENING_PARENTHESIS));
        if let Some(id) = self.inset {
            emit(UcToken::InsetStart(id));
        }
        self.params += 1;
    }

    fn end_value(&mut self, emit: &mut dyn FnMut(UcToken)) {
        if let Some(id) = self.inset {
            emit(UcToken::InsetEnd(id));
        }
        emit(UcToken::Reserved(UC_TOKEN_CLOSING_PARENTHESIS));
    }

    /// Finishes the current parameter, if any
    fn end_param(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        match std::mem::replace(&mut self.state, ParamState::Key(String::new())) {
            ParamState::Key(raw_key) => {
                if !raw_key.is_empty() {
                    self.start_value(&raw_key, emit);
                    (self.value_lexer)().flush(emit)?;
                    self.end_value(emit);
                }
            }
            ParamState::Value(mut lexer) => {
                lexer.flush(emit)?;
                self.end_value(emit);
            }
        }
        Ok(())
    }
}

impl UcLexer for UcUriParamsLexer {
    fn scan(&mut self, chunk: &str, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        let mut rest = chunk;

        while !rest.is_empty() {
            let boundary = rest.find(self.separator);
            let (segment, tail) = match boundary {
                Some(at) => (&rest[..at], &rest[at + self.separator.len_utf8()..]),
                None => (rest, ""),
            };

            let mut segment = segment;
            if let ParamState::Key(raw_key) = &mut self.state {
                match segment.find('=') {
                    Some(eq) => {
                        raw_key.push_str(&segment[..eq]);
                        let raw_key = std::mem::take(raw_key);
                        self.start_value(&raw_key, emit);
                        self.state = ParamState::Value((self.value_lexer)());
                        segment = &segment[eq + 1..];
                    }
                    None => {
                        raw_key.push_str(segment);
                        segment = "";
                    }
                }
            }
            if let ParamState::Value(lexer) = &mut self.state {
                if !segment.is_empty() {
                    lexer.scan(&segment.replace('+', " "), emit)?;
                }
            }

            if boundary.is_some() {
                self.end_param(emit)?;
            }
            rest = tail;
        }

        Ok(())
    }

    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.end_param(emit)?;
        if self.params == 0 {
            emit(UcToken::Reserved(UC_TOKEN_DOLLAR_SIGN));
        }
        Ok(())
    }
}

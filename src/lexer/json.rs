use super::{UcChargeLexer, UcLexer};
use crate::encode::encode_uc_value;
use crate::error::UcLexError;
use crate::token::UcToken;
use crate::value::UcValue;

/// Lexer for JSON insets
///
/// JSON can not be tokenized incrementally into charge tokens, so the input
/// is buffered and converted on flush: the parsed document is re-encoded as
/// charge and lexed by a [`UcChargeLexer`].
#[derive(Debug, Default)]
pub struct UcJsonLexer {
    input: String,
}

impl UcJsonLexer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UcLexer for UcJsonLexer {
    fn scan(&mut self, chunk: &str, _emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.input.push_str(chunk);
        Ok(())
    }

    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        let input = std::mem::take(&mut self.input);
        let json: serde_json::Value =
            serde_json::from_str(&input).map_err(|err| UcLexError::InvalidJson {
                line: err.line(),
                column: err.column(),
                message: err.to_string(),
            })?;

        let charge = encode_uc_value(&UcValue::from(json));
        let mut lexer = UcChargeLexer::new();
        lexer.scan(&charge, emit)?;
        lexer.flush(emit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{tokenize_uc, tokenize_uc_charge};

    #[test]
    fn test_json_becomes_charge_tokens() {
        let mut lexer = UcJsonLexer::new();
        let tokens = tokenize_uc(&mut lexer, r#"{"a": [1, true], "b": null}"#).unwrap();
        assert_eq!(tokens, tokenize_uc_charge("a((1)(!))b(--)").unwrap());
    }

    #[test]
    fn test_json_split_across_chunks() {
        let mut lexer = UcJsonLexer::new();
        let mut tokens = Vec::new();
        lexer.scan("[\"x", &mut |t| tokens.push(t)).unwrap();
        assert!(tokens.is_empty());
        lexer.scan("\", 2]", &mut |t| tokens.push(t)).unwrap();
        lexer.flush(&mut |t| tokens.push(t)).unwrap();
        assert_eq!(tokens, tokenize_uc_charge("(x)(2)").unwrap());
    }

    #[test]
    fn test_invalid_json() {
        let mut lexer = UcJsonLexer::new();
        match tokenize_uc(&mut lexer, "{\"a\":") {
            Err(UcLexError::InvalidJson { line, .. }) => assert_eq!(line, 1),
            other => panic!("unexpected {:?}", other),
        }
    }
}

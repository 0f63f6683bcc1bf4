use super::UcLexer;
use crate::error::UcLexError;
use crate::token::{UcInsetId, UcToken};

/// Marks the output of another lexer as an inset
///
/// Emits an inset start marker before the first token of the wrapped lexer
/// and the matching end marker on flush.
pub struct UcInsetLexer {
    id: UcInsetId,
    inner: Box<dyn UcLexer + Send>,
    started: bool,
}

impl UcInsetLexer {
    pub fn new(id: UcInsetId, inner: Box<dyn UcLexer + Send>) -> Self {
        Self {
            id,
            inner,
            started: false,
        }
    }

    pub fn id(&self) -> UcInsetId {
        self.id
    }

    fn start(&mut self, emit: &mut dyn FnMut(UcToken)) {
        if !self.started {
            self.started = true;
            emit(UcToken::InsetStart(self.id));
        }
    }
}

impl UcLexer for UcInsetLexer {
    fn scan(&mut self, chunk: &str, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.start(emit);
        self.inner.scan(chunk, emit)
    }

    fn flush(&mut self, emit: &mut dyn FnMut(UcToken)) -> Result<(), UcLexError> {
        self.start(emit);
        self.inner.flush(emit)?;
        emit(UcToken::InsetEnd(self.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{tokenize_uc, UcPlainTextLexer};

    #[test]
    fn test_wraps_inner_tokens() {
        let mut lexer = UcInsetLexer::new(3, Box::new(UcPlainTextLexer::new()));
        assert_eq!(
            tokenize_uc(&mut lexer, "abc").unwrap(),
            vec![
                UcToken::InsetStart(3),
                UcToken::Reserved(b'\''),
                UcToken::text("abc"),
                UcToken::InsetEnd(3),
            ]
        );
    }
}

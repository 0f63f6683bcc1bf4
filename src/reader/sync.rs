use super::{UcErrorMode, UcErrorSink, UcFind, UcReader};
use crate::error::{Result, UcrxRejection};
use crate::lexer::UcLexer;
use crate::token::{print_uc_tokens, UcInsetId, UcToken};
use tracing::trace;

#[derive(Debug)]
struct InsetFrame {
    /// Index of the inset end marker, or the end of the enclosing input
    end: usize,
    /// Whether `end` points at an end marker to step over
    terminated: bool,
}

/// Reader over a fixed token array
///
/// Keeps three cursors: the consumed boundary, the current token and the
/// next token. Insets narrow the readable range; re-lexed insets are spliced
/// into the array in place of their raw tokens.
#[derive(Debug)]
pub struct UcSyncReader {
    tokens: Vec<UcToken>,
    consumed: usize,
    current: Option<usize>,
    next: usize,
    insets: Vec<InsetFrame>,
    errors: UcErrorSink,
}

impl UcSyncReader {
    pub fn new(tokens: Vec<UcToken>) -> Self {
        Self {
            tokens,
            consumed: 0,
            current: None,
            next: 0,
            insets: Vec::new(),
            errors: UcErrorSink::default(),
        }
    }

    pub fn with_error_mode(mut self, mode: UcErrorMode) -> Self {
        self.errors = UcErrorSink::new(mode);
        self
    }

    /// Index of the first token not readable at the current inset level
    fn limit(&self) -> usize {
        self.insets
            .last()
            .map_or(self.tokens.len(), |frame| frame.end)
    }

    /// End of the token span preceding the current token
    fn prev_end(&self) -> usize {
        match self.current {
            Some(current) if current >= self.consumed => current,
            _ => self.consumed,
        }
    }

    fn advance(&mut self) -> UcToken {
        let token = self.tokens[self.next].clone();
        self.current = Some(self.next);
        self.next += 1;
        token
    }

    /// Finds the end marker matching an inset starting at `from`
    fn find_inset_end(&self, id: UcInsetId, from: usize, limit: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (index, token) in self.tokens[from..limit].iter().enumerate() {
            match token {
                UcToken::InsetStart(start) if *start == id => depth += 1,
                UcToken::InsetEnd(end) if *end == id => {
                    if depth == 0 {
                        return Some(from + index);
                    }
                    depth -= 1;
                }
                _ => {}
            }
        }
        None
    }
}

impl UcReader for UcSyncReader {
    async fn has_next(&mut self) -> Result<bool> {
        Ok(self.next < self.limit())
    }

    async fn next(&mut self) -> Result<Option<UcToken>> {
        if self.next >= self.limit() {
            return Ok(None);
        }
        Ok(Some(self.advance()))
    }

    fn current(&self) -> Option<&UcToken> {
        self.current.map(|index| &self.tokens[index])
    }

    fn has_prev(&self) -> bool {
        self.prev_end() > self.consumed
    }

    fn prev(&self) -> Vec<UcToken> {
        self.tokens[self.consumed..self.prev_end()].to_vec()
    }

    async fn peek(&mut self) -> Result<Option<&UcToken>> {
        if self.next >= self.limit() {
            return Ok(None);
        }
        Ok(self.tokens.get(self.next))
    }

    async fn find<F>(&mut self, mut matcher: F) -> Result<Option<UcToken>>
    where
        F: FnMut(&UcToken) -> UcFind,
    {
        let limit = self.limit();
        while self.next < limit {
            match matcher(&self.tokens[self.next]) {
                UcFind::Accept => return Ok(Some(self.advance())),
                UcFind::Reject => return Ok(None),
                UcFind::Undecided => {
                    self.advance();
                }
            }
        }
        Ok(None)
    }

    fn consume(&mut self) -> Vec<UcToken> {
        let span = self.tokens[self.consumed..self.next].to_vec();
        self.consumed = self.next;
        span
    }

    fn consume_prev(&mut self) -> Vec<UcToken> {
        let end = self.prev_end();
        let span = self.tokens[self.consumed..end].to_vec();
        self.consumed = end;
        span
    }

    fn skip(&mut self) {
        self.consumed = self.next;
    }

    fn omit_prev(&mut self) {
        self.consumed = self.prev_end();
    }

    async fn begin_inset(
        &mut self,
        id: UcInsetId,
        lexer: Option<Box<dyn UcLexer + Send>>,
    ) -> Result<()> {
        let limit = self.limit();
        let start = self.next;
        let found = self.find_inset_end(id, start, limit);
        let mut end = found.unwrap_or(limit);

        if let Some(mut lexer) = lexer {
            let raw = print_uc_tokens(&self.tokens[start..end]);
            let mut relexed = Vec::new();
            lexer.scan(&raw, &mut |token| crate::token::append_uc_token(&mut relexed, token))?;
            lexer.flush(&mut |token| crate::token::append_uc_token(&mut relexed, token))?;

            trace!(
                inset = id,
                raw = end - start,
                relexed = relexed.len(),
                "re-lexed inset"
            );

            let old_len = end - start;
            let new_len = relexed.len();
            self.tokens.splice(start..end, relexed);
            for frame in &mut self.insets {
                frame.end = frame.end + new_len - old_len;
            }
            end = start + new_len;
        } else {
            trace!(inset = id, tokens = end - start, "entered inset");
        }

        self.insets.push(InsetFrame {
            end,
            terminated: found.is_some(),
        });
        self.consumed = self.next;
        Ok(())
    }

    async fn end_inset(&mut self) -> Result<()> {
        if let Some(frame) = self.insets.pop() {
            self.next = if frame.terminated {
                frame.end + 1
            } else {
                frame.end
            };
            self.consumed = self.next;
        }
        Ok(())
    }

    fn error(&mut self, rejection: UcrxRejection) -> Result<()> {
        self.errors.report(rejection)
    }

    fn take_rejections(&mut self) -> Vec<UcrxRejection> {
        self.errors.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{tokenize_uc_charge, UcPlainTextLexer};
    use futures::executor::block_on;

    fn reader(input: &str) -> UcSyncReader {
        UcSyncReader::new(tokenize_uc_charge(input).unwrap())
    }

    #[test]
    fn test_next_and_prev() {
        block_on(async {
            let mut reader = reader("a(b)");
            assert_eq!(reader.next().await.unwrap(), Some(UcToken::text("a")));
            assert!(!reader.has_prev());
            assert_eq!(reader.next().await.unwrap(), Some(UcToken::Reserved(b'(')));
            assert_eq!(reader.current(), Some(&UcToken::Reserved(b'(')));
            assert_eq!(reader.prev(), vec![UcToken::text("a")]);

            assert_eq!(reader.consume_prev(), vec![UcToken::text("a")]);
            assert_eq!(reader.consume(), vec![UcToken::Reserved(b'(')]);
            assert!(reader.consume().is_empty());
        });
    }

    #[test]
    fn test_find_accept_and_reject() {
        block_on(async {
            let mut reader = reader("a,b)c");
            let found = reader
                .find(|token| {
                    if token.is_reserved(b')') {
                        UcFind::Accept
                    } else {
                        UcFind::Undecided
                    }
                })
                .await
                .unwrap();
            assert_eq!(found, Some(UcToken::Reserved(b')')));
            assert_eq!(reader.prev().len(), 3);

            reader.skip();
            let rejected = reader.find(|_| UcFind::Reject).await.unwrap();
            assert_eq!(rejected, None);
            assert_eq!(reader.peek().await.unwrap(), Some(&UcToken::text("c")));
        });
    }

    #[test]
    fn test_inset_limits_reading() {
        block_on(async {
            let tokens = vec![
                UcToken::InsetStart(1),
                UcToken::text("a"),
                UcToken::InsetEnd(1),
                UcToken::text("b"),
            ];
            let mut reader = UcSyncReader::new(tokens);
            reader.next().await.unwrap();
            reader.begin_inset(1, None).await.unwrap();

            assert_eq!(reader.next().await.unwrap(), Some(UcToken::text("a")));
            assert!(!reader.has_next().await.unwrap());

            reader.end_inset().await.unwrap();
            assert_eq!(reader.next().await.unwrap(), Some(UcToken::text("b")));
        });
    }

    #[test]
    fn test_inset_relexed_in_place() {
        block_on(async {
            let tokens = vec![
                UcToken::InsetStart(2),
                UcToken::text("x"),
                UcToken::Reserved(b'('),
                UcToken::InsetEnd(2),
                UcToken::Reserved(b')'),
            ];
            let mut reader = UcSyncReader::new(tokens);
            reader.next().await.unwrap();
            reader
                .begin_inset(2, Some(Box::new(UcPlainTextLexer::new())))
                .await
                .unwrap();

            assert_eq!(reader.next().await.unwrap(), Some(UcToken::Reserved(b'\'')));
            assert_eq!(reader.next().await.unwrap(), Some(UcToken::text("x(")));
            assert_eq!(reader.next().await.unwrap(), None);

            reader.end_inset().await.unwrap();
            assert_eq!(reader.next().await.unwrap(), Some(UcToken::Reserved(b')')));
        });
    }
}

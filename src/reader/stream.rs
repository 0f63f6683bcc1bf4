use super::{UcErrorMode, UcErrorSink, UcFind, UcReader};
use crate::error::{Result, UcError, UcrxRejection};
use crate::lexer::UcLexer;
use crate::token::{append_uc_token, print_uc_token, UcInsetId, UcToken};
use futures::future::LocalBoxFuture;
use futures::stream::{self, Fuse};
use futures::{FutureExt, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use tracing::trace;

/// Token source swapped in while an inset is read
struct InsetLayer {
    id: UcInsetId,
    /// Nested starts of the same id seen inside this inset
    depth: usize,
    lexer: Option<Box<dyn UcLexer + Send>>,
    /// Lookahead pulled before the inset began; read before the source
    backlog: VecDeque<UcToken>,
    /// Output of the lexer not read yet
    pending: VecDeque<UcToken>,
    /// Lexer output that may still merge with the next output
    tail: Vec<UcToken>,
    done: bool,
}

impl InsetLayer {
    fn scan(&mut self, token: &UcToken) -> Result<()> {
        if let Some(lexer) = &mut self.lexer {
            let mut raw = String::new();
            print_uc_token(&mut raw, token);
            let tail = &mut self.tail;
            lexer.scan(&raw, &mut |token| append_uc_token(tail, token))?;
            release_tail(&mut self.tail, &mut self.pending, false);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.done = true;
        if let Some(lexer) = &mut self.lexer {
            let tail = &mut self.tail;
            lexer.flush(&mut |token| append_uc_token(tail, token))?;
        }
        release_tail(&mut self.tail, &mut self.pending, true);
        Ok(())
    }
}

/// Moves settled lexer output to `ready`
///
/// Trailing text or padding stays in `tail` unless `all` is set, as the next
/// output may merge with it.
fn release_tail(tail: &mut Vec<UcToken>, ready: &mut VecDeque<UcToken>, all: bool) {
    let keep = usize::from(
        !all && matches!(tail.last(), Some(UcToken::Text(_) | UcToken::Padding { .. })),
    );
    let settled = tail.len() - keep;
    ready.extend(tail.drain(..settled));
}

/// Reader pulling tokens from a stream
///
/// Tokens read since the consumed boundary, plus any lookahead, are kept in
/// a window; everything before the boundary is released. The stream ending
/// is the end of input; a stream error aborts the parse.
pub struct UcAsyncReader<S> {
    source: Fuse<S>,
    window: VecDeque<UcToken>,
    /// Window index of the next token
    next: usize,
    /// Window index of the current token, while it is still in the window
    current_index: Option<usize>,
    current: Option<UcToken>,
    layers: Vec<InsetLayer>,
    errors: UcErrorSink,
}

impl<S> fmt::Debug for UcAsyncReader<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UcAsyncReader")
            .field("window", &self.window)
            .field("next", &self.next)
            .field("current", &self.current)
            .field("insets", &self.layers.len())
            .finish_non_exhaustive()
    }
}

impl<S> UcAsyncReader<S>
where
    S: Stream<Item = Result<UcToken>> + Unpin,
{
    pub fn new(source: S) -> Self {
        Self {
            source: source.fuse(),
            window: VecDeque::new(),
            next: 0,
            current_index: None,
            current: None,
            layers: Vec::new(),
            errors: UcErrorSink::default(),
        }
    }

    pub fn with_error_mode(mut self, mode: UcErrorMode) -> Self {
        self.errors = UcErrorSink::new(mode);
        self
    }

    /// Pulls the next token as seen through the first `level` inset layers
    fn pull_level(&mut self, level: usize) -> LocalBoxFuture<'_, Result<Option<UcToken>>> {
        async move {
            if level == 0 {
                return self.source.next().await.transpose();
            }

            loop {
                let layer = &mut self.layers[level - 1];
                if let Some(token) = layer.pending.pop_front() {
                    return Ok(Some(token));
                }
                if layer.done {
                    return Ok(None);
                }

                let token = match layer.backlog.pop_front() {
                    Some(token) => Some(token),
                    None => self.pull_level(level - 1).await?,
                };

                let layer = &mut self.layers[level - 1];
                let token = match token {
                    None => {
                        layer.finish()?;
                        continue;
                    }
                    Some(UcToken::InsetEnd(id)) if id == layer.id && layer.depth == 0 => {
                        layer.finish()?;
                        continue;
                    }
                    Some(token) => token,
                };
                match token {
                    UcToken::InsetStart(id) if id == layer.id => layer.depth += 1,
                    UcToken::InsetEnd(id) if id == layer.id => layer.depth -= 1,
                    _ => {}
                }

                if layer.lexer.is_none() {
                    return Ok(Some(token));
                }
                layer.scan(&token)?;
            }
        }
        .boxed_local()
    }

    /// Makes sure the window holds the next token; false at end of input
    async fn fill(&mut self) -> Result<bool> {
        if self.next < self.window.len() {
            return Ok(true);
        }
        match self.pull_level(self.layers.len()).await? {
            Some(token) => {
                self.window.push_back(token);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn advance(&mut self) -> UcToken {
        let token = self.window[self.next].clone();
        self.current_index = Some(self.next);
        self.current = Some(token.clone());
        self.next += 1;
        token
    }

    fn prev_end(&self) -> usize {
        self.current_index.unwrap_or(0)
    }

    /// Releases the first `count` window tokens
    fn release(&mut self, count: usize) -> Vec<UcToken> {
        let span: Vec<UcToken> = self.window.drain(..count).collect();
        self.next -= count;
        self.current_index = self
            .current_index
            .and_then(|index| index.checked_sub(count));
        span
    }
}

impl<S> UcReader for UcAsyncReader<S>
where
    S: Stream<Item = Result<UcToken>> + Unpin,
{
    async fn has_next(&mut self) -> Result<bool> {
        self.fill().await
    }

    async fn next(&mut self) -> Result<Option<UcToken>> {
        if !self.fill().await? {
            return Ok(None);
        }
        Ok(Some(self.advance()))
    }

    fn current(&self) -> Option<&UcToken> {
        self.current.as_ref()
    }

    fn has_prev(&self) -> bool {
        self.prev_end() > 0
    }

    fn prev(&self) -> Vec<UcToken> {
        self.window.range(..self.prev_end()).cloned().collect()
    }

    async fn peek(&mut self) -> Result<Option<&UcToken>> {
        if !self.fill().await? {
            return Ok(None);
        }
        Ok(self.window.get(self.next))
    }

    async fn find<F>(&mut self, mut matcher: F) -> Result<Option<UcToken>>
    where
        F: FnMut(&UcToken) -> UcFind,
    {
        while self.fill().await? {
            match matcher(&self.window[self.next]) {
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
        let count = self.next;
        self.release(count)
    }

    fn consume_prev(&mut self) -> Vec<UcToken> {
        let count = self.prev_end();
        self.release(count)
    }

    fn skip(&mut self) {
        let count = self.next;
        self.release(count);
    }

    fn omit_prev(&mut self) {
        let count = self.prev_end();
        self.release(count);
    }

    async fn begin_inset(
        &mut self,
        id: UcInsetId,
        lexer: Option<Box<dyn UcLexer + Send>>,
    ) -> Result<()> {
        // Lookahead already pulled belongs to the inset
        let backlog: VecDeque<UcToken> = self.window.drain(self.next..).collect();
        self.skip();

        trace!(
            inset = id,
            relexed = lexer.is_some(),
            backlog = backlog.len(),
            "entered inset"
        );
        self.layers.push(InsetLayer {
            id,
            depth: 0,
            lexer,
            backlog,
            pending: VecDeque::new(),
            tail: Vec::new(),
            done: false,
        });
        Ok(())
    }

    async fn end_inset(&mut self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(UcError::ReaderMisuse("no inset to end"));
        }

        // Drain whatever the inset still holds
        self.window.truncate(self.next);
        while self.pull_level(self.layers.len()).await?.is_some() {}
        self.skip();

        if let Some(layer) = self.layers.pop() {
            trace!(inset = layer.id, "left inset");
            // Tokens pulled from below but not used by the inset
            for token in layer.backlog.into_iter().rev() {
                self.window.push_front(token);
            }
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

struct LexState<S> {
    chunks: S,
    lexer: Box<dyn UcLexer + Send>,
    ready: VecDeque<UcToken>,
    /// Lexer output that may still merge with the next output
    tail: Vec<UcToken>,
    done: bool,
}

impl<S> LexState<S> {
    fn release(&mut self, all: bool) {
        release_tail(&mut self.tail, &mut self.ready, all);
    }
}

/// Lexes a stream of text chunks into a token stream
///
/// Adjacent text and padding tokens are coalesced across chunks. A chunk
/// error ends the stream with [`UcError::Stream`].
pub fn lex_uc_stream<S, T, E>(
    chunks: S,
    lexer: Box<dyn UcLexer + Send>,
) -> impl Stream<Item = Result<UcToken>>
where
    S: Stream<Item = std::result::Result<T, E>> + Unpin,
    T: AsRef<str>,
    E: fmt::Display,
{
    let state = LexState {
        chunks,
        lexer,
        ready: VecDeque::new(),
        tail: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.ready.pop_front() {
                return Some((Ok(token), state));
            }
            if state.done {
                return None;
            }

            let tail = &mut state.tail;
            let result = match state.chunks.next().await {
                Some(Ok(chunk)) => state
                    .lexer
                    .scan(chunk.as_ref(), &mut |token| append_uc_token(tail, token))
                    .map(|()| false),
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(UcError::Stream(err.to_string())), state));
                }
                None => state
                    .lexer
                    .flush(&mut |token| append_uc_token(tail, token))
                    .map(|()| true),
            };

            match result {
                Ok(finished) => {
                    state.done = finished;
                    state.release(finished);
                }
                Err(err) => {
                    state.done = true;
                    return Some((Err(err.into()), state));
                }
            }
        }
    })
}

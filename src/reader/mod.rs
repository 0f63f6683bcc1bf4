//! Token readers and the URI Charge grammar driver
//!
//! A reader exposes a token sequence with lookahead and a "consumed" boundary
//! that lets the grammar collect raw token spans (entities, quoted strings,
//! directive values) without re-fetching them. [`UcSyncReader`] works over a
//! token array and never suspends; [`UcAsyncReader`] pulls tokens from a
//! stream. [`UcParser`] drives either of them into a [`Ucrx`].
//!
//! Both readers share the async [`UcReader`] interface. The synchronous
//! reader's futures are always ready, so synchronous entry points resolve
//! them with [`FutureExt::now_or_never`].

mod grammar;
mod stream;
mod sync;

pub use grammar::UcParser;
pub use stream::{lex_uc_stream, UcAsyncReader};
pub use sync::UcSyncReader;

use crate::error::{Result, UcError, UcrxRejection};
use crate::extensions::UcExtensions;
use crate::lexer::{tokenize_uc_charge, UcChargeLexer, UcLexer, UcLexerFactory};
use crate::rx::{UcValueRx, Ucrx};
use crate::token::{UcInsetId, UcToken};
use crate::value::UcValue;
use futures::{FutureExt, Stream};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Verdict of a [`UcReader::find`] predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcFind {
    /// Stop at this token, making it current
    Accept,
    /// Stop before this token
    Reject,
    /// Take this token and keep scanning
    Undecided,
}

/// What a reader does with reported rejections
#[derive(Default)]
pub enum UcErrorMode {
    /// Abort the parse with [`UcError::Rejected`] on the first rejection
    #[default]
    Raise,
    /// Collect every rejection and keep parsing
    Collect,
    /// Hand every rejection to a callback; an error aborts the parse
    Callback(Box<dyn FnMut(UcrxRejection) -> Result<()> + Send>),
}

impl fmt::Debug for UcErrorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UcErrorMode::Raise => f.write_str("Raise"),
            UcErrorMode::Collect => f.write_str("Collect"),
            UcErrorMode::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Rejection funnel owned by a reader
#[derive(Debug, Default)]
pub(crate) struct UcErrorSink {
    mode: UcErrorMode,
    collected: Vec<UcrxRejection>,
}

impl UcErrorSink {
    pub(crate) fn new(mode: UcErrorMode) -> Self {
        Self {
            mode,
            collected: Vec::new(),
        }
    }

    pub(crate) fn report(&mut self, rejection: UcrxRejection) -> Result<()> {
        debug!(
            code = %rejection.code,
            path = %crate::error::format_uc_path(&rejection.path),
            message = %rejection.message,
            "rejection reported"
        );
        match &mut self.mode {
            UcErrorMode::Raise => Err(UcError::from(rejection)),
            UcErrorMode::Collect => {
                self.collected.push(rejection);
                Ok(())
            }
            UcErrorMode::Callback(callback) => callback(rejection),
        }
    }

    pub(crate) fn take(&mut self) -> Vec<UcrxRejection> {
        std::mem::take(&mut self.collected)
    }
}

/// Token source with lookahead, consumed-boundary tracking and inset support
///
/// `next` advances and makes the token current. Tokens read since the last
/// boundary (set by `consume`, `consume_prev`, `skip` or `omit_prev`) can be
/// taken back as a span. Inside an inset the reader reports end of input at
/// the inset end marker until [`UcReader::end_inset`] is called.
#[allow(async_fn_in_trait)]
pub trait UcReader {
    /// Whether another token is available
    async fn has_next(&mut self) -> Result<bool>;

    /// Advances to the next token, making it current
    async fn next(&mut self) -> Result<Option<UcToken>>;

    /// Last token returned by `next` or accepted by `find`
    fn current(&self) -> Option<&UcToken>;

    /// Whether tokens before the current one were read since the boundary
    fn has_prev(&self) -> bool;

    /// Tokens read since the boundary, excluding the current one
    fn prev(&self) -> Vec<UcToken>;

    /// Next token, without advancing
    async fn peek(&mut self) -> Result<Option<&UcToken>>;

    /// Scans forward until the matcher accepts or rejects a token
    ///
    /// Returns the accepted token, or `None` when a token was rejected or
    /// the input ended. Every token the matcher left undecided is read.
    async fn find<F>(&mut self, matcher: F) -> Result<Option<UcToken>>
    where
        F: FnMut(&UcToken) -> UcFind;

    /// Takes the tokens read since the boundary and moves the boundary
    fn consume(&mut self) -> Vec<UcToken>;

    /// Like `consume`, but leaves the current token after the boundary
    fn consume_prev(&mut self) -> Vec<UcToken>;

    /// Drops the tokens read since the boundary
    fn skip(&mut self);

    /// Drops the tokens before the current one
    fn omit_prev(&mut self);

    /// Enters the inset whose start marker is the current token
    ///
    /// With a lexer, the raw inset text is re-lexed by it; without one, the
    /// inset tokens are read as they are.
    async fn begin_inset(
        &mut self,
        id: UcInsetId,
        lexer: Option<Box<dyn UcLexer + Send>>,
    ) -> Result<()>;

    /// Leaves the innermost inset, skipping whatever was not read
    async fn end_inset(&mut self) -> Result<()>;

    /// Reports a rejection through the configured [`UcErrorMode`]
    fn error(&mut self, rejection: UcrxRejection) -> Result<()>;

    /// Rejections collected in [`UcErrorMode::Collect`] mode
    fn take_rejections(&mut self) -> Vec<UcrxRejection>;
}

/// Reader configuration
pub struct UcReaderOptions {
    /// What to do with rejections
    pub error_mode: UcErrorMode,
    /// Maximum nesting depth to prevent stack overflow
    pub max_depth: usize,
    /// Entity, directive and format handlers
    pub extensions: Arc<UcExtensions>,
    /// Lexers for insets by inset id; unknown insets are read as is
    pub insets: HashMap<UcInsetId, UcLexerFactory>,
}

impl Default for UcReaderOptions {
    fn default() -> Self {
        Self {
            error_mode: UcErrorMode::Raise,
            max_depth: 128,
            extensions: Arc::new(UcExtensions::default()),
            insets: HashMap::new(),
        }
    }
}

impl fmt::Debug for UcReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut insets: Vec<&UcInsetId> = self.insets.keys().collect();
        insets.sort();
        f.debug_struct("UcReaderOptions")
            .field("error_mode", &self.error_mode)
            .field("max_depth", &self.max_depth)
            .field("extensions", &self.extensions)
            .field("insets", &insets)
            .finish()
    }
}

impl UcReaderOptions {
    /// Creates reader options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the error mode
    pub fn with_error_mode(mut self, error_mode: UcErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    /// Collects rejections instead of failing on the first one
    pub fn collect_errors(self) -> Self {
        self.with_error_mode(UcErrorMode::Collect)
    }

    /// Sets the maximum nesting depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the extension registry
    pub fn with_extensions(mut self, extensions: UcExtensions) -> Self {
        self.extensions = Arc::new(extensions);
        self
    }

    /// Sets an extension registry shared with other readers
    pub fn with_shared_extensions(mut self, extensions: Arc<UcExtensions>) -> Self {
        self.extensions = extensions;
        self
    }

    /// Registers the lexer for an inset id
    pub fn with_inset(mut self, id: UcInsetId, factory: UcLexerFactory) -> Self {
        self.insets.insert(id, factory);
        self
    }
}

/// Parses charge text into a receiver
///
/// Returns the rejections collected in [`UcErrorMode::Collect`] mode; in the
/// default mode the first rejection is returned as [`UcError::Rejected`].
pub fn parse_uc_value(
    text: &str,
    rx: &mut dyn Ucrx,
    options: UcReaderOptions,
) -> Result<Vec<UcrxRejection>> {
    let tokens = tokenize_uc_charge(text)?;
    parse_uc_tokens(tokens, rx, options)
}

/// Parses pre-lexed tokens into a receiver
pub fn parse_uc_tokens(
    tokens: Vec<UcToken>,
    rx: &mut dyn Ucrx,
    mut options: UcReaderOptions,
) -> Result<Vec<UcrxRejection>> {
    let error_mode = std::mem::take(&mut options.error_mode);
    let reader = UcSyncReader::new(tokens).with_error_mode(error_mode);
    let mut parser = UcParser::new(reader, &options);

    parser
        .parse(rx)
        .now_or_never()
        .ok_or(UcError::ReaderMisuse("synchronous reader suspended"))??;
    Ok(parser.into_reader().take_rejections())
}

/// Parses charge text into a [`UcValue`]
pub fn parse_uc(text: &str) -> Result<UcValue> {
    let mut rx = UcValueRx::new();
    parse_uc_value(text, &mut rx, UcReaderOptions::default())?;
    Ok(rx.into_value().unwrap_or_else(|| UcValue::from("")))
}

/// Parses a token stream into a receiver
pub async fn parse_uc_value_async<S>(
    tokens: S,
    rx: &mut dyn Ucrx,
    mut options: UcReaderOptions,
) -> Result<Vec<UcrxRejection>>
where
    S: Stream<Item = Result<UcToken>> + Unpin,
{
    let error_mode = std::mem::take(&mut options.error_mode);
    let reader = UcAsyncReader::new(tokens).with_error_mode(error_mode);
    let mut parser = UcParser::new(reader, &options);

    parser.parse(rx).await?;
    Ok(parser.into_reader().take_rejections())
}

/// Parses a stream of charge text chunks into a [`UcValue`]
pub async fn parse_uc_async<S, T, E>(chunks: S) -> Result<UcValue>
where
    S: Stream<Item = std::result::Result<T, E>> + Unpin,
    T: AsRef<str>,
    E: fmt::Display,
{
    let tokens = Box::pin(lex_uc_stream(chunks, Box::new(UcChargeLexer::new())));
    let mut rx = UcValueRx::new();
    parse_uc_value_async(tokens, &mut rx, UcReaderOptions::default()).await?;
    Ok(rx.into_value().unwrap_or_else(|| UcValue::from("")))
}

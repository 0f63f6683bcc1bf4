//! Error types and rejection reporting for URI Charge parsing
//!
//! Decoding problems come in two layers. A [`UcrxRejection`] is a recoverable,
//! structured report funneled through the reader: the parse may continue with
//! the rejected subtree routed to an opaque receiver. A [`UcError`] aborts the
//! parse call, either because the configured error mode raises rejections or
//! because something outside the rejection taxonomy went wrong (lexer failure,
//! stream failure, nesting limit, reader misuse).

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Closed set of rejection codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UcrxRejectionCode {
    /// The receiver does not accept a value of the given type
    UnexpectedType,
    /// The input violates the charge grammar or a literal's syntax
    InvalidSyntax,
    /// A map entry the receiver does not know about
    UnexpectedEntry,
    /// Required map entries were never supplied
    MissingEntries,
    /// An entity no handler and no receiver accepted
    UnrecognizedEntity,
    /// A `!format'name(...)` whose format is unknown
    UnrecognizedFormat,
    /// Catch-all wrapping an arbitrary cause
    Error,
}

impl UcrxRejectionCode {
    /// Returns the wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            UcrxRejectionCode::UnexpectedType => "unexpectedType",
            UcrxRejectionCode::InvalidSyntax => "invalidSyntax",
            UcrxRejectionCode::UnexpectedEntry => "unexpectedEntry",
            UcrxRejectionCode::MissingEntries => "missingEntries",
            UcrxRejectionCode::UnrecognizedEntity => "unrecognizedEntity",
            UcrxRejectionCode::UnrecognizedFormat => "unrecognizedFormat",
            UcrxRejectionCode::Error => "error",
        }
    }
}

impl fmt::Display for UcrxRejectionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the path from the document root to a value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UcPathStep {
    /// Map entry key
    Key(String),
    /// Zero-based list item index
    Index(usize),
}

impl fmt::Display for UcPathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UcPathStep::Key(key) => write!(f, ".{}", key),
            UcPathStep::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Renders a path as `$.key[0].other`
pub fn format_uc_path(path: &[UcPathStep]) -> String {
    let mut out = String::from("$");
    for step in path {
        out.push_str(&step.to_string());
    }
    out
}

/// Code-specific rejection payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UcrxRejectionDetails {
    #[default]
    None,
    /// Expected type names (from the receiver's `types()`) and the actual type
    Types {
        expected: Vec<String>,
        actual: String,
    },
    /// Entry keys (unexpected or missing)
    Entries(Vec<String>),
    /// Unrecognized entity text
    Entity(String),
    /// Unrecognized format name
    Format(String),
    /// Offending input text
    Input(String),
}

/// Structured, recoverable decode failure
#[derive(Debug, Clone)]
pub struct UcrxRejection {
    /// Rejection code
    pub code: UcrxRejectionCode,
    /// Code-specific payload
    pub details: UcrxRejectionDetails,
    /// Path from the document root to the failure
    pub path: Vec<UcPathStep>,
    /// Human-readable message
    pub message: String,
    /// Underlying cause, if any
    pub cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl UcrxRejection {
    /// Creates a rejection with no details at the document root
    pub fn new(code: UcrxRejectionCode, message: impl Into<String>) -> Self {
        Self {
            code,
            details: UcrxRejectionDetails::None,
            path: Vec::new(),
            message: message.into(),
            cause: None,
        }
    }

    /// Value of type `actual` is not one of the `expected` types
    pub fn unexpected_type(actual: &str, expected: &[&str]) -> Self {
        let message = if expected.is_empty() {
            format!("Unexpected {}", actual)
        } else {
            format!("Unexpected {}, while {} expected", actual, expected.join(" or "))
        };
        Self::new(UcrxRejectionCode::UnexpectedType, message).with_details(
            UcrxRejectionDetails::Types {
                expected: expected.iter().map(|t| t.to_string()).collect(),
                actual: actual.to_string(),
            },
        )
    }

    /// Grammar or literal syntax violation
    pub fn invalid_syntax(message: impl Into<String>) -> Self {
        Self::new(UcrxRejectionCode::InvalidSyntax, message)
    }

    /// Literal that failed to parse
    pub fn invalid_literal(kind: &str, input: &str) -> Self {
        Self::invalid_syntax(format!("Invalid {} literal: {}", kind, input))
            .with_details(UcrxRejectionDetails::Input(input.to_string()))
    }

    /// Map entry the receiver does not know
    pub fn unexpected_entry(key: &str) -> Self {
        Self::new(
            UcrxRejectionCode::UnexpectedEntry,
            format!("Unexpected entry: {}", key),
        )
        .with_details(UcrxRejectionDetails::Entries(vec![key.to_string()]))
    }

    /// Required entries never supplied
    pub fn missing_entries<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        Self::new(
            UcrxRejectionCode::MissingEntries,
            format!("Missing entries: {}", keys.join(", ")),
        )
        .with_details(UcrxRejectionDetails::Entries(keys))
    }

    /// Entity nobody accepted
    pub fn unrecognized_entity(entity: &str) -> Self {
        Self::new(
            UcrxRejectionCode::UnrecognizedEntity,
            format!("Unrecognized entity: {}", entity),
        )
        .with_details(UcrxRejectionDetails::Entity(entity.to_string()))
    }

    /// Unknown `!format'name`
    pub fn unrecognized_format(format: &str) -> Self {
        Self::new(
            UcrxRejectionCode::UnrecognizedFormat,
            format!("Unrecognized format: {}", format),
        )
        .with_details(UcrxRejectionDetails::Format(format.to_string()))
    }

    /// Catch-all rejection wrapping a cause
    pub fn error<E>(cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::new(UcrxRejectionCode::Error, cause.to_string()).with_cause(cause)
    }

    /// Replaces the details
    pub fn with_details(mut self, details: UcrxRejectionDetails) -> Self {
        self.details = details;
        self
    }

    /// Attaches a cause
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// Sets the path
    pub fn at(mut self, path: &[UcPathStep]) -> Self {
        self.path = path.to_vec();
        self
    }

    /// Expected type names, for `unexpectedType` rejections
    pub fn expected_types(&self) -> &[String] {
        match &self.details {
            UcrxRejectionDetails::Types { expected, .. } => expected,
            _ => &[],
        }
    }
}

impl fmt::Display for UcrxRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {}: {}",
            self.code,
            format_uc_path(&self.path),
            self.message
        )
    }
}

impl PartialEq for UcrxRejection {
    // Causes are opaque and do not take part in comparison
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.details == other.details
            && self.path == other.path
            && self.message == other.message
    }
}

impl StdError for UcrxRejection {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Lexical errors raised by non-charge lexers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UcLexError {
    /// JSON inset text is not valid JSON
    #[error("Invalid JSON at line {line}, column {column}: {message}")]
    InvalidJson {
        line: usize,
        column: usize,
        message: String,
    },

    /// A single text token grew past the configured limit
    #[error("Text token exceeds maximum length of {limit} bytes")]
    TextTooLong { limit: usize },

    /// The lexer was fed after being flushed
    #[error("Lexer input received after flush")]
    AfterFlush,
}

/// Main error type for URI Charge operations
#[derive(Debug, Error)]
pub enum UcError {
    /// A rejection raised by the reader's error mode
    #[error("{0}")]
    Rejected(Box<UcrxRejection>),

    /// Lexical analysis error
    #[error("Lexical error: {0}")]
    Lex(#[from] UcLexError),

    /// The token stream failed
    #[error("Token stream error: {0}")]
    Stream(String),

    /// Nesting went deeper than the configured limit
    #[error("Maximum nesting depth of {limit} exceeded at {path}")]
    DepthExceeded { limit: usize, path: String },

    /// Programming-contract violation while driving a reader
    #[error("Reader misuse: {0}")]
    ReaderMisuse(&'static str),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serde integration error
    #[error("Serde error: {0}")]
    Serde(String),
}

impl UcError {
    /// Returns the rejection carried by [`UcError::Rejected`]
    pub fn rejection(&self) -> Option<&UcrxRejection> {
        match self {
            UcError::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

impl From<UcrxRejection> for UcError {
    fn from(rejection: UcrxRejection) -> Self {
        UcError::Rejected(Box::new(rejection))
    }
}

impl serde::de::Error for UcError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        UcError::Serde(msg.to_string())
    }
}

impl serde::ser::Error for UcError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        UcError::Serde(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UcError>;

//! # churi
//!
//! A URI Charge codec: streaming lexers, a push-based receiver protocol and
//! serde integration for structured data embedded in URIs.
//!
//! ## Overview
//!
//! URI Charge encodes booleans, nulls, numbers, bigints, strings, lists, maps
//! and application-defined entities using only characters that are valid in
//! a URI component. Decoding runs as a pipeline:
//!
//! - a **lexer** turns text chunks into tokens ([`UcChargeLexer`], or one of
//!   the alternative lexers for URI parameters, JSON or plain text);
//! - a **reader** ([`UcSyncReader`] over a token array, [`UcAsyncReader`] over
//!   a token stream) gives the grammar lookahead and raw token spans;
//! - the **grammar** ([`UcParser`]) pushes values into a **charge receiver**
//!   ([`Ucrx`]), which builds the result or rejects what it cannot accept.
//!
//! ## Key Features
//!
//! - **Chunk-independent lexing**: input may be split anywhere, even inside
//!   a percent-escape
//! - **Recoverable rejections**: collect every problem in a document, each
//!   with the path to the offending entry
//! - **Extensible**: entity, prefix, directive and format handlers
//! - **Insets**: delegate parts of the input to a different lexer
//! - **Serde Integration**: `from_str` / `to_string` for any serde type
//! - **Bounded output buffering** through [`UcMemory`]
//!
//! ## Basic Usage
//!
//! ```rust
//! use churi::{parse_uc, UcValue};
//!
//! let value = parse_uc("name(churi)tags((uri)(codec))draft(-)")?;
//! assert_eq!(value.get("name"), Some(&UcValue::from("churi")));
//! assert_eq!(value.get("draft"), Some(&UcValue::Bool(false)));
//! # Ok::<(), churi::UcError>(())
//! ```
//!
//! ## Serde
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Deserialize, Serialize, PartialEq)]
//! struct Search {
//!     query: String,
//!     page: u32,
//! }
//!
//! let search: Search = churi::from_str("query(rust%20codec)page(2)")?;
//! assert_eq!(search.query, "rust codec");
//! assert_eq!(churi::to_string(&search)?, "query(rust%20codec)page(2)");
//! # Ok::<(), churi::UcError>(())
//! ```
//!
//! ## Error Handling
//!
//! By default the first rejection aborts the parse. Collecting keeps going
//! and returns every rejection, with rejected parts left out of the result:
//!
//! ```rust
//! use churi::{parse_uc_value, UcReaderOptions, UcValueRx, UcrxRejectionCode};
//!
//! let mut rx = UcValueRx::new();
//! let rejections = parse_uc_value(
//!     "foo(bar)baz(1",
//!     &mut rx,
//!     UcReaderOptions::new().collect_errors(),
//! )?;
//!
//! assert_eq!(rejections[0].code, UcrxRejectionCode::InvalidSyntax);
//! assert!(rx.into_value().unwrap().get("foo").is_some());
//! # Ok::<(), churi::UcError>(())
//! ```
//!
//! ## Extensions
//!
//! ```rust
//! use churi::{UcExtensions, UcReaderOptions, UcValueRx, UcrxPush, parse_uc_value};
//!
//! let mut extensions = UcExtensions::default();
//! extensions.add_prefix("!env'", |rx: &mut dyn churi::Ucrx, cx: &mut churi::UcrxContext, name: &str| {
//!     rx.push_string(&format!("${{{}}}", name), cx)
//! });
//!
//! let mut rx = UcValueRx::new();
//! parse_uc_value("!env'HOME", &mut rx, UcReaderOptions::new().with_extensions(extensions))?;
//! assert_eq!(rx.into_value(), Some(churi::UcValue::from("${HOME}")));
//! # Ok::<(), churi::UcError>(())
//! ```

pub mod de;
pub mod decode;
pub mod encode;
pub mod error;
pub mod extensions;
pub mod lexer;
pub mod memory;
pub mod reader;
pub mod rx;
pub mod ser;
pub mod token;
pub mod value;

// Re-export main types for convenience
pub use de::{from_str, from_str_with_options, from_value, UcDeserializer};
pub use decode::{decode_uc_primitive, decode_uc_text, UcPrimitive};
pub use encode::{encode_uc_value, UcEncoder};
pub use error::{
    format_uc_path, Result, UcError, UcLexError, UcPathStep, UcrxRejection, UcrxRejectionCode,
    UcrxRejectionDetails,
};
pub use extensions::{
    UcDirectiveHandler, UcEntityHandler, UcExtension, UcExtensions, UcFormatHandler,
};
pub use lexer::{
    tokenize_uc, tokenize_uc_charge, uc_charge_lexer_factory, UcChargeLexer,
    UcChargeLexerConfig, UcInsetLexer, UcJsonLexer, UcLexer, UcLexerFactory, UcPlainTextLexer,
    UcUriEncodedLexer, UcUriParamsLexer,
};
pub use memory::{write_uc_value_async, UcMemory};
pub use reader::{
    lex_uc_stream, parse_uc, parse_uc_async, parse_uc_tokens, parse_uc_value,
    parse_uc_value_async, UcAsyncReader, UcErrorMode, UcFind, UcParser, UcReader,
    UcReaderOptions, UcSyncReader,
};
pub use rx::{
    OpaqueUcrx, UcMapRx, UcTypedRx, UcValueRx, Ucrx, UcrxContext, UcrxHandle, UcrxKeyTarget,
    UcrxOutcome, UcrxPush,
};
pub use ser::{to_string, to_value, UcValueSerializer};
pub use token::{print_uc_tokens, UcInsetId, UcLineEnd, UcToken};
pub use value::{UcList, UcMap, UcValue};

//! Token model shared by lexers and readers
//!
//! A token is either a non-empty decoded text chunk or a small code. Codes are
//! reserved characters, line terminators, padding runs and inset markers. The
//! integer encoding of codes is exposed through [`UcToken::code`] and
//! [`UcToken::from_code`] for code generated against this token model.

use std::fmt;

pub const UC_TOKEN_EXCLAMATION_MARK: u8 = b'!';
pub const UC_TOKEN_DOLLAR_SIGN: u8 = b'$';
pub const UC_TOKEN_AMPERSAND: u8 = b'&';
pub const UC_TOKEN_APOSTROPHE: u8 = b'\'';
pub const UC_TOKEN_OPENING_PARENTHESIS: u8 = b'(';
pub const UC_TOKEN_CLOSING_PARENTHESIS: u8 = b')';
pub const UC_TOKEN_ASTERISK: u8 = b'*';
pub const UC_TOKEN_PLUS_SIGN: u8 = b'+';
pub const UC_TOKEN_COMMA: u8 = b',';
pub const UC_TOKEN_SLASH: u8 = b'/';
pub const UC_TOKEN_COLON: u8 = b':';
pub const UC_TOKEN_SEMICOLON: u8 = b';';
pub const UC_TOKEN_EQUALS_SIGN: u8 = b'=';
pub const UC_TOKEN_QUESTION_MARK: u8 = b'?';
pub const UC_TOKEN_AT_SIGN: u8 = b'@';
pub const UC_TOKEN_OPENING_BRACKET: u8 = b'[';
pub const UC_TOKEN_CLOSING_BRACKET: u8 = b']';

pub const UC_TOKEN_LF: u32 = 0x0a;
pub const UC_TOKEN_CR: u32 = 0x0d;
pub const UC_TOKEN_CRLF: u32 = 0x0d0a;

pub const UC_TOKEN_PREFIX_SPACE: u32 = 0x20;
pub const UC_TOKEN_PREFIX_TAB: u32 = 0x09;
pub const UC_TOKEN_PREFIX_INSET_START: u32 = 0x1e;
pub const UC_TOKEN_PREFIX_INSET_END: u32 = 0x1f;

/// Maximum repeat count a single padding token carries
pub const UC_PADDING_MAX_REPEAT: u16 = 256;

/// Identifier of an inset format
pub type UcInsetId = u16;

/// Bitfield flags for character classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UcCharFlags(u8);

impl UcCharFlags {
    /// Reserved characters, emitted as codes by the charge lexer
    pub const RESERVED: Self = Self(1 << 0);
    /// Reserved characters the grammar assigns meaning to
    pub const STRUCTURAL: Self = Self(1 << 1);
    /// Padding characters (space, tab)
    pub const PADDING: Self = Self(1 << 2);
    /// Line terminator characters (LF, CR)
    pub const LINE_END: Self = Self(1 << 3);
    /// ASCII digits
    pub const DIGIT: Self = Self(1 << 4);
    /// Characters the encoder writes without percent-encoding
    pub const URI_SAFE: Self = Self(1 << 5);

    /// Creates empty flags
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Checks if any of the given flags are set
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Returns the union of two flag sets
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for UcCharFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Character lookup table for O(1) ASCII classification
#[derive(Debug, Clone)]
pub struct UcCharTable([UcCharFlags; 128]);

impl UcCharTable {
    /// Creates the table with compile-time initialization
    pub const fn new() -> Self {
        let mut table = [UcCharFlags::empty(); 128];
        let mut i = 0;

        while i < 128 {
            let ch = i as u8;
            let mut flags = UcCharFlags::empty();

            match ch {
                b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b'/' | b':'
                | b';' | b'=' | b'?' | b'@' | b'[' | b']' => {
                    flags = flags.union(UcCharFlags::RESERVED);
                }
                _ => {}
            }

            match ch {
                b'!' | b'$' | b'\'' | b'(' | b')' | b',' => {
                    flags = flags.union(UcCharFlags::STRUCTURAL);
                }
                _ => {}
            }

            match ch {
                b' ' | b'\t' => flags = flags.union(UcCharFlags::PADDING),
                b'\n' | b'\r' => flags = flags.union(UcCharFlags::LINE_END),
                _ => {}
            }

            if ch.is_ascii_digit() {
                flags = flags.union(UcCharFlags::DIGIT);
            }

            // Unreserved characters plus the sub-delimiters that never split
            // a value or a query parameter.
            match ch {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'!'
                | b'$' | b'\'' | b'*' | b':' | b'=' | b'@' | b'/' | b'?' => {
                    flags = flags.union(UcCharFlags::URI_SAFE);
                }
                _ => {}
            }

            table[i] = flags;
            i += 1;
        }

        Self(table)
    }

    /// Tests if a character has any of the given flags
    #[inline(always)]
    pub const fn test(&self, ch: u8, flags: UcCharFlags) -> bool {
        ch < 128 && self.0[ch as usize].intersects(flags)
    }

    #[inline(always)]
    pub const fn is_reserved(&self, ch: u8) -> bool {
        self.test(ch, UcCharFlags::RESERVED)
    }

    #[inline(always)]
    pub const fn is_structural(&self, ch: u8) -> bool {
        self.test(ch, UcCharFlags::STRUCTURAL)
    }

    #[inline(always)]
    pub const fn is_padding(&self, ch: u8) -> bool {
        self.test(ch, UcCharFlags::PADDING)
    }

    #[inline(always)]
    pub const fn is_line_end(&self, ch: u8) -> bool {
        self.test(ch, UcCharFlags::LINE_END)
    }

    #[inline(always)]
    pub const fn is_digit(&self, ch: u8) -> bool {
        self.test(ch, UcCharFlags::DIGIT)
    }

    #[inline(always)]
    pub const fn is_uri_safe(&self, ch: u8) -> bool {
        self.test(ch, UcCharFlags::URI_SAFE)
    }
}

impl Default for UcCharTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Global character table instance
pub static UC_CHAR_TABLE: UcCharTable = UcCharTable::new();

/// Line terminator kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UcLineEnd {
    Lf,
    Cr,
    CrLf,
}

impl UcLineEnd {
    /// Returns the terminator text
    pub fn as_str(&self) -> &'static str {
        match self {
            UcLineEnd::Lf => "\n",
            UcLineEnd::Cr => "\r",
            UcLineEnd::CrLf => "\r\n",
        }
    }
}

/// URI Charge token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UcToken {
    /// Non-empty decoded text
    Text(String),
    /// Reserved character
    Reserved(u8),
    /// Line terminator
    LineEnd(UcLineEnd),
    /// Run of `count` (1..=256) space or tab characters
    Padding { byte: u8, count: u16 },
    /// Start of an inset in the given format
    InsetStart(UcInsetId),
    /// End of the inset started by the matching [`UcToken::InsetStart`]
    InsetEnd(UcInsetId),
}

impl UcToken {
    /// Creates a text token
    pub fn text(text: impl Into<String>) -> Self {
        UcToken::Text(text.into())
    }

    /// Returns a string representation of the token type for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            UcToken::Text(_) => "text",
            UcToken::Reserved(_) => "reserved character",
            UcToken::LineEnd(_) => "line terminator",
            UcToken::Padding { .. } => "padding",
            UcToken::InsetStart(_) => "inset start",
            UcToken::InsetEnd(_) => "inset end",
        }
    }

    /// Returns the text of a text token
    pub fn as_text(&self) -> Option<&str> {
        match self {
            UcToken::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the character of a reserved token
    pub fn as_reserved(&self) -> Option<u8> {
        match self {
            UcToken::Reserved(ch) => Some(*ch),
            _ => None,
        }
    }

    /// Checks for the given reserved character
    pub fn is_reserved(&self, ch: u8) -> bool {
        matches!(self, UcToken::Reserved(c) if *c == ch)
    }

    /// Padding or line terminator
    pub fn is_blank(&self) -> bool {
        matches!(self, UcToken::Padding { .. } | UcToken::LineEnd(_))
    }

    /// Integer code of a non-text token
    pub fn code(&self) -> Option<u32> {
        match self {
            UcToken::Text(_) => None,
            UcToken::Reserved(ch) => Some(*ch as u32),
            UcToken::LineEnd(UcLineEnd::Lf) => Some(UC_TOKEN_LF),
            UcToken::LineEnd(UcLineEnd::Cr) => Some(UC_TOKEN_CR),
            UcToken::LineEnd(UcLineEnd::CrLf) => Some(UC_TOKEN_CRLF),
            UcToken::Padding { byte, count } => Some(((*count as u32 - 1) << 8) | *byte as u32),
            UcToken::InsetStart(id) => Some(((*id as u32) << 8) | UC_TOKEN_PREFIX_INSET_START),
            UcToken::InsetEnd(id) => Some(((*id as u32) << 8) | UC_TOKEN_PREFIX_INSET_END),
        }
    }

    /// Decodes an integer code, returning `None` for codes outside the model
    pub fn from_code(code: u32) -> Option<Self> {
        if code == UC_TOKEN_CRLF {
            return Some(UcToken::LineEnd(UcLineEnd::CrLf));
        }

        let low = code & 0xff;
        let high = code >> 8;

        match low {
            UC_TOKEN_PREFIX_SPACE | UC_TOKEN_PREFIX_TAB if high < UC_PADDING_MAX_REPEAT as u32 => {
                Some(UcToken::Padding {
                    byte: low as u8,
                    count: (high + 1) as u16,
                })
            }
            UC_TOKEN_PREFIX_INSET_START if high <= u16::MAX as u32 => {
                Some(UcToken::InsetStart(high as u16))
            }
            UC_TOKEN_PREFIX_INSET_END if high <= u16::MAX as u32 => {
                Some(UcToken::InsetEnd(high as u16))
            }
            _ if high != 0 => None,
            UC_TOKEN_LF => Some(UcToken::LineEnd(UcLineEnd::Lf)),
            UC_TOKEN_CR => Some(UcToken::LineEnd(UcLineEnd::Cr)),
            _ if UC_CHAR_TABLE.is_reserved(low as u8) => Some(UcToken::Reserved(low as u8)),
            _ => None,
        }
    }
}

impl fmt::Display for UcToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UcToken::Text(text) => f.write_str(text),
            UcToken::Reserved(ch) => write!(f, "{}", *ch as char),
            UcToken::LineEnd(line_end) => f.write_str(line_end.as_str()),
            UcToken::Padding { byte, count } => {
                for _ in 0..*count {
                    write!(f, "{}", *byte as char)?;
                }
                Ok(())
            }
            UcToken::InsetStart(_) | UcToken::InsetEnd(_) => Ok(()),
        }
    }
}

/// Appends the textual form of a token; inset markers print nothing
pub fn print_uc_token(out: &mut String, token: &UcToken) {
    match token {
        UcToken::Text(text) => out.push_str(text),
        UcToken::Reserved(ch) => out.push(*ch as char),
        UcToken::LineEnd(line_end) => out.push_str(line_end.as_str()),
        UcToken::Padding { byte, count } => {
            out.extend(std::iter::repeat_n(*byte as char, *count as usize));
        }
        UcToken::InsetStart(_) | UcToken::InsetEnd(_) => {}
    }
}

/// Prints a token sequence back to text
pub fn print_uc_tokens<'t, I>(tokens: I) -> String
where
    I: IntoIterator<Item = &'t UcToken>,
{
    let mut out = String::new();
    for token in tokens {
        print_uc_token(&mut out, token);
    }
    out
}

/// Appends a token to a buffer, coalescing with the preceding token
///
/// Text merges with preceding text. Padding merges with preceding padding of
/// the same character, splitting when a run would exceed
/// [`UC_PADDING_MAX_REPEAT`]. Other tokens are always appended standalone.
pub fn append_uc_token(tokens: &mut Vec<UcToken>, token: UcToken) {
    match token {
        UcToken::Text(text) => {
            if text.is_empty() {
                return;
            }
            if let Some(UcToken::Text(prev)) = tokens.last_mut() {
                prev.push_str(&text);
            } else {
                tokens.push(UcToken::Text(text));
            }
        }
        UcToken::Padding { byte, count } => {
            let mut remaining = count;
            if let Some(UcToken::Padding {
                byte: prev_byte,
                count: prev_count,
            }) = tokens.last_mut()
            {
                if *prev_byte == byte {
                    let room = UC_PADDING_MAX_REPEAT - *prev_count;
                    let merged = room.min(remaining);
                    *prev_count += merged;
                    remaining -= merged;
                }
            }
            push_uc_padding(tokens, byte, remaining as usize);
        }
        other => tokens.push(other),
    }
}

/// Pushes a padding run, split into tokens of at most 256 repeats
pub fn push_uc_padding(tokens: &mut Vec<UcToken>, byte: u8, mut count: usize) {
    while count > 0 {
        let chunk = count.min(UC_PADDING_MAX_REPEAT as usize);
        tokens.push(UcToken::Padding {
            byte,
            count: chunk as u16,
        });
        count -= chunk;
    }
}

//! Delimited textual wire format helpers.
//!
//! Every persistent protocol object has a textual form: fields separated by
//! `,`, records closed by `;`, list entries by `$`, proof-step subfields by
//! `/` and `|`. The grammar is self-closed — the only cross-node requirement
//! is that a transaction-set digest is computed over the concatenation of
//! serialized transactions in insertion order, byte for byte.

use crate::hash::HexError;

/// Errors produced when parsing the wire form of a protocol object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A required delimiter was not found.
    #[error("missing `{0}` delimiter")]
    MissingDelimiter(char),

    /// A numeric field failed to parse.
    #[error("invalid numeric field `{0}`")]
    InvalidNumber(String),

    /// A digest field failed to parse.
    #[error("invalid digest field")]
    InvalidDigest(#[from] HexError),

    /// The record ended before all fields were read.
    #[error("truncated record")]
    Truncated,

    /// Unexpected bytes after the last field.
    #[error("trailing bytes after record")]
    TrailingData,
}

/// Sequential reader over a delimited record.
///
/// Wraps the cursor arithmetic the format needs; each `until` call consumes
/// through (and including) the delimiter and returns the field before it.
pub struct FieldReader<'a> {
    s: &'a str,
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, pos: 0 }
    }

    /// Consume up to and including `delim`, returning the field before it.
    pub fn until(&mut self, delim: char) -> Result<&'a str, WireError> {
        let rest = &self.s[self.pos..];
        let idx = rest
            .find(delim)
            .ok_or(WireError::MissingDelimiter(delim))?;
        let field = &rest[..idx];
        self.pos += idx + delim.len_utf8();
        Ok(field)
    }

    /// Parse a `u64` field terminated by `delim`.
    pub fn u64_until(&mut self, delim: char) -> Result<u64, WireError> {
        let field = self.until(delim)?;
        field
            .parse::<u64>()
            .map_err(|_| WireError::InvalidNumber(field.to_string()))
    }

    /// Everything not yet consumed.
    pub fn rest(&self) -> &'a str {
        &self.s[self.pos..]
    }

    /// Whether the reader has consumed the whole input.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.s.len()
    }

    /// Whether the next character is `c`.
    pub fn peek_is(&self, c: char) -> bool {
        self.s[self.pos..].starts_with(c)
    }

    /// Skip a single known character.
    pub fn skip(&mut self, c: char) -> Result<(), WireError> {
        if self.peek_is(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(WireError::MissingDelimiter(c))
        }
    }
}

/// Parse a `u64` from a bare (already-extracted) field.
pub fn parse_u64(field: &str) -> Result<u64, WireError> {
    field
        .parse::<u64>()
        .map_err(|_| WireError::InvalidNumber(field.to_string()))
}

/// Parse an `i64` from a bare field (used for the CC verdict column).
pub fn parse_i64(field: &str) -> Result<i64, WireError> {
    field
        .parse::<i64>()
        .map_err(|_| WireError::InvalidNumber(field.to_string()))
}

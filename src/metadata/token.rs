//! Metadata token implementation for referencing types and methods.
//!
//! A token is a 32-bit value where the upper 8 bits identify the metadata table and the
//! lower 24 bits identify the row (1-based). The weaving engine never holds references
//! into a module across a mutation; it holds tokens and resolves them again when needed.

use std::fmt;

/// Table id of the `TypeDef` table
pub const TABLE_TYPEDEF: u8 = 0x02;
/// Table id of the `MethodDef` table
pub const TABLE_METHODDEF: u8 = 0x06;

/// A metadata token, identifying a row in a metadata table.
///
/// # Examples
///
/// ```rust
/// use cilweave::metadata::token::Token;
///
/// let token = Token::new(0x0600_0003);
/// assert_eq!(token.table(), 0x06);
/// assert_eq!(token.row(), 3);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw value
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for the given table and 1-based row
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a `TypeDef` token
    #[must_use]
    pub const fn typedef(row: u32) -> Self {
        Self::from_parts(TABLE_TYPEDEF, row)
    }

    /// Creates a `MethodDef` token
    #[must_use]
    pub const fn methoddef(row: u32) -> Self {
        Self::from_parts(TABLE_METHODDEF, row)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Returns the table id
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Returns the row
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if the row is 0
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

// Wallet-level libraries for bitcoin protocol by LNP/BP Association
//
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// This software is distributed without any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

//! Tokens produced by the descriptor tokenizer.

use std::ops::Range;

use bitcoin::hashes::hex::FromHex;
use bitcoin::{Address, PrivateKey};

use crate::ExtendedKey;

/// Byte range of a token inside the descriptor source text
pub type Span = Range<usize>;

/// Descriptor function names recognized by the tokenizer.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum Keyword {
    /// Pay-to-script-hash wrapper
    #[display("sh")]
    Sh,

    /// Pay-to-witness-script-hash wrapper
    #[display("wsh")]
    Wsh,

    /// Bare public key output
    #[display("pk")]
    Pk,

    /// Pay-to-public-key-hash output
    #[display("pkh")]
    Pkh,

    /// Pay-to-witness-public-key-hash output
    #[display("wpkh")]
    Wpkh,

    /// Set of single-key outputs for one key
    #[display("combo")]
    Combo,

    /// Bare multisig with keys in the given order
    #[display("multi")]
    Multi,

    /// Bare multisig with keys sorted per BIP67
    #[display("sortedmulti")]
    SortedMulti,

    /// Taproot; reserved and has no compiled semantics
    #[display("tr")]
    Tr,

    /// Output script of an address
    #[display("addr")]
    Addr,

    /// Output script given as hex data
    #[display("raw")]
    Raw,
}

impl Keyword {
    /// All keywords known to the tokenizer
    pub const ALL: [Keyword; 11] = [
        Keyword::Sh,
        Keyword::Wsh,
        Keyword::Pk,
        Keyword::Pkh,
        Keyword::Wpkh,
        Keyword::Combo,
        Keyword::Multi,
        Keyword::SortedMulti,
        Keyword::Tr,
        Keyword::Addr,
        Keyword::Raw,
    ];

    /// Matches identifier against the list of keywords
    pub fn from_ident(ident: &str) -> Option<Keyword> {
        Keyword::ALL
            .into_iter()
            .find(|keyword| keyword.to_string() == ident)
    }
}

/// Single-character delimiters.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum Delimiter {
    /// Opening parenthesis
    #[display("(")]
    OpenParen,

    /// Closing parenthesis
    #[display(")")]
    CloseParen,

    /// Opening bracket of a key origin
    #[display("[")]
    OpenBracket,

    /// Closing bracket of a key origin
    #[display("]")]
    CloseBracket,

    /// Opening brace
    #[display("{{")]
    OpenBrace,

    /// Closing brace
    #[display("}}")]
    CloseBrace,

    /// Argument separator
    #[display(",")]
    Comma,

    /// Derivation step separator
    #[display("/")]
    Slash,

    /// Wildcard derivation index
    #[display("*")]
    Asterisk,
}

impl Delimiter {
    /// Matches a single character against the list of delimiters
    pub fn from_char(c: char) -> Option<Delimiter> {
        Some(match c {
            '(' => Delimiter::OpenParen,
            ')' => Delimiter::CloseParen,
            '[' => Delimiter::OpenBracket,
            ']' => Delimiter::CloseBracket,
            '{' => Delimiter::OpenBrace,
            '}' => Delimiter::CloseBrace,
            ',' => Delimiter::Comma,
            '/' => Delimiter::Slash,
            '*' => Delimiter::Asterisk,
            _ => return None,
        })
    }
}

/// Kind tag of a [`Token`].
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Display)]
pub enum TokenKind {
    /// Single-character delimiter
    #[display("`{0}`")]
    Delimiter(Delimiter),

    /// Descriptor function name
    #[display("`{0}`")]
    Keyword(Keyword),

    /// Base58 or bech32 address
    #[display("address")]
    Address,

    /// Base58 extended public or private key
    #[display("extended key")]
    ExtendedKey,

    /// Private key in WIF encoding
    #[display("WIF private key")]
    Wif,

    /// Run of hexadecimal digits
    #[display("hex data")]
    HexData,

    /// Decimal integer
    #[display("integer")]
    Integer,

    /// Hardened derivation marker, `h` or `'`
    #[display("hardened marker")]
    HardenedMarker,
}

/// Parsed value attached to a token.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Payload {
    /// Run of hexadecimal digits, kept as-is since the same run may be read
    /// either as binary data or as a decimal integer
    Hex(String),

    /// Decimal integer
    Integer(u64),

    /// Private key from WIF encoding
    PrivateKey(PrivateKey),

    /// Extended public or private key
    ExtendedKey(ExtendedKey),

    /// Bitcoin address
    Address(Address),
}

/// Lexical unit of a descriptor. Immutable once produced by the tokenizer.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Token {
    kind: TokenKind,
    span: Span,
    payload: Option<Payload>,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, span: Span, payload: Option<Payload>) -> Token {
        Token {
            kind,
            span,
            payload,
        }
    }

    /// Returns kind of the token
    #[inline]
    pub fn kind(&self) -> TokenKind { self.kind }

    /// Returns location of the token in the source text
    #[inline]
    pub fn span(&self) -> Span { self.span.clone() }

    /// Returns parsed payload of the token, if any
    #[inline]
    pub fn payload(&self) -> Option<&Payload> { self.payload.as_ref() }

    /// Detects whether the token is the given delimiter
    #[inline]
    pub fn is_delimiter(&self, delimiter: Delimiter) -> bool {
        self.kind == TokenKind::Delimiter(delimiter)
    }

    /// Detects whether a hardened marker may follow this token
    #[inline]
    pub fn is_index(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Integer | TokenKind::HexData | TokenKind::Delimiter(Delimiter::Asterisk)
        )
    }

    /// Returns binary data for hex data tokens with even number of digits
    pub fn data(&self) -> Option<Vec<u8>> {
        match &self.payload {
            Some(Payload::Hex(digits)) => Vec::<u8>::from_hex(digits).ok(),
            _ => None,
        }
    }

    /// Returns integer value of the token. Hex data tokens consisting of
    /// decimal digits only are read as decimal integers.
    pub fn integer(&self) -> Option<u64> {
        match &self.payload {
            Some(Payload::Integer(value)) => Some(*value),
            Some(Payload::Hex(digits)) if digits.bytes().all(|b| b.is_ascii_digit()) => {
                digits.parse().ok()
            }
            _ => None,
        }
    }
}

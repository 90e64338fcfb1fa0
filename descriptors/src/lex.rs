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

//! Descriptor tokenizer.
//!
//! At each position the rules are tried in a fixed priority order:
//! delimiters, keywords, addresses, WIF private keys, extended keys, hex
//! data, decimal integers and finally the hardened marker. Addresses, WIF
//! and extended keys share the base58 character class, so it is the
//! successful decoding of the literal, not its alphabet, which selects the
//! rule.

use std::str::FromStr;

use bitcoin::util::bip32::{ExtendedPrivKey, ExtendedPubKey};
use bitcoin::{Address, PrivateKey};

use crate::token::{Delimiter, Keyword, Payload, Token, TokenKind};
use crate::ExtendedKey;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// No tokenizer rule matches the source text at the given byte offset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
/// unrecognized descriptor syntax at position {position}.
pub struct LexError {
    /// Byte offset of the first unrecognized character
    pub position: usize,
}

/// Splits descriptor source text into a sequence of tokens.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        source,
        pos: 0,
        tokens: vec![],
    };
    while lexer.pos < source.len() {
        lexer.next_token()?;
    }
    trace!("descriptor split into {} tokens", lexer.tokens.len());
    Ok(lexer.tokens)
}

struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'src> Lexer<'src> {
    fn next_token(&mut self) -> Result<(), LexError> {
        let token = self
            .delimiter()
            .or_else(|| self.keyword())
            .or_else(|| self.address())
            .or_else(|| self.wif())
            .or_else(|| self.extended_key())
            .or_else(|| self.hex_data())
            .or_else(|| self.integer())
            .or_else(|| self.hardened_marker())
            .ok_or(LexError { position: self.pos })?;
        trace!("token {} at {}..{}", token.kind(), token.span().start, token.span().end);
        self.pos = token.span().end;
        self.tokens.push(token);
        Ok(())
    }

    /// Returns maximal run of bytes starting at the current position which
    /// satisfy the predicate.
    fn run(&self, pred: impl Fn(u8) -> bool) -> &'src str {
        let rest = &self.source[self.pos..];
        let len = rest.bytes().take_while(|b| pred(*b)).count();
        &rest[..len]
    }

    fn token(&self, kind: TokenKind, len: usize, payload: Option<Payload>) -> Token {
        Token::new(kind, self.pos..self.pos + len, payload)
    }

    fn delimiter(&self) -> Option<Token> {
        let c = self.source[self.pos..].chars().next()?;
        let delimiter = Delimiter::from_char(c)?;
        Some(self.token(TokenKind::Delimiter(delimiter), 1, None))
    }

    fn keyword(&self) -> Option<Token> {
        let ident = self.run(|b| b.is_ascii_lowercase());
        let keyword = Keyword::from_ident(ident)?;
        Some(self.token(TokenKind::Keyword(keyword), ident.len(), None))
    }

    fn address(&self) -> Option<Token> {
        let literal = self.run(|b| b.is_ascii_alphanumeric());
        if literal.is_empty() {
            return None;
        }
        let address = Address::from_str(literal).ok()?;
        Some(self.token(TokenKind::Address, literal.len(), Some(Payload::Address(address))))
    }

    fn wif(&self) -> Option<Token> {
        let literal = self.run(|b| BASE58_ALPHABET.contains(&b));
        if literal.is_empty() {
            return None;
        }
        let key = PrivateKey::from_wif(literal).ok()?;
        Some(self.token(TokenKind::Wif, literal.len(), Some(Payload::PrivateKey(key))))
    }

    fn extended_key(&self) -> Option<Token> {
        let literal = self.run(|b| BASE58_ALPHABET.contains(&b));
        if literal.is_empty() {
            return None;
        }
        let xkey = ExtendedPubKey::from_str(literal)
            .map(ExtendedKey::Public)
            .or_else(|_| ExtendedPrivKey::from_str(literal).map(ExtendedKey::Private))
            .ok()?;
        Some(self.token(TokenKind::ExtendedKey, literal.len(), Some(Payload::ExtendedKey(xkey))))
    }

    fn hex_data(&self) -> Option<Token> {
        let digits = self.run(|b| b.is_ascii_hexdigit());
        if digits.len() < 2 {
            return None;
        }
        Some(self.token(TokenKind::HexData, digits.len(), Some(Payload::Hex(digits.to_owned()))))
    }

    fn integer(&self) -> Option<Token> {
        let digits = self.run(|b| b.is_ascii_digit());
        if digits.is_empty() {
            return None;
        }
        let value = u64::from_str(digits).ok()?;
        Some(self.token(TokenKind::Integer, digits.len(), Some(Payload::Integer(value))))
    }

    fn hardened_marker(&self) -> Option<Token> {
        let marker = self.source[self.pos..].chars().next()?;
        if marker != '\'' && marker != 'h' {
            return None;
        }
        let prev = self.tokens.last()?;
        if !prev.is_index() || prev.span().end != self.pos {
            return None;
        }
        Some(self.token(TokenKind::HardenedMarker, 1, None))
    }
}

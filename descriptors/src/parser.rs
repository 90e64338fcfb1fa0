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

//! Recursive-descent descriptor parser.
//!
//! Alternatives are tried speculatively: the parser cursor is saved before
//! each alternative and restored once it fails, so a failed alternative never
//! consumes tokens. If all alternatives fail, the error of the one which got
//! furthest into the token stream is reported.

use std::fmt::{self, Display, Formatter};

use bitcoin::util::bip32::Fingerprint;
use bitcoin::PublicKey;
use descriptor_hd::{DerivationPath, DerivationStep, StepIndex, UnhardenedIndex};

use crate::node::MAX_MULTISIG_KEYS;
use crate::token::{Delimiter, Keyword, Payload, Span, Token, TokenKind};
use crate::{DescriptorNode, Key, KeyExpression};

/// Location of a parse error.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Position {
    /// Source span of the offending token
    Span(Span),

    /// Token stream ended before the descriptor was complete
    EndOfInput,
}

impl Position {
    /// Offset used to compare how far into the source different parse
    /// attempts got; end of input is the furthest position.
    pub fn offset(&self) -> usize {
        match self {
            Position::Span(span) => span.start,
            Position::EndOfInput => usize::MAX,
        }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Position::Span(span) => write!(f, "position {}..{}", span.start, span.end),
            Position::EndOfInput => f.write_str("the end of input"),
        }
    }
}

/// Descriptor tokens do not follow the descriptor grammar.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display("{message} at {position}.")]
pub struct ParseError {
    /// Description of the problem
    pub message: String,

    /// Location of the problem
    pub position: Position,
}

impl ParseError {
    fn at(token: &Token, message: impl ToString) -> ParseError {
        ParseError {
            message: message.to_string(),
            position: Position::Span(token.span()),
        }
    }
}

/// Parses the complete token sequence into a descriptor tree. Tokens left
/// after the end of the descriptor are an error.
pub fn parse(tokens: &[Token]) -> Result<DescriptorNode, ParseError> {
    let mut parser = Parser::new(tokens);
    let node = parser.descriptor()?;
    if let Some(token) = parser.peek() {
        return Err(ParseError::at(
            token,
            format!("unexpected {} after the end of descriptor", token.kind()),
        ));
    }
    Ok(node)
}

type Production<'t, T> = fn(&mut Parser<'t>) -> Result<T, ParseError>;

/// Backtracking parser state: token sequence and an integer cursor into it.
#[derive(Clone, Debug)]
pub struct Parser<'t> {
    tokens: &'t [Token],
    cursor: usize,
}

impl<'t> Parser<'t> {
    /// Constructs parser positioned at the first token
    pub fn new(tokens: &'t [Token]) -> Self { Parser { tokens, cursor: 0 } }

    /// Returns index of the next token to be consumed
    #[inline]
    pub fn cursor(&self) -> usize { self.cursor }

    fn peek(&self) -> Option<&'t Token> { self.tokens.get(self.cursor) }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().map(Token::kind) == Some(kind)
    }

    fn position(&self) -> Position {
        self.peek()
            .map(|token| Position::Span(token.span()))
            .unwrap_or(Position::EndOfInput)
    }

    fn error(&self, message: impl ToString) -> ParseError {
        ParseError {
            message: message.to_string(),
            position: self.position(),
        }
    }

    fn next_token(&mut self, expected: &str) -> Result<&'t Token, ParseError> {
        let token = self
            .peek()
            .ok_or_else(|| self.error(format!("expected {}", expected)))?;
        self.cursor += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'t Token, ParseError> {
        if !self.peek_is(kind) {
            return Err(self.error(format!("expected {}", kind)));
        }
        self.next_token(&kind.to_string())
    }

    fn expect_delimiter(&mut self, delimiter: Delimiter) -> Result<(), ParseError> {
        self.expect(TokenKind::Delimiter(delimiter)).map(|_| ())
    }

    /// Parses `keyword ( body )`
    fn function<T>(
        &mut self,
        keyword: Keyword,
        body: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        self.expect(TokenKind::Keyword(keyword))?;
        self.expect_delimiter(Delimiter::OpenParen)?;
        let value = body(self)?;
        self.expect_delimiter(Delimiter::CloseParen)?;
        Ok(value)
    }

    /// Runs production restoring the cursor if it fails
    fn attempt<T>(&mut self, production: Production<'t, T>) -> Result<T, ParseError> {
        let saved = self.cursor;
        production(self).map_err(|err| {
            self.cursor = saved;
            err
        })
    }

    fn alternatives<T>(
        &mut self,
        productions: &[Production<'t, T>],
        expected: &str,
    ) -> Result<T, ParseError> {
        let start = self.position();
        let mut furthest: Option<ParseError> = None;
        for production in productions {
            match self.attempt(*production) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    debug!("descriptor alternative failed: {}", err);
                    if furthest
                        .as_ref()
                        .map(|prev| err.position.offset() > prev.position.offset())
                        .unwrap_or(true)
                    {
                        furthest = Some(err);
                    }
                }
            }
        }
        match furthest {
            Some(err) if err.position != start => Err(err),
            _ => Err(self.error(format!("expected {}", expected))),
        }
    }

    /// Parses top-level descriptor
    pub fn descriptor(&mut self) -> Result<DescriptorNode, ParseError> {
        if self.peek_is(TokenKind::Keyword(Keyword::Tr)) {
            return Err(self.error("taproot descriptors are not supported"));
        }
        self.alternatives(
            &[
                Parser::raw,
                Parser::pk,
                Parser::pkh,
                Parser::wpkh,
                Parser::multi,
                Parser::wsh,
                Parser::sh,
                Parser::addr,
                Parser::combo,
            ],
            "descriptor",
        )
    }

    fn raw(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Raw, |p| {
            let token = p.expect(TokenKind::HexData)?;
            token
                .data()
                .map(DescriptorNode::Raw)
                .ok_or_else(|| ParseError::at(token, "hex data must have even number of digits"))
        })
    }

    fn pk(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Pk, Parser::key).map(DescriptorNode::Pk)
    }

    fn pkh(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Pkh, Parser::key).map(DescriptorNode::Pkh)
    }

    fn wpkh(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Wpkh, Parser::key).map(DescriptorNode::Wpkh)
    }

    fn combo(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Combo, Parser::key).map(DescriptorNode::Combo)
    }

    fn multi(&mut self) -> Result<DescriptorNode, ParseError> {
        let keyword = if self.peek_is(TokenKind::Keyword(Keyword::SortedMulti)) {
            Keyword::SortedMulti
        } else {
            Keyword::Multi
        };
        self.function(keyword, |p| {
            let threshold_token = p.next_token("multisig threshold")?;
            let threshold = threshold_token
                .integer()
                .ok_or_else(|| ParseError::at(threshold_token, "expected multisig threshold"))?;
            let mut keys = vec![];
            while p.peek_is(TokenKind::Delimiter(Delimiter::Comma)) {
                p.cursor += 1;
                keys.push(p.key()?);
            }
            if keys.is_empty() {
                return Err(p.error("expected `,` followed by a key"));
            }
            if keys.len() > MAX_MULTISIG_KEYS {
                return Err(ParseError::at(
                    threshold_token,
                    format!(
                        "multisig can't have more than {} keys, while {} keys are given",
                        MAX_MULTISIG_KEYS,
                        keys.len()
                    ),
                ));
            }
            if threshold == 0 || threshold > keys.len() as u64 {
                return Err(ParseError::at(
                    threshold_token,
                    format!(
                        "multisig threshold {} must be between 1 and the number of keys ({})",
                        threshold,
                        keys.len()
                    ),
                ));
            }
            Ok(DescriptorNode::Multi {
                threshold: threshold as usize,
                keys,
                sorted: keyword == Keyword::SortedMulti,
            })
        })
    }

    fn wsh(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Wsh, |p| {
            p.alternatives(
                &[Parser::pk, Parser::pkh, Parser::multi],
                "`pk`, `pkh`, `multi` or `sortedmulti` inside `wsh`",
            )
        })
        .map(|inner| DescriptorNode::Wsh(Box::new(inner)))
    }

    fn sh(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Sh, |p| {
            p.alternatives(
                &[Parser::pk, Parser::pkh, Parser::wpkh, Parser::wsh, Parser::multi],
                "`pk`, `pkh`, `wpkh`, `wsh`, `multi` or `sortedmulti` inside `sh`",
            )
        })
        .map(|inner| DescriptorNode::Sh(Box::new(inner)))
    }

    fn addr(&mut self) -> Result<DescriptorNode, ParseError> {
        self.function(Keyword::Addr, |p| {
            let token = p.expect(TokenKind::Address)?;
            match token.payload() {
                Some(Payload::Address(address)) => Ok(DescriptorNode::Addr(address.clone())),
                _ => Err(ParseError::at(token, "expected address")),
            }
        })
    }

    /// Parses key expression: optional origin, key material and, for
    /// extended keys, children derivation steps.
    pub fn key(&mut self) -> Result<KeyExpression, ParseError> {
        let origin = if self.peek_is(TokenKind::Delimiter(Delimiter::OpenBracket)) {
            Some(self.origin()?)
        } else {
            None
        };

        let token = self.next_token("key")?;
        let key = match (token.kind(), token.payload()) {
            (TokenKind::HexData, _) => public_key(token)?,
            (TokenKind::Wif, Some(Payload::PrivateKey(sk))) => Key::Wif(*sk),
            (TokenKind::ExtendedKey, Some(Payload::ExtendedKey(xkey))) => Key::Extended {
                xkey: *xkey,
                children: self.children()?,
            },
            _ => return Err(ParseError::at(token, "expected key")),
        };

        Ok(KeyExpression { origin, key })
    }

    fn origin(&mut self) -> Result<DerivationPath, ParseError> {
        self.expect_delimiter(Delimiter::OpenBracket)?;
        let token = self.next_token("key fingerprint")?;
        let fingerprint = match token.data() {
            Some(data) if data.len() == 4 => Fingerprint::from(&data[..]),
            _ => return Err(ParseError::at(token, "expected 4-byte key fingerprint")),
        };
        let mut steps = vec![];
        while self.peek_is(TokenKind::Delimiter(Delimiter::Slash)) {
            let (step, token) = self.derivation_step()?;
            if step.is_wildcard() {
                return Err(ParseError::at(token, "key origin can't contain a wildcard"));
            }
            steps.push(step);
        }
        self.expect_delimiter(Delimiter::CloseBracket)?;
        DerivationPath::key_origin(fingerprint, steps).map_err(|err| self.error(err))
    }

    fn children(&mut self) -> Result<DerivationPath, ParseError> {
        let mut steps: Vec<DerivationStep> = vec![];
        while self.peek_is(TokenKind::Delimiter(Delimiter::Slash)) {
            let (step, token) = self.derivation_step()?;
            if steps.last().map(DerivationStep::is_wildcard).unwrap_or_default() {
                return Err(ParseError::at(token, "wildcard must be the last derivation step"));
            }
            steps.push(step);
        }
        DerivationPath::children(steps).map_err(|err| self.error(err))
    }

    /// Parses `/index` or `/*` optionally followed by a hardened marker;
    /// returns the step together with its index token.
    fn derivation_step(&mut self) -> Result<(DerivationStep, &'t Token), ParseError> {
        self.expect_delimiter(Delimiter::Slash)?;
        let token = self.next_token("derivation index")?;
        let index = if token.is_delimiter(Delimiter::Asterisk) {
            StepIndex::Wildcard
        } else {
            let value = token
                .integer()
                .ok_or_else(|| ParseError::at(token, "expected derivation index"))?;
            u32::try_from(value)
                .ok()
                .and_then(|value| UnhardenedIndex::from_index(value).ok())
                .map(StepIndex::Index)
                .ok_or_else(|| {
                    ParseError::at(token, format!("derivation index {} is out of range", value))
                })?
        };
        let hardened = self.peek_is(TokenKind::HardenedMarker);
        if hardened {
            self.cursor += 1;
        }
        Ok((DerivationStep { index, hardened }, token))
    }
}

/// Reads hex data token as a raw public key
fn public_key(token: &Token) -> Result<Key, ParseError> {
    let data = token
        .data()
        .ok_or_else(|| ParseError::at(token, "hex data must have even number of digits"))?;
    let valid = match data.len() {
        33 => true,
        65 => data[0] == 0x04,
        _ => return Err(ParseError::at(token, "public key must be 33 or 65 bytes long")),
    };
    match PublicKey::from_slice(&data) {
        Ok(pk) if valid => Ok(Key::with_public_key(pk)),
        _ => Err(ParseError::at(token, "invalid public key")),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::test::{XPRV_MASTER, XPUB_MASTER};
    use crate::{tokenize, ExtendedKey};

    const PK: &str = "03501e454bf00751f24b1b489aa925215d66af2234e3891c3b21a52bedb3cd711c";
    const G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const G_FULL: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    fn parse_str(s: &str) -> Result<DescriptorNode, ParseError> { parse(&tokenize(s).unwrap()) }

    fn message(s: &str) -> String { parse_str(s).unwrap_err().message }

    #[test]
    fn single_key_descriptors() {
        for s in [
            format!("pk({PK})"),
            format!("pkh({PK})"),
            format!("wpkh({PK})"),
            format!("combo({PK})"),
            format!("pk({G_FULL})"),
            format!("sh(wpkh({G}))"),
            format!("wsh(pkh({G}))"),
            format!("sh(wsh(pk({G})))"),
            format!("multi(1,{G},{PK})"),
            format!("sh(sortedmulti(2,{G},{PK}))"),
            format!("wsh(multi(1,{G}))"),
            s!("raw(deadbeef)"),
            s!("addr(bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4)"),
        ] {
            let node = parse_str(&s).unwrap();
            assert_eq!(node.to_string(), s);
        }
    }

    #[test]
    fn key_variants() {
        match parse_str(&format!("pk({G_FULL})")).unwrap() {
            DescriptorNode::Pk(KeyExpression {
                origin: None,
                key: Key::Uncompressed(pk),
            }) => assert!(!pk.compressed),
            other => panic!("unexpected {other:?}"),
        }
        match parse_str("pkh(L4rK1yDtCWekvXuE6oXD9jCYfFNV2cWRpVuPLBcCU2z8TrisoyY1)").unwrap() {
            DescriptorNode::Pkh(KeyExpression {
                key: Key::Wif(sk), ..
            }) => assert!(sk.compressed),
            other => panic!("unexpected {other:?}"),
        }
        match parse_str(&format!("wpkh({XPRV_MASTER}/0h/*h)")).unwrap() {
            DescriptorNode::Wpkh(KeyExpression {
                key: Key::Extended { xkey, children },
                ..
            }) => {
                assert!(matches!(xkey, ExtendedKey::Private(_)));
                assert_eq!(children.to_string(), "/0h/*h");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn origin_and_children() {
        let node = parse_str(&format!("pkh([AABBCCDD/44h/0h/0h]{XPUB_MASTER}/0/*)")).unwrap();
        let DescriptorNode::Pkh(key) = node else { panic!("pkh expected") };
        let origin = key.origin.as_ref().unwrap();
        assert_eq!(
            origin.origin().fingerprint(),
            Some(Fingerprint::from(&[0xaa, 0xbb, 0xcc, 0xdd][..]))
        );
        assert_eq!(origin.to_string(), "aabbccdd/44h/0h/0h");
        assert!(key.is_ranged());
        assert_eq!(
            key.to_string(),
            format!("[aabbccdd/44h/0h/0h]{XPUB_MASTER}/0/*")
        );

        assert_eq!(
            message(&format!("pkh([AABBCCDD/44h/*]{XPUB_MASTER})")),
            "key origin can't contain a wildcard"
        );
        assert_eq!(
            message(&format!("pkh({XPUB_MASTER}/*/0)")),
            "wildcard must be the last derivation step"
        );
        assert_eq!(message(&format!("pkh([aabbcc]{XPUB_MASTER})")), "expected 4-byte key fingerprint");
        assert_eq!(
            message(&format!("pkh({XPUB_MASTER}/2147483648)")),
            "derivation index 2147483648 is out of range"
        );
        assert!(parse_str(&format!("pkh({XPUB_MASTER}/2147483647h)")).is_ok());
    }

    #[test]
    fn children_only_after_extended_keys() {
        let err = parse_str(&format!("pk({PK}/0)")).unwrap_err();
        assert_eq!(err.message, "expected `)`");
    }

    #[test]
    fn nesting_rules() {
        for s in [
            format!("wsh(wpkh({G}))"),
            format!("wsh(sh(pk({G})))"),
            format!("sh(sh(pk({G})))"),
            format!("wsh(combo({G}))"),
            format!("sh(combo({G}))"),
            s!("sh(raw(deadbeef))"),
            s!("wsh(addr(bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4))"),
            format!("wsh(wsh(pk({G})))"),
        ] {
            let err = parse_str(&s).unwrap_err();
            assert!(err.message.starts_with("expected `pk`"), "{s}: {err}");
        }
    }

    #[test]
    fn multisig_limits() {
        assert!(message(&format!("multi(0,{G})")).starts_with("multisig threshold 0"));
        assert!(message(&format!("multi(3,{G},{PK})")).starts_with("multisig threshold 3"));
        let keys = vec![G; 21].join(",");
        assert!(message(&format!("multi(1,{keys})")).starts_with("multisig can't have more"));
        let keys = vec![G; 20].join(",");
        assert!(parse_str(&format!("sortedmulti(20,{keys})")).is_ok());
        assert_eq!(message("multi(1)"), "expected `,` followed by a key");
    }

    #[test]
    fn furthest_error() {
        let err = parse_str(&format!("sh(wpkh({G})")).unwrap_err();
        assert_eq!(err.message, "expected `)`");
        assert_eq!(err.position, Position::EndOfInput);

        let source = format!("wsh(pk({G}]))");
        let err = parse_str(&source).unwrap_err();
        assert_eq!(err.message, "expected `)`");
        let offset = source.find(']').unwrap();
        assert_eq!(err.position, Position::Span(offset..offset + 1));
    }

    #[test]
    fn unknown_and_trailing() {
        let err = parse_str("pk").unwrap_err();
        assert_eq!(err.message, "expected `(`");
        assert_eq!(err.position, Position::EndOfInput);

        let err = parse(&[]).unwrap_err();
        assert_eq!(err.message, "expected descriptor");
        assert_eq!(err.to_string(), "expected descriptor at the end of input.");

        let err = parse_str("raw(00)raw(00)").unwrap_err();
        assert_eq!(err.position, Position::Span(7..10));

        assert_eq!(
            message(&format!("tr({G})")),
            "taproot descriptors are not supported"
        );
        assert_eq!(message(&format!("pk({PK}00)")), "public key must be 33 or 65 bytes long");
    }

    #[test]
    fn backtracking_restores_cursor() {
        let tokens = tokenize(&format!("pkh({G})")).unwrap();
        let mut parser = Parser::new(&tokens);
        assert!(parser.attempt(Parser::pk).is_err());
        assert_eq!(parser.cursor(), 0);
        assert!(parser.attempt(Parser::pkh).is_ok());
        assert_eq!(parser.cursor(), tokens.len());
    }
}

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

// Coding conventions
#![recursion_limit = "256"]
#![warn(dead_code, missing_docs)]

//! Bitcoin output descriptors: tokenizer, backtracking parser, key
//! expression resolver and script compiler.
//!
//! General workflow:
//! ```text
//! Text -> Tokens -> DescriptorNode -> Script (for each wildcard child)
//! ```
//!
//! The descriptor is parsed once; compilation is a pure function of the
//! parsed tree, the wildcard child number, an optional private key provider
//! and, for `combo` descriptors, the output selector.

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate tracing;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod checksum;
mod compile;
mod descriptor;
mod key;
mod lex;
mod node;
mod parser;
pub mod token;

pub use checksum::{checksum, verify_checksum, ChecksumError, CHECKSUM_LEN};
pub use compile::{ComboSelector, UnknownComboSelector};
pub use descriptor::{Descriptor, Error};
pub use key::{ExtendedKey, Key, KeyExpression, PrivateKeyProvider};
pub use lex::{tokenize, LexError};
pub use node::{DescriptorNode, MAX_MULTISIG_KEYS};
pub use parser::{parse, ParseError, Parser, Position};
pub use token::{Token, TokenKind};

// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@lnp-bp.org>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

//! Derivation steps, derivation paths and key origins used by output
//! descriptor key expressions.
//!
//! Unlike [`bitcoin::util::bip32::DerivationPath`] the types here are able to
//! represent the wildcard (`*`) step of ranged descriptors and the master
//! fingerprint of a bracketed key origin.

// Coding conventions
#![recursion_limit = "256"]
#![warn(dead_code, missing_docs)]

#[macro_use]
extern crate amplify;
#[cfg(feature = "serde")]
extern crate serde_crate as serde;

mod indexes;
mod origin;
mod path;
mod step;

pub use indexes::UnhardenedIndex;
pub use origin::Origin;
pub use path::DerivationPath;
pub use step::{DerivationStep, StepIndex};

/// Constant determining BIP32 boundary for u32 values after which index
/// is treated as hardened
pub const HARDENED_INDEX_BOUNDARY: u32 = 1 << 31;

/// Errors constructing or parsing derivation steps and paths.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum PathError {
    /// derivation index {0} does not fit into the unhardened index range.
    IndexOutOfRange(u32),

    /// wildcard may be used only as the last derivation step.
    WildcardNotLast,

    /// key origin derivation path can't contain a wildcard.
    WildcardInOrigin,

    /// invalid derivation step `{0}`.
    InvalidStep(String),

    /// invalid key origin `{0}`; origin must be `m` or a 4-byte hex
    /// fingerprint.
    InvalidOrigin(String),
}

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

use std::cmp::Ordering;
use std::str::FromStr;

use bitcoin::util::bip32::ChildNumber;

use crate::{PathError, HARDENED_INDEX_BOUNDARY};

/// Index for children derivation; ensures that the inner value is always
/// < 2^31. Whether the derivation using the index is hardened is decided by
/// the derivation step holding it.
#[derive(
    Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Debug, Hash, Default, Display, From
)]
#[display(inner)]
pub struct UnhardenedIndex(
    #[from(u8)]
    #[from(u16)]
    u32,
);

impl PartialEq<u8> for UnhardenedIndex {
    fn eq(&self, other: &u8) -> bool { self.0 == *other as u32 }
}

impl PartialEq<u16> for UnhardenedIndex {
    fn eq(&self, other: &u16) -> bool { self.0 == *other as u32 }
}

impl PartialOrd<u8> for UnhardenedIndex {
    fn partial_cmp(&self, other: &u8) -> Option<Ordering> { self.0.partial_cmp(&(*other as u32)) }
}

impl PartialOrd<u16> for UnhardenedIndex {
    fn partial_cmp(&self, other: &u16) -> Option<Ordering> { self.0.partial_cmp(&(*other as u32)) }
}

impl UnhardenedIndex {
    /// Constructs index from a `u32` value, failing if the value is not
    /// below [`HARDENED_INDEX_BOUNDARY`].
    #[inline]
    pub fn from_index(index: impl Into<u32>) -> Result<Self, PathError> {
        let index = index.into();
        if index >= HARDENED_INDEX_BOUNDARY {
            Err(PathError::IndexOutOfRange(index))
        } else {
            Ok(Self(index))
        }
    }

    /// Returns index number, always in range `0..`[`HARDENED_INDEX_BOUNDARY`].
    #[inline]
    pub fn first_index(self) -> u32 { self.0 }

    /// Converts the index into BIP32 child number, hardened or normal.
    #[inline]
    pub fn to_child_number(self, hardened: bool) -> ChildNumber {
        match hardened {
            true => ChildNumber::Hardened { index: self.0 },
            false => ChildNumber::Normal { index: self.0 },
        }
    }
}

impl FromStr for UnhardenedIndex {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PathError::InvalidStep(s.to_owned()));
        }
        let index = u32::from_str(s).map_err(|_| PathError::InvalidStep(s.to_owned()))?;
        UnhardenedIndex::from_index(index)
    }
}

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

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use bitcoin::util::bip32::ChildNumber;

use crate::{PathError, UnhardenedIndex};

/// Index part of a derivation step: either a concrete child number or a
/// wildcard which gets its value only at derivation time.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display, From)]
pub enum StepIndex {
    /// Specific child index
    #[from]
    #[from(u8)]
    #[from(u16)]
    #[display(inner)]
    Index(UnhardenedIndex),

    /// Wildcard implying the child index is provided by the caller
    #[display("*")]
    Wildcard,
}

/// Single step of a derivation path as used in descriptor key expressions.
///
/// Displays hardened steps with `h` suffix; alternate formatting uses `'`.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct DerivationStep {
    /// Child index or wildcard
    pub index: StepIndex,

    /// Whether the derivation is hardened
    pub hardened: bool,
}

impl DerivationStep {
    /// Constructs step with a concrete normal (unhardened) index.
    #[inline]
    pub fn normal(index: impl Into<UnhardenedIndex>) -> Self {
        DerivationStep {
            index: StepIndex::Index(index.into()),
            hardened: false,
        }
    }

    /// Constructs step with a concrete hardened index.
    #[inline]
    pub fn hardened(index: impl Into<UnhardenedIndex>) -> Self {
        DerivationStep {
            index: StepIndex::Index(index.into()),
            hardened: true,
        }
    }

    /// Constructs wildcard step.
    #[inline]
    pub fn wildcard(hardened: bool) -> Self {
        DerivationStep {
            index: StepIndex::Wildcard,
            hardened,
        }
    }

    /// Detects whether the step is a wildcard.
    #[inline]
    pub fn is_wildcard(&self) -> bool { self.index == StepIndex::Wildcard }

    /// Resolves the step into a BIP32 child number. Wildcard steps use the
    /// provided `wildcard` child number and resolve to `None` if it is absent
    /// or not below the hardened index boundary.
    pub fn to_child_number(&self, wildcard: Option<u32>) -> Option<ChildNumber> {
        let index = match self.index {
            StepIndex::Index(index) => index,
            StepIndex::Wildcard => UnhardenedIndex::from_index(wildcard?).ok()?,
        };
        Some(index.to_child_number(self.hardened))
    }
}

impl Display for DerivationStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.index, f)?;
        match (self.hardened, f.alternate()) {
            (false, _) => Ok(()),
            (true, false) => f.write_str("h"),
            (true, true) => f.write_str("'"),
        }
    }
}

impl FromStr for DerivationStep {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, hardened) = match s.strip_suffix(['h', 'H', '\'']) {
            Some(index) => (index, true),
            None => (s, false),
        };
        let index = match index {
            "*" => StepIndex::Wildcard,
            index => StepIndex::Index(
                UnhardenedIndex::from_str(index).map_err(|_| PathError::InvalidStep(s.to_owned()))?,
            ),
        };
        Ok(DerivationStep { index, hardened })
    }
}

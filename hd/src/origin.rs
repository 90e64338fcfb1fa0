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

use std::str::FromStr;

use bitcoin::util::bip32::Fingerprint;

use crate::PathError;

/// Starting point of a derivation path.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Debug, Display, From)]
pub enum Origin {
    /// Path is relative to some key which is not referenced
    #[display("")]
    #[default]
    None,

    /// Path starts from the master key (`m`)
    #[display("m")]
    Master,

    /// Path starts from the key with the given fingerprint
    #[from]
    #[display(inner)]
    Fingerprint(Fingerprint),
}

impl Origin {
    /// Detects if the origin reference is present
    #[inline]
    pub fn is_some(&self) -> bool { self != &Origin::None }

    /// Returns fingerprint of the origin key, if known
    #[inline]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        match self {
            Origin::Fingerprint(fp) => Some(*fp),
            Origin::None | Origin::Master => None,
        }
    }
}

impl FromStr for Origin {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Origin::None),
            "m" => Ok(Origin::Master),
            fp if fp.len() == 8 => Fingerprint::from_str(fp)
                .map(Origin::from)
                .map_err(|_| PathError::InvalidOrigin(s.to_owned())),
            _ => Err(PathError::InvalidOrigin(s.to_owned())),
        }
    }
}

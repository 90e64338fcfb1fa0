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

use core::fmt::{self, Display, Formatter};
use core::str::FromStr;
use std::ops::Deref;

use bitcoin::util::bip32::Fingerprint;

use crate::{DerivationStep, Origin, PathError};

/// Derivation path made of [`DerivationStep`]s, optionally anchored at some
/// [`Origin`].
///
/// Type guarantees that only the last step of the path may be a wildcard and
/// that paths starting at a fingerprint (bracketed key origins) contain no
/// wildcards at all.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct DerivationPath {
    origin: Origin,
    steps: Vec<DerivationStep>,
}

// This is needed to get methods line `len()` and `is_empty()` working.
impl Deref for DerivationPath {
    type Target = [DerivationStep];

    fn deref(&self) -> &Self::Target { &self.steps }
}

impl AsRef<[DerivationStep]> for DerivationPath {
    #[inline]
    fn as_ref(&self) -> &[DerivationStep] { &self.steps }
}

impl<'path> IntoIterator for &'path DerivationPath {
    type Item = DerivationStep;
    type IntoIter = std::iter::Copied<std::slice::Iter<'path, DerivationStep>>;

    fn into_iter(self) -> Self::IntoIter { self.steps.iter().copied() }
}

impl DerivationPath {
    /// Constructs empty derivation path without origin.
    pub fn new() -> Self { Self::default() }

    /// Constructs derivation path checking the wildcard placement rules.
    pub fn with(
        origin: Origin,
        steps: impl IntoIterator<Item = DerivationStep>,
    ) -> Result<Self, PathError> {
        let steps = steps.into_iter().collect::<Vec<_>>();
        if let Some(pos) = steps.iter().position(DerivationStep::is_wildcard) {
            if matches!(origin, Origin::Fingerprint(_)) {
                return Err(PathError::WildcardInOrigin);
            }
            if pos + 1 != steps.len() {
                return Err(PathError::WildcardNotLast);
            }
        }
        Ok(DerivationPath { origin, steps })
    }

    /// Constructs path of a bracketed key origin: master key fingerprint
    /// followed by concrete steps.
    #[inline]
    pub fn key_origin(
        fingerprint: Fingerprint,
        steps: impl IntoIterator<Item = DerivationStep>,
    ) -> Result<Self, PathError> {
        DerivationPath::with(Origin::Fingerprint(fingerprint), steps)
    }

    /// Constructs path of children steps following an extended key; such
    /// paths have no origin.
    #[inline]
    pub fn children(steps: impl IntoIterator<Item = DerivationStep>) -> Result<Self, PathError> {
        DerivationPath::with(Origin::None, steps)
    }

    /// Returns origin of the path
    #[inline]
    pub fn origin(&self) -> Origin { self.origin }

    /// Returns derivation steps of the path
    #[inline]
    pub fn steps(&self) -> &[DerivationStep] { &self.steps }

    /// Detects whether the path ends with a wildcard and thus requires a
    /// child number to be provided for the derivation.
    #[inline]
    pub fn is_ranged(&self) -> bool {
        self.steps
            .last()
            .map(DerivationStep::is_wildcard)
            .unwrap_or_default()
    }

    /// Detects whether some of the path steps are hardened.
    #[inline]
    pub fn has_hardened(&self) -> bool { self.steps.iter().any(|step| step.hardened) }
}

impl Display for DerivationPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.origin, f)?;
        for step in &self.steps {
            f.write_str("/")?;
            Display::fmt(step, f)?;
        }
        Ok(())
    }
}

impl FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut split = s.split('/');
        let origin = split.next().map(Origin::from_str).transpose()?.unwrap_or_default();
        let steps = split
            .map(DerivationStep::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        DerivationPath::with(origin, steps)
    }
}

#[cfg(feature = "serde")]
mod _serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::*;

    impl Serialize for DerivationPath {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for DerivationPath {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            DerivationPath::from_str(&s).map_err(D::Error::custom)
        }
    }
}

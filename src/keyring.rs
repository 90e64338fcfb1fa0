// Descriptor wallet library extending bitcoin & miniscript functionality
// by LNP/BP Association (https://lnp-bp.org)
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the Apache-2.0 License
// along with this software.
// If not, see <https://opensource.org/licenses/Apache-2.0>.

use bitcoin::util::bip32::{ExtendedPrivKey, ExtendedPubKey, Fingerprint};
use descriptors::PrivateKeyProvider;
use secp256k1::{All, Secp256k1};

fn secp() -> &'static Secp256k1<All> { secp256k1::SECP256K1 }

/// Set of extended private keys answering private key requests issued by
/// hardened derivations from extended public keys.
///
/// A request for an extended public key is answered with the private key
/// from the ring whose public counterpart has the same public key and chain
/// code. Direct children of the keys in the ring are recognized by the
/// parent fingerprint and child number of the requested key and are derived
/// on demand.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct XprivKeyring {
    keys: Vec<ExtendedPrivKey>,
}

impl XprivKeyring {
    /// Constructs empty key ring
    #[inline]
    pub fn new() -> XprivKeyring { XprivKeyring::default() }

    /// Adds key to the ring. Returns `false` if the key is already present.
    pub fn add(&mut self, xpriv: ExtendedPrivKey) -> bool {
        if self.keys.contains(&xpriv) {
            return false;
        }
        trace!("adding key {} to the key ring", xpriv.fingerprint(secp()));
        self.keys.push(xpriv);
        true
    }

    /// Returns number of keys in the ring
    #[inline]
    pub fn len(&self) -> usize { self.keys.len() }

    /// Detects whether the key ring is empty
    #[inline]
    pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    /// Returns fingerprints of all keys in the ring
    pub fn fingerprints(&self) -> Vec<Fingerprint> {
        self.keys
            .iter()
            .map(|xpriv| xpriv.fingerprint(secp()))
            .collect()
    }

    fn candidate(xpriv: &ExtendedPrivKey, xpub: &ExtendedPubKey) -> Option<ExtendedPrivKey> {
        if xpriv.depth == xpub.depth {
            return Some(*xpriv);
        }
        if xpriv.depth.checked_add(1) != Some(xpub.depth)
            || xpriv.fingerprint(secp()) != xpub.parent_fingerprint
        {
            return None;
        }
        xpriv.ckd_priv(secp(), xpub.child_number).ok()
    }
}

impl PrivateKeyProvider for XprivKeyring {
    fn xpriv_for(&self, xpub: &ExtendedPubKey) -> Option<ExtendedPrivKey> {
        let found = self.keys.iter().find_map(|xpriv| {
            let candidate = XprivKeyring::candidate(xpriv, xpub)?;
            let public = ExtendedPubKey::from_priv(secp(), &candidate);
            (public.public_key == xpub.public_key && public.chain_code == xpub.chain_code)
                .then_some(candidate)
        });
        match found {
            Some(_) => debug!("key ring has private key for {}", xpub.fingerprint()),
            None => debug!("key ring has no private key for {}", xpub.fingerprint()),
        }
        found
    }
}

impl FromIterator<ExtendedPrivKey> for XprivKeyring {
    fn from_iter<T: IntoIterator<Item = ExtendedPrivKey>>(iter: T) -> Self {
        let mut keyring = XprivKeyring::new();
        keyring.extend(iter);
        keyring
    }
}

impl Extend<ExtendedPrivKey> for XprivKeyring {
    fn extend<T: IntoIterator<Item = ExtendedPrivKey>>(&mut self, iter: T) {
        for xpriv in iter {
            self.add(xpriv);
        }
    }
}

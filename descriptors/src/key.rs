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

//! Key expressions and their resolution into concrete public keys.

use std::fmt::{self, Display, Formatter};

use bitcoin::secp256k1::{self, All, Secp256k1};
use bitcoin::util::bip32::{ChildNumber, ExtendedPrivKey, ExtendedPubKey};
use bitcoin::{PrivateKey, PublicKey};
use descriptor_hd::DerivationPath;

/// Global secp256k1 context used for all key derivations
pub(crate) fn secp() -> &'static Secp256k1<All> { secp256k1::SECP256K1 }

/// Source of extended private keys for hardened derivations which can't be
/// performed from extended public keys alone.
///
/// Provider receives the extended public key from which a hardened child must
/// be derived and returns its private counterpart, if known. Any closure of
/// the form `Fn(&ExtendedPubKey) -> Option<ExtendedPrivKey>` is a provider.
pub trait PrivateKeyProvider {
    /// Returns extended private key matching the given extended public key
    fn xpriv_for(&self, xpub: &ExtendedPubKey) -> Option<ExtendedPrivKey>;
}

impl<F> PrivateKeyProvider for F
where
    F: Fn(&ExtendedPubKey) -> Option<ExtendedPrivKey>,
{
    #[inline]
    fn xpriv_for(&self, xpub: &ExtendedPubKey) -> Option<ExtendedPrivKey> { self(xpub) }
}

/// Extended key used in a key expression.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Display, From)]
pub enum ExtendedKey {
    /// Extended public key (xpub, tpub)
    #[from]
    #[display(inner)]
    Public(ExtendedPubKey),

    /// Extended private key (xprv, tprv)
    #[from]
    #[display(inner)]
    Private(ExtendedPrivKey),
}

impl ExtendedKey {
    /// Returns extended public key, converting private key if needed
    pub fn to_public(&self) -> ExtendedPubKey {
        match self {
            ExtendedKey::Public(xpub) => *xpub,
            ExtendedKey::Private(xpriv) => ExtendedPubKey::from_priv(secp(), xpriv),
        }
    }

    /// Detects whether the key contains private key material
    #[inline]
    pub fn is_private(&self) -> bool { matches!(self, ExtendedKey::Private(_)) }

    /// Derives single child. Hardened children of public keys require
    /// `provider` to know the private counterpart of the key; the result of
    /// such derivation is a public key.
    fn derive_child(
        self,
        child: ChildNumber,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Option<ExtendedKey> {
        let secp = secp();
        match self {
            ExtendedKey::Private(xpriv) => xpriv.ckd_priv(secp, child).ok().map(ExtendedKey::Private),
            ExtendedKey::Public(xpub) if child.is_normal() => {
                xpub.ckd_pub(secp, child).ok().map(ExtendedKey::Public)
            }
            ExtendedKey::Public(xpub) => {
                let Some(provider) = provider else {
                    debug!("hardened derivation {child} requires a private key provider");
                    return None;
                };
                let xpriv = provider.xpriv_for(&xpub).filter(|xpriv| {
                    let matching = ExtendedPubKey::from_priv(secp, xpriv);
                    matching.public_key == xpub.public_key && matching.chain_code == xpub.chain_code
                });
                let Some(xpriv) = xpriv else {
                    debug!(
                        "no private key is known for {} required by hardened derivation {child}",
                        xpub.fingerprint()
                    );
                    return None;
                };
                let derived = xpriv.ckd_priv(secp, child).ok()?;
                Some(ExtendedKey::Public(ExtendedPubKey::from_priv(secp, &derived)))
            }
        }
    }
}

/// Key material of a key expression.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Key {
    /// Compressed (33-byte) public key
    Compressed(PublicKey),

    /// Uncompressed (65-byte) public key
    Uncompressed(PublicKey),

    /// WIF-encoded private key
    Wif(PrivateKey),

    /// Extended key with the derivation steps which follow it
    Extended {
        /// Extended public or private key
        xkey: ExtendedKey,

        /// Children derivation steps; only the last one may be a wildcard
        children: DerivationPath,
    },
}

impl Key {
    /// Wraps public key into the variant matching its compression
    pub fn with_public_key(pk: PublicKey) -> Key {
        match pk.compressed {
            true => Key::Compressed(pk),
            false => Key::Uncompressed(pk),
        }
    }

    /// Detects whether the key contains private key material
    pub fn has_private_key(&self) -> bool {
        match self {
            Key::Compressed(_) | Key::Uncompressed(_) => false,
            Key::Wif(_) => true,
            Key::Extended { xkey, .. } => xkey.is_private(),
        }
    }

    /// Returns copy of the key with all private key material replaced by
    /// its public counterpart
    pub fn to_public(&self) -> Key {
        match self {
            Key::Compressed(_) | Key::Uncompressed(_) => self.clone(),
            Key::Wif(sk) => Key::Compressed(wif_public_key(sk)),
            Key::Extended { xkey, children } => Key::Extended {
                xkey: ExtendedKey::Public(xkey.to_public()),
                children: children.clone(),
            },
        }
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Key::Compressed(pk) | Key::Uncompressed(pk) => Display::fmt(pk, f),
            Key::Wif(sk) => f.write_str(&sk.to_wif()),
            Key::Extended { xkey, children } => {
                Display::fmt(xkey, f)?;
                Display::fmt(children, f)
            }
        }
    }
}

/// WIF private keys always resolve into the compressed form of their public
/// key, whatever compression flag the WIF encoding carries.
fn wif_public_key(sk: &PrivateKey) -> PublicKey {
    PublicKey::new(secp256k1::PublicKey::from_secret_key(secp(), &sk.inner))
}

/// Key expression: optional key origin followed by key material.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KeyExpression {
    /// Key origin: master key fingerprint with the derivation path from it
    pub origin: Option<DerivationPath>,

    /// Key material
    pub key: Key,
}

impl From<Key> for KeyExpression {
    fn from(key: Key) -> Self { KeyExpression { origin: None, key } }
}

impl Display for KeyExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(origin) = &self.origin {
            write!(f, "[{}]", origin)?;
        }
        Display::fmt(&self.key, f)
    }
}

impl KeyExpression {
    /// Detects whether the children derivation of the key ends with a
    /// wildcard, requiring child number at resolution time
    pub fn is_ranged(&self) -> bool {
        match &self.key {
            Key::Extended { children, .. } => children.is_ranged(),
            _ => false,
        }
    }

    /// Returns copy of the expression without private key material
    pub fn to_public(&self) -> KeyExpression {
        KeyExpression {
            origin: self.origin.clone(),
            key: self.key.to_public(),
        }
    }

    /// Resolves the expression into a concrete public key.
    ///
    /// Returns `None` if the key is ranged and no `wildcard` child number is
    /// given (or it is not below 2^31), or if a hardened derivation step
    /// follows public key material and `provider` does not know its private
    /// key.
    pub fn resolve_public_key(
        &self,
        wildcard: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Option<PublicKey> {
        match &self.key {
            Key::Compressed(pk) | Key::Uncompressed(pk) => Some(*pk),
            Key::Wif(sk) => Some(wif_public_key(sk)),
            Key::Extended { xkey, children } => {
                let mut current = *xkey;
                for step in children {
                    let Some(child) = step.to_child_number(wildcard) else {
                        debug!("key derivation step {step} requires a valid wildcard child number");
                        return None;
                    };
                    current = current.derive_child(child, provider)?;
                    trace!("derived child {child} of an extended key");
                }
                Some(PublicKey::new(current.to_public().public_key))
            }
        }
    }

    /// Resolves the expression into serialized public key bytes; see
    /// [`KeyExpression::resolve_public_key`].
    #[inline]
    pub fn resolve_public_key_bytes(
        &self,
        wildcard: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Option<Vec<u8>> {
        self.resolve_public_key(wildcard, provider)
            .map(|pk| pk.to_bytes())
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::str::FromStr;

    use descriptor_hd::DerivationStep;

    use super::*;

    pub(crate) const XPRV_MASTER: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
    pub(crate) const XPUB_MASTER: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
    pub(crate) const XPUB_0H: &str = "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw";

    pub(crate) fn xpub_master() -> ExtendedPubKey { ExtendedPubKey::from_str(XPUB_MASTER).unwrap() }

    pub(crate) fn xprv_master() -> ExtendedPrivKey { ExtendedPrivKey::from_str(XPRV_MASTER).unwrap() }

    pub(crate) fn master_provider(xpub: &ExtendedPubKey) -> Option<ExtendedPrivKey> {
        let xprv = xprv_master();
        (ExtendedPubKey::from_priv(secp(), &xprv) == *xpub).then_some(xprv)
    }

    fn extended(xkey: ExtendedKey, children: &str) -> KeyExpression {
        Key::Extended {
            xkey,
            children: DerivationPath::from_str(children).unwrap(),
        }
        .into()
    }

    #[test]
    fn plain_keys() {
        let pk = PublicKey::from_str(
            "03501e454bf00751f24b1b489aa925215d66af2234e3891c3b21a52bedb3cd711c",
        )
        .unwrap();
        let expr = KeyExpression::from(Key::with_public_key(pk));
        assert_eq!(expr.resolve_public_key(None, None), Some(pk));
        assert_eq!(expr.resolve_public_key_bytes(Some(5), None), Some(pk.to_bytes()));
        assert!(!expr.is_ranged());
    }

    #[test]
    fn wif_resolves_compressed() {
        let sk = PrivateKey::from_wif("5Kb8kLf9zgWQnogidDA76MzPL6TsZZY36hWXMssSzNydYXYB9KF").unwrap();
        assert!(!sk.compressed);
        let expr = KeyExpression::from(Key::Wif(sk));
        let pk = expr.resolve_public_key(None, None).unwrap();
        assert!(pk.compressed);
        assert_eq!(pk.to_bytes().len(), 33);
        assert_eq!(pk.inner, sk.public_key(secp()).inner);
        assert!(expr.key.has_private_key());
        assert_eq!(expr.to_public().key, Key::Compressed(pk));
    }

    #[test]
    fn unhardened_derivation() {
        let expr = extended(ExtendedKey::Public(xpub_master()), "/0/*");
        assert!(expr.is_ranged());
        assert_eq!(expr.resolve_public_key(None, None), None);
        assert_eq!(expr.resolve_public_key(Some(1 << 31), None), None);

        let expected = xpub_master()
            .ckd_pub(secp(), ChildNumber::Normal { index: 0 })
            .unwrap()
            .ckd_pub(secp(), ChildNumber::Normal { index: 7 })
            .unwrap();
        assert_eq!(
            expr.resolve_public_key(Some(7), None),
            Some(PublicKey::new(expected.public_key))
        );
    }

    #[test]
    fn hardened_derivation_requires_provider() {
        let expected = ExtendedPubKey::from_str(XPUB_0H).unwrap().public_key;

        let from_xpub = extended(ExtendedKey::Public(xpub_master()), "/0h");
        assert_eq!(from_xpub.resolve_public_key(None, None), None);
        let unrelated = |_: &ExtendedPubKey| -> Option<ExtendedPrivKey> { None };
        assert_eq!(from_xpub.resolve_public_key(None, Some(&unrelated)), None);
        assert_eq!(
            from_xpub.resolve_public_key(None, Some(&master_provider)),
            Some(PublicKey::new(expected))
        );

        let from_xprv = extended(ExtendedKey::Private(xprv_master()), "/0h");
        assert_eq!(
            from_xprv.resolve_public_key(None, None),
            Some(PublicKey::new(expected))
        );
    }

    #[test]
    fn mismatching_provider_is_ignored() {
        let other = ExtendedPrivKey::from_str(XPRV_MASTER)
            .unwrap()
            .ckd_priv(secp(), ChildNumber::Normal { index: 1 })
            .unwrap();
        let liar = move |_: &ExtendedPubKey| Some(other);
        let expr = extended(ExtendedKey::Public(xpub_master()), "/0h");
        assert_eq!(expr.resolve_public_key(None, Some(&liar)), None);
    }

    #[test]
    fn hardened_wildcard() {
        let expr = KeyExpression {
            origin: None,
            key: Key::Extended {
                xkey: ExtendedKey::Public(xpub_master()),
                children: DerivationPath::children([DerivationStep::wildcard(true)]).unwrap(),
            },
        };
        assert_eq!(expr.resolve_public_key(Some(0), None), None);
        assert_eq!(
            expr.resolve_public_key(Some(0), Some(&master_provider)),
            Some(PublicKey::new(ExtendedPubKey::from_str(XPUB_0H).unwrap().public_key))
        );
    }

    #[test]
    fn display() {
        let expr = KeyExpression {
            origin: Some(DerivationPath::from_str("d34db33f/44h/0h/0h").unwrap()),
            key: Key::Extended {
                xkey: ExtendedKey::Private(xprv_master()),
                children: DerivationPath::from_str("/1/*").unwrap(),
            },
        };
        assert_eq!(expr.to_string(), format!("[d34db33f/44h/0h/0h]{XPRV_MASTER}/1/*"));
        assert_eq!(
            expr.to_public().to_string(),
            format!("[d34db33f/44h/0h/0h]{XPUB_MASTER}/1/*")
        );
    }
}

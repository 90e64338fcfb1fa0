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

use std::fmt::{self, Display, Formatter};

use bitcoin::hashes::hex::ToHex;
use bitcoin::Address;

use crate::KeyExpression;

/// Maximum number of keys accepted by `OP_CHECKMULTISIG`
pub const MAX_MULTISIG_KEYS: usize = 20;

/// Parsed descriptor tree. Each `sh` and `wsh` node exclusively owns its
/// inner node.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum DescriptorNode {
    /// `raw(HEX)`: literal script bytes
    Raw(Vec<u8>),

    /// `pk(KEY)`: pay to public key
    Pk(KeyExpression),

    /// `pkh(KEY)`: pay to public key hash
    Pkh(KeyExpression),

    /// `wpkh(KEY)`: pay to witness public key hash
    Wpkh(KeyExpression),

    /// `combo(KEY)`: any of pk, pkh, wpkh and sh-wrapped wpkh outputs
    Combo(KeyExpression),

    /// `multi(k,KEY,...)` and `sortedmulti(k,KEY,...)`: bare multisig
    Multi {
        /// Number of signatures required
        threshold: usize,

        /// Keys in the order they were given
        keys: Vec<KeyExpression>,

        /// Whether keys are sorted (BIP67) at compilation time
        sorted: bool,
    },

    /// `wsh(SCRIPT)`: pay to witness script hash
    Wsh(Box<DescriptorNode>),

    /// `sh(SCRIPT)`: pay to script hash
    Sh(Box<DescriptorNode>),

    /// `addr(ADDRESS)`: script of the given address
    Addr(Address),
}

impl Display for DescriptorNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorNode::Raw(data) => write!(f, "raw({})", data.to_hex()),
            DescriptorNode::Pk(key) => write!(f, "pk({})", key),
            DescriptorNode::Pkh(key) => write!(f, "pkh({})", key),
            DescriptorNode::Wpkh(key) => write!(f, "wpkh({})", key),
            DescriptorNode::Combo(key) => write!(f, "combo({})", key),
            DescriptorNode::Multi {
                threshold,
                keys,
                sorted,
            } => {
                f.write_str(if *sorted { "sortedmulti(" } else { "multi(" })?;
                Display::fmt(threshold, f)?;
                for key in keys {
                    write!(f, ",{}", key)?;
                }
                f.write_str(")")
            }
            DescriptorNode::Wsh(inner) => write!(f, "wsh({})", inner),
            DescriptorNode::Sh(inner) => write!(f, "sh({})", inner),
            DescriptorNode::Addr(address) => write!(f, "addr({})", address),
        }
    }
}

impl DescriptorNode {
    /// Returns all key expressions reachable from the node, in the order of
    /// their appearance in the descriptor text.
    pub fn keys(&self) -> Vec<&KeyExpression> {
        match self {
            DescriptorNode::Raw(_) | DescriptorNode::Addr(_) => vec![],
            DescriptorNode::Pk(key)
            | DescriptorNode::Pkh(key)
            | DescriptorNode::Wpkh(key)
            | DescriptorNode::Combo(key) => vec![key],
            DescriptorNode::Multi { keys, .. } => keys.iter().collect(),
            DescriptorNode::Wsh(inner) | DescriptorNode::Sh(inner) => inner.keys(),
        }
    }

    /// Detects whether some of the keys end their derivation with a wildcard,
    /// so compilation needs a child number.
    #[inline]
    pub fn requires_wildcard_child_num(&self) -> bool {
        self.keys().into_iter().any(KeyExpression::is_ranged)
    }

    /// Detects whether some of the keys contain private key material
    #[inline]
    pub fn has_private_keys(&self) -> bool {
        self.keys().into_iter().any(|key| key.key.has_private_key())
    }

    /// Detects `combo` descriptors, which need an output selector to compile
    #[inline]
    pub fn is_combo(&self) -> bool { matches!(self, DescriptorNode::Combo(_)) }

    /// Returns copy of the tree with all private keys replaced with their
    /// public counterparts.
    pub fn to_public(&self) -> DescriptorNode {
        match self {
            DescriptorNode::Raw(_) | DescriptorNode::Addr(_) => self.clone(),
            DescriptorNode::Pk(key) => DescriptorNode::Pk(key.to_public()),
            DescriptorNode::Pkh(key) => DescriptorNode::Pkh(key.to_public()),
            DescriptorNode::Wpkh(key) => DescriptorNode::Wpkh(key.to_public()),
            DescriptorNode::Combo(key) => DescriptorNode::Combo(key.to_public()),
            DescriptorNode::Multi {
                threshold,
                keys,
                sorted,
            } => DescriptorNode::Multi {
                threshold: *threshold,
                keys: keys.iter().map(KeyExpression::to_public).collect(),
                sorted: *sorted,
            },
            DescriptorNode::Wsh(inner) => DescriptorNode::Wsh(Box::new(inner.to_public())),
            DescriptorNode::Sh(inner) => DescriptorNode::Sh(Box::new(inner.to_public())),
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use bitcoin::PublicKey;
    use descriptor_hd::DerivationPath;

    use super::*;
    use crate::key::test::xpub_master;
    use crate::{ExtendedKey, Key};

    fn pk(hex: &str) -> KeyExpression {
        Key::with_public_key(PublicKey::from_str(hex).unwrap()).into()
    }

    #[test]
    fn display_and_keys() {
        let a = pk("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
        let ranged = KeyExpression::from(Key::Extended {
            xkey: ExtendedKey::Public(xpub_master()),
            children: DerivationPath::from_str("/0/*").unwrap(),
        });
        let node = DescriptorNode::Sh(Box::new(DescriptorNode::Wsh(Box::new(
            DescriptorNode::Multi {
                threshold: 1,
                keys: vec![a.clone(), ranged.clone()],
                sorted: true,
            },
        ))));
        assert_eq!(
            node.to_string(),
            format!("sh(wsh(sortedmulti(1,{},{})))", a, ranged)
        );
        assert_eq!(node.keys(), vec![&a, &ranged]);
        assert!(node.requires_wildcard_child_num());
        assert!(!node.has_private_keys());
        assert!(!node.is_combo());
        assert_eq!(node.to_public(), node);

        let raw = DescriptorNode::Raw(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(raw.to_string(), "raw(deadbeef)");
        assert!(raw.keys().is_empty());
        assert!(!raw.requires_wildcard_child_num());
    }
}

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

//! Compilation of descriptor trees into output scripts.

use std::str::FromStr;

use bitcoin::blockdata::opcodes::all::OP_CHECKMULTISIG;
use bitcoin::blockdata::script::Builder;
use bitcoin::{PublicKey, Script};

use crate::{DescriptorNode, KeyExpression, PrivateKeyProvider};

/// Output kind selected when compiling `combo` descriptors.
#[derive(Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", rename_all = "kebab-case")
)]
pub enum ComboSelector {
    /// Pay to public key
    #[display("pk")]
    Pk,

    /// Pay to public key hash
    #[display("pkh")]
    Pkh,

    /// Pay to witness public key hash; compressed keys only
    #[display("wpkh")]
    Wpkh,

    /// Pay to witness public key hash nested into pay to script hash;
    /// compressed keys only
    #[display("sh-wpkh")]
    ShWpkh,
}

impl ComboSelector {
    /// All `combo` outputs in the order Bitcoin Core lists them
    pub const ALL: [ComboSelector; 4] = [
        ComboSelector::Pk,
        ComboSelector::Pkh,
        ComboSelector::Wpkh,
        ComboSelector::ShWpkh,
    ];
}

/// unknown combo output selector `{0}`; expected one of `pk`, `pkh`, `wpkh`
/// and `sh-wpkh`.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub struct UnknownComboSelector(pub String);

impl FromStr for ComboSelector {
    type Err = UnknownComboSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComboSelector::ALL
            .into_iter()
            .find(|selector| selector.to_string() == s.to_lowercase())
            .ok_or_else(|| UnknownComboSelector(s.to_owned()))
    }
}

fn p2wpkh(pk: &PublicKey) -> Option<Script> {
    match pk.wpubkey_hash() {
        Some(hash) => Some(Script::new_v0_p2wpkh(&hash)),
        None => {
            debug!("witness outputs can't use uncompressed key {}", pk);
            None
        }
    }
}

fn resolve(
    key: &KeyExpression,
    wildcard: Option<u32>,
    provider: Option<&dyn PrivateKeyProvider>,
) -> Option<PublicKey> {
    let pk = key.resolve_public_key(wildcard, provider);
    if pk.is_none() {
        debug!("unable to resolve key {} with wildcard child {:?}", key, wildcard);
    }
    pk
}

impl DescriptorNode {
    /// Compiles descriptor into an output script.
    ///
    /// `wildcard` is the child number used by ranged keys, `provider`
    /// supplies private keys for hardened derivations from extended public
    /// keys and `combo` selects which output a `combo` descriptor produces.
    ///
    /// Returns `None` if some of the keys can't be resolved, if a witness
    /// output is requested for an uncompressed key, or if `combo` is compiled
    /// without a selector. A failure anywhere in the tree fails the whole
    /// compilation.
    pub fn compile(
        &self,
        wildcard: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
        combo: Option<ComboSelector>,
    ) -> Option<Script> {
        match self {
            DescriptorNode::Raw(data) => Some(Script::from(data.clone())),
            DescriptorNode::Pk(key) => {
                resolve(key, wildcard, provider).map(|pk| Script::new_p2pk(&pk))
            }
            DescriptorNode::Pkh(key) => {
                resolve(key, wildcard, provider).map(|pk| Script::new_p2pkh(&pk.pubkey_hash()))
            }
            DescriptorNode::Wpkh(key) => p2wpkh(&resolve(key, wildcard, provider)?),
            DescriptorNode::Combo(key) => {
                let Some(selector) = combo else {
                    debug!("combo descriptor requires output selector");
                    return None;
                };
                let pk = resolve(key, wildcard, provider)?;
                match selector {
                    ComboSelector::Pk => Some(Script::new_p2pk(&pk)),
                    ComboSelector::Pkh => Some(Script::new_p2pkh(&pk.pubkey_hash())),
                    ComboSelector::Wpkh => p2wpkh(&pk),
                    ComboSelector::ShWpkh => {
                        p2wpkh(&pk).map(|script| Script::new_p2sh(&script.script_hash()))
                    }
                }
            }
            DescriptorNode::Multi {
                threshold,
                keys,
                sorted,
            } => {
                let mut keys = keys
                    .iter()
                    .map(|key| resolve(key, wildcard, provider).map(|pk| pk.to_bytes()))
                    .collect::<Option<Vec<_>>>()?;
                if *sorted {
                    keys.sort();
                }
                let builder = keys
                    .iter()
                    .fold(Builder::new().push_int(*threshold as i64), |builder, key| {
                        builder.push_slice(key)
                    });
                Some(
                    builder
                        .push_int(keys.len() as i64)
                        .push_opcode(OP_CHECKMULTISIG)
                        .into_script(),
                )
            }
            DescriptorNode::Wsh(inner) => inner
                .compile(wildcard, provider, combo)
                .map(|script| Script::new_v0_p2wsh(&script.wscript_hash())),
            DescriptorNode::Sh(inner) => inner
                .compile(wildcard, provider, combo)
                .map(|script| Script::new_p2sh(&script.script_hash())),
            DescriptorNode::Addr(address) => Some(address.script_pubkey()),
        }
    }
}

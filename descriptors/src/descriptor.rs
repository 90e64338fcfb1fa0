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
use std::str::FromStr;

use bitcoin::{Address, Network, Script};

use crate::checksum::{checksum, verify_checksum};
use crate::{
    parse, tokenize, ChecksumError, ComboSelector, DescriptorNode, LexError, ParseError,
    PrivateKeyProvider,
};

/// Errors parsing descriptor text.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error, From)]
#[display(inner)]
pub enum Error {
    /// Descriptor text can't be split into tokens
    #[from]
    Lex(LexError),

    /// Descriptor tokens do not follow the descriptor grammar
    #[from]
    Parse(ParseError),

    /// Descriptor checksum is invalid
    #[from]
    Checksum(ChecksumError),
}

/// Parsed output descriptor.
///
/// The descriptor is parsed once and can then be compiled any number of
/// times with different child numbers; compilation never modifies it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Descriptor {
    node: DescriptorNode,
}

impl From<DescriptorNode> for Descriptor {
    fn from(node: DescriptorNode) -> Self { Descriptor { node } }
}

impl Descriptor {
    /// Parses descriptor text, verifying `#checksum` suffix if present.
    pub fn parse(s: &str) -> Result<Descriptor, Error> {
        let source = verify_checksum(s)?;
        let tokens = tokenize(source)?;
        let node = parse(&tokens)?;
        Ok(Descriptor { node })
    }

    /// Returns root of the descriptor tree
    #[inline]
    pub fn node(&self) -> &DescriptorNode { &self.node }

    /// Compiles the descriptor into an output script; see
    /// [`DescriptorNode::compile`].
    #[inline]
    pub fn compile(
        &self,
        wildcard: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
        combo: Option<ComboSelector>,
    ) -> Option<Script> {
        self.node.compile(wildcard, provider, combo)
    }

    /// Detects whether compilation requires a wildcard child number
    #[inline]
    pub fn requires_wildcard_child_num(&self) -> bool { self.node.requires_wildcard_child_num() }

    /// Detects `combo` descriptors, which need [`ComboSelector`] to compile
    #[inline]
    pub fn is_combo(&self) -> bool { self.node.is_combo() }

    /// Detects whether the descriptor contains private key material
    #[inline]
    pub fn has_private_keys(&self) -> bool { self.node.has_private_keys() }

    /// Returns descriptor with WIF keys replaced by compressed public keys
    /// and extended private keys replaced by extended public keys
    #[inline]
    pub fn to_public(&self) -> Descriptor {
        Descriptor {
            node: self.node.to_public(),
        }
    }

    /// Compiles all output scripts of the descriptor. For `combo` these are
    /// pk and pkh outputs followed, for compressed keys only, by wpkh and
    /// sh-wpkh outputs; other descriptors have a single output.
    pub fn script_pubkeys(
        &self,
        wildcard: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Vec<Script> {
        if !self.is_combo() {
            return self.compile(wildcard, provider, None).into_iter().collect();
        }
        ComboSelector::ALL
            .into_iter()
            .filter_map(|selector| self.compile(wildcard, provider, Some(selector)))
            .collect()
    }

    /// Returns address of the compiled output script, if the script has an
    /// address form. `combo` descriptors have no single address and return
    /// `None`.
    pub fn address(
        &self,
        network: Network,
        wildcard: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Option<Address> {
        let script = self.compile(wildcard, provider, None)?;
        Address::from_script(&script, network).ok()
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = self.node.to_string();
        f.write_str(&s)?;
        if f.alternate() {
            let checksum = checksum(&s).map_err(|_| fmt::Error)?;
            write!(f, "#{}", checksum)?;
        }
        Ok(())
    }
}

impl FromStr for Descriptor {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> { Descriptor::parse(s) }
}

#[cfg(feature = "serde")]
mod _serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::*;

    impl Serialize for Descriptor {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Descriptor {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            Descriptor::from_str(&s).map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod test {
    use bitcoin::hashes::hex::ToHex;
    use bitcoin::hashes::{hash160, Hash};
    use bitcoin::PublicKey;

    use super::*;
    use crate::key::test::{master_provider, XPRV_MASTER, XPUB_0H, XPUB_MASTER};
    use crate::parser::Position;

    const PK: &str = "03501e454bf00751f24b1b489aa925215d66af2234e3891c3b21a52bedb3cd711c";
    const G: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const G_FULL: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    fn compile(s: &str) -> Option<Script> { Descriptor::from_str(s).unwrap().compile(None, None, None) }

    #[test]
    fn pkh_script() {
        let pk = PublicKey::from_str(PK).unwrap();
        let hash = hash160::Hash::hash(&pk.to_bytes());
        assert_eq!(
            compile(&format!("pkh({PK})")).unwrap().to_hex(),
            format!("76a914{}88ac", hash.to_hex())
        );
    }

    #[test]
    fn sh_wpkh_script() {
        let pk = PublicKey::from_str(G).unwrap();
        let witness_program = Script::new_v0_p2wpkh(&pk.wpubkey_hash().unwrap());
        let hash = hash160::Hash::hash(witness_program.as_bytes());
        assert_eq!(
            compile(&format!("sh(wpkh({G}))")).unwrap().to_hex(),
            format!("a914{}87", hash.to_hex())
        );
        assert_eq!(compile(&format!("sh(wpkh({G_FULL}))")), None);
    }

    #[test]
    fn determinism() {
        let descriptor = Descriptor::from_str(&format!(
            "wsh(sortedmulti(1,[d34db33f/48h/0h/0h/2h]{XPUB_MASTER}/0/*,{PK}))"
        ))
        .unwrap();
        assert!(descriptor.requires_wildcard_child_num());
        assert_eq!(descriptor.compile(None, None, None), None);
        assert_eq!(descriptor.compile(Some(5), None, None), descriptor.compile(Some(5), None, None));
        assert!(descriptor.compile(Some(5), None, None).unwrap().is_v0_p2wsh());
    }

    #[test]
    fn checksum_handling() {
        let descriptor = Descriptor::from_str("raw(deadbeef)#89f8spxm").unwrap();
        assert_eq!(descriptor.to_string(), "raw(deadbeef)");
        assert_eq!(format!("{:#}", descriptor), "raw(deadbeef)#89f8spxm");
        assert!(matches!(
            Descriptor::from_str("raw(deadbeef)#89f8spxx"),
            Err(Error::Checksum(ChecksumError::Mismatch { .. }))
        ));
        assert!(matches!(
            Descriptor::from_str("raw(deadbeef)#89f8sp"),
            Err(Error::Checksum(ChecksumError::InvalidLength(6)))
        ));
        assert!(matches!(
            Descriptor::from_str("raw(deadbeef)#89f8spxmq"),
            Err(Error::Checksum(ChecksumError::InvalidLength(9)))
        ));
    }

    #[test]
    fn errors() {
        assert_eq!(
            Descriptor::from_str("pk(03 00)"),
            Err(Error::Lex(LexError { position: 5 }))
        );
        let Err(Error::Parse(err)) = Descriptor::from_str(&format!("wsh(wpkh({G}))")) else {
            panic!("parse error expected")
        };
        assert_eq!(err.position, Position::Span(4..8));
    }

    #[test]
    fn display_round_trip() {
        for s in [
            format!("pk({G_FULL})"),
            format!("pkh([d34db33f/44h/0h/0h]{XPUB_MASTER}/1/*)"),
            format!("sh(wsh(multi(2,{G},{PK},[aabbccdd]{XPRV_MASTER}/7h/*h)))"),
            format!("combo({XPUB_0H})"),
            s!("addr(bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4)"),
            s!("pkh(L4rK1yDtCWekvXuE6oXD9jCYfFNV2cWRpVuPLBcCU2z8TrisoyY1)"),
        ] {
            let descriptor = Descriptor::from_str(&s).unwrap();
            assert_eq!(descriptor.to_string(), s);
            assert_eq!(Descriptor::from_str(&format!("{:#}", descriptor)).unwrap(), descriptor);
        }
        let quoted = Descriptor::from_str(&format!("wpkh({XPUB_MASTER}/0'/1h/*')")).unwrap();
        assert_eq!(quoted.to_string(), format!("wpkh({XPUB_MASTER}/0h/1h/*h)"));
    }

    #[test]
    fn private_keys() {
        let descriptor = Descriptor::from_str(&format!("wpkh({XPRV_MASTER}/0h/*)")).unwrap();
        assert!(descriptor.has_private_keys());
        let public = descriptor.to_public();
        assert!(!public.has_private_keys());
        assert_eq!(public.to_string(), format!("wpkh({XPUB_MASTER}/0h/*)"));
        assert_eq!(public.compile(Some(1), None, None), None);
        assert_eq!(
            public.compile(Some(1), Some(&master_provider), None),
            descriptor.compile(Some(1), None, None)
        );

        let wif = Descriptor::from_str("pk(5Kb8kLf9zgWQnogidDA76MzPL6TsZZY36hWXMssSzNydYXYB9KF)")
            .unwrap();
        let public = wif.to_public();
        let DescriptorNode::Pk(key) = public.node() else { panic!("pk expected") };
        assert_eq!(key.resolve_public_key_bytes(None, None).unwrap().len(), 33);
        assert_eq!(public.compile(None, None, None), wif.compile(None, None, None));
    }

    #[test]
    fn combo_outputs() {
        let descriptor = Descriptor::from_str(&format!("combo({G})")).unwrap();
        assert!(descriptor.is_combo());
        assert_eq!(descriptor.compile(None, None, None), None);
        assert_eq!(descriptor.address(Network::Bitcoin, None, None), None);
        let scripts = descriptor.script_pubkeys(None, None);
        assert_eq!(scripts.len(), 4);
        assert!(scripts[1].is_p2pkh());
        assert!(scripts[2].is_v0_p2wpkh());
        assert!(scripts[3].is_p2sh());

        let descriptor = Descriptor::from_str(&format!("combo({G_FULL})")).unwrap();
        assert_eq!(descriptor.script_pubkeys(None, None).len(), 2);
    }

    #[test]
    fn addresses() {
        let descriptor =
            Descriptor::from_str("addr(bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4)").unwrap();
        assert_eq!(
            descriptor
                .address(Network::Bitcoin, None, None)
                .unwrap()
                .to_string(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
        let descriptor = Descriptor::from_str(&format!("wpkh({G})")).unwrap();
        assert!(descriptor
            .address(Network::Testnet, None, None)
            .unwrap()
            .to_string()
            .starts_with("tb1q"));
        assert_eq!(descriptor.script_pubkeys(None, None).len(), 1);
        let bare = Descriptor::from_str(&format!("pk({G})")).unwrap();
        assert_eq!(bare.address(Network::Bitcoin, None, None), None);
    }

    #[test]
    fn ranged_address() {
        let descriptor = Descriptor::from_str(&format!("sh(wpkh([00000000/84h/0h/0h]{XPUB_0H}/0/*))"))
            .unwrap();
        assert_eq!(descriptor.address(Network::Bitcoin, None, None), None);
        let address = descriptor.address(Network::Bitcoin, Some(2), None).unwrap();
        assert!(address.to_string().starts_with('3'));
        assert_eq!(
            address.script_pubkey(),
            descriptor.compile(Some(2), None, None).unwrap()
        );
    }

    #[test]
    #[cfg(feature = "serde")]
    fn serde_str() {
        let descriptor = Descriptor::from_str(&format!("pkh({XPUB_MASTER}/1h/*)")).unwrap();
        let json = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(json, format!("\"pkh({XPUB_MASTER}/1h/*)\""));
        assert_eq!(serde_json::from_str::<Descriptor>(&json).unwrap(), descriptor);
        assert!(serde_json::from_str::<Descriptor>("\"pkh(\"").is_err());
    }

    #[test]
    fn send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Descriptor>();
    }
}

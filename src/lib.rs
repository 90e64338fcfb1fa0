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

//! Bitcoin output descriptor compiler: descriptor parsing and compilation
//! together with an extended private key ring used for hardened
//! derivations from extended public keys.

// Coding conventions
#![recursion_limit = "256"]
#![warn(dead_code, missing_docs)]

#[macro_use]
extern crate tracing;

pub extern crate descriptor_hd as hd;
pub extern crate descriptors;

mod keyring;

pub use descriptors::{ComboSelector, Descriptor, PrivateKeyProvider};
pub use keyring::XprivKeyring;

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

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate tracing;

use std::io;
use std::process::exit;
use std::str::FromStr;

use bitcoin::hashes::hex::ToHex;
use bitcoin::util::bip32::ExtendedPrivKey;
use bitcoin::{Address, Network, Script};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use descriptor_compiler::XprivKeyring;
use descriptors::{ComboSelector, Descriptor, PrivateKeyProvider};
use tracing::Level;

/// Command-line arguments
#[derive(Parser)]
#[derive(Clone, Eq, PartialEq, Debug)]
#[clap(
    author,
    version,
    name = "descr",
    about = "Command-line tool parsing and compiling bitcoin output descriptors"
)]
pub struct Args {
    /// Command to execute
    #[clap(subcommand)]
    pub command: Command,

    /// Network used to display addresses
    #[clap(short, long, global = true, default_value = "bitcoin")]
    pub network: Network,

    /// Extended private key used for hardened derivations from extended
    /// public keys. Can be repeated.
    #[clap(short = 'x', long = "xpriv", global = true)]
    pub xprivs: Vec<ExtendedPrivKey>,

    /// Increase verbosity of log messages printed to stderr
    #[clap(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Descriptor command to execute
#[derive(Subcommand)]
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Command {
    /// Parse descriptor and print its canonical form together with the
    /// checksum
    Check {
        /// Output descriptor, optionally followed by `#checksum`
        descriptor: String,
    },

    /// Compile descriptor into an output script
    Script {
        /// Output descriptor, optionally followed by `#checksum`
        descriptor: String,

        /// Child number used by wildcard derivation steps
        #[clap(short, long)]
        index: Option<u32>,

        /// Output to produce from a `combo` descriptor: `pk`, `pkh`, `wpkh`
        /// or `sh-wpkh`
        #[clap(long)]
        combo: Option<ComboSelector>,
    },

    /// Compile descriptor for a range of wildcard child numbers and print
    /// resulting scripts and addresses
    Derive {
        /// Output descriptor, optionally followed by `#checksum`
        descriptor: String,

        /// First child number to derive
        #[clap(short, long, default_value = "0")]
        from: u32,

        /// Number of child numbers to derive
        #[clap(short, long, default_value = "10")]
        count: u32,
    },
}

#[derive(Clone, PartialEq, Eq, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// {0}
    #[from]
    Descriptor(descriptors::Error),

    /// descriptor is ranged and requires child number; use `--index` option.
    IndexRequired,

    /// combo descriptor requires output selector; use `--combo` option.
    ComboSelectorRequired,

    /// descriptor can't be compiled: some of its keys can't be resolved (a
    /// hardened derivation may require `--xpriv` option) or a witness output
    /// uses an uncompressed key.
    Unresolvable,

    /// child number range {0}..{0}+{1} exceeds the maximum unhardened index.
    RangeOverflow(u32, u32),
}

impl Args {
    fn keyring(&self) -> XprivKeyring { self.xprivs.iter().copied().collect() }

    pub fn exec(&self) -> Result<(), Error> {
        let keyring = self.keyring();
        let provider: Option<&dyn PrivateKeyProvider> =
            if keyring.is_empty() { None } else { Some(&keyring) };
        debug!("using key ring with {} keys", keyring.len());

        match &self.command {
            Command::Check { descriptor } => self.check(descriptor),
            Command::Script {
                descriptor,
                index,
                combo,
            } => self.script(descriptor, *index, *combo, provider),
            Command::Derive {
                descriptor,
                from,
                count,
            } => self.derive(descriptor, *from, *count, provider),
        }
    }

    fn parse_descriptor(&self, descriptor: &str) -> Result<Descriptor, Error> {
        let descriptor = Descriptor::from_str(descriptor.trim())?;
        info!("parsed descriptor {}", descriptor);
        Ok(descriptor)
    }

    fn check(&self, descriptor: &str) -> Result<(), Error> {
        let descriptor = self.parse_descriptor(descriptor)?;
        let yes_no = |flag: bool| if flag { "yes".green() } else { "no".yellow() };
        println!();
        println!("{:<14} {:#}", "Descriptor:", descriptor);
        if descriptor.has_private_keys() {
            println!("{:<14} {:#}", "Public:", descriptor.to_public());
        }
        println!("{:<14} {}", "Ranged:", yes_no(descriptor.requires_wildcard_child_num()));
        println!("{:<14} {}", "Private keys:", yes_no(descriptor.has_private_keys()));
        println!("{:<14} {}", "Combo:", yes_no(descriptor.is_combo()));
        println!();
        Ok(())
    }

    fn script(
        &self,
        descriptor: &str,
        index: Option<u32>,
        combo: Option<ComboSelector>,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Result<(), Error> {
        let descriptor = self.parse_descriptor(descriptor)?;
        if descriptor.requires_wildcard_child_num() && index.is_none() {
            return Err(Error::IndexRequired);
        }
        if descriptor.is_combo() && combo.is_none() {
            return Err(Error::ComboSelectorRequired);
        }
        let script = descriptor
            .compile(index, provider, combo)
            .ok_or(Error::Unresolvable)?;
        self.print_script(&script);
        Ok(())
    }

    fn derive(
        &self,
        descriptor: &str,
        from: u32,
        count: u32,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Result<(), Error> {
        let descriptor = self.parse_descriptor(descriptor)?;
        if !descriptor.requires_wildcard_child_num() {
            eprintln!("{}", "Descriptor is not ranged; it has a single set of outputs".yellow());
            return self.derive_one(&descriptor, None, provider);
        }
        let to = from
            .checked_add(count)
            .filter(|to| *to <= 1 << 31)
            .ok_or(Error::RangeOverflow(from, count))?;
        for index in from..to {
            self.derive_one(&descriptor, Some(index), provider)?;
        }
        Ok(())
    }

    fn derive_one(
        &self,
        descriptor: &Descriptor,
        index: Option<u32>,
        provider: Option<&dyn PrivateKeyProvider>,
    ) -> Result<(), Error> {
        let scripts = descriptor.script_pubkeys(index, provider);
        if scripts.is_empty() {
            return Err(Error::Unresolvable);
        }
        let index = index.map(|i| i.to_string()).unwrap_or_default();
        for script in scripts {
            let address = Address::from_script(&script, self.network)
                .map(|address| address.to_string())
                .unwrap_or_else(|_| s!("-"));
            println!("{:>6} {:<64} {}", index.bright_white(), address.bright_green(), script.to_hex());
        }
        Ok(())
    }

    fn print_script(&self, script: &Script) {
        println!();
        println!("{:<9} {}", "Script:", script.to_hex());
        println!("{:<9} {}", "Asm:", script.asm());
        match Address::from_script(script, self.network) {
            Ok(address) => println!("{:<9} {}", "Address:", address.to_string().bright_green()),
            Err(_) => println!("{:<9} {}", "Address:", "none".yellow()),
        }
        println!();
    }
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();

    if let Err(err) = args.exec() {
        eprintln!("{}: {}\n", "Error".bright_red(), err);
        exit(1);
    }
}

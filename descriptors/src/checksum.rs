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

//! BIP380 descriptor checksum.

const INPUT_CHARSET: &str = "0123456789()[],'/*abcdefgh@:$%{}IJKLMNOPQRSTUVWXYZ&+-.;<=>?!^_|~ijklmnopqrstuvwxyzABCDEFGH`#\"\\ ";
const CHECKSUM_CHARSET: &[u8] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";
const GENERATOR: [u64; 5] = [0xf5dee51989, 0xa9fdca3312, 0x1bab10e32d, 0x3706b1677a, 0x644d626ffd];

/// Length of the descriptor checksum
pub const CHECKSUM_LEN: usize = 8;

/// Errors computing or verifying descriptor checksum.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum ChecksumError {
    /// descriptor contains character `{0}` which can't be covered by a
    /// checksum.
    InvalidChar(char),

    /// descriptor checksum must be 8 characters long, while the provided one
    /// has {0} characters.
    InvalidLength(usize),

    /// descriptor checksum mismatch: expected `{expected}`, found `{found}`.
    Mismatch {
        /// Checksum computed from the descriptor text
        expected: String,

        /// Checksum given after `#`
        found: String,
    },
}

fn poly_mod(mut c: u64, val: u64) -> u64 {
    let c0 = c >> 35;
    c = ((c & 0x7ffffffff) << 5) ^ val;
    for (i, generator) in GENERATOR.iter().enumerate() {
        if c0 & (1 << i) != 0 {
            c ^= generator;
        }
    }
    c
}

/// Computes BIP380 checksum of the descriptor text (without `#`).
pub fn checksum(descriptor: &str) -> Result<String, ChecksumError> {
    let mut c = 1u64;
    let mut class = 0u64;
    let mut count = 0;
    for ch in descriptor.chars() {
        let pos = INPUT_CHARSET
            .find(ch)
            .ok_or(ChecksumError::InvalidChar(ch))? as u64;
        c = poly_mod(c, pos & 31);
        class = class * 3 + (pos >> 5);
        count += 1;
        if count == 3 {
            c = poly_mod(c, class);
            class = 0;
            count = 0;
        }
    }
    if count > 0 {
        c = poly_mod(c, class);
    }
    for _ in 0..CHECKSUM_LEN {
        c = poly_mod(c, 0);
    }
    c ^= 1;

    Ok((0..CHECKSUM_LEN)
        .map(|j| CHECKSUM_CHARSET[((c >> (5 * (7 - j))) & 31) as usize] as char)
        .collect())
}

/// Splits `descriptor#checksum` text, verifying the checksum if it is
/// present, and returns the descriptor part.
pub fn verify_checksum(s: &str) -> Result<&str, ChecksumError> {
    let Some((descriptor, found)) = s.split_once('#') else {
        return Ok(s);
    };
    if found.chars().count() != CHECKSUM_LEN {
        return Err(ChecksumError::InvalidLength(found.chars().count()));
    }
    let expected = checksum(descriptor)?;
    if expected != found {
        return Err(ChecksumError::Mismatch {
            expected,
            found: found.to_owned(),
        });
    }
    Ok(descriptor)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bip380_vectors() {
        assert_eq!(checksum("raw(deadbeef)").unwrap(), "89f8spxm");
        assert_eq!(verify_checksum("raw(deadbeef)#89f8spxm"), Ok("raw(deadbeef)"));
        assert_eq!(verify_checksum("raw(deadbeef)"), Ok("raw(deadbeef)"));
    }

    #[test]
    fn invalid_checksums() {
        assert_eq!(
            verify_checksum("raw(deadbeef)#"),
            Err(ChecksumError::InvalidLength(0))
        );
        assert_eq!(
            verify_checksum("raw(deadbeef)#89f8spx"),
            Err(ChecksumError::InvalidLength(7))
        );
        assert_eq!(
            verify_checksum("raw(deadbeef)#89f8spxmx"),
            Err(ChecksumError::InvalidLength(9))
        );
        assert_eq!(
            verify_checksum("raw(deadbeef)#89f8spxn"),
            Err(ChecksumError::Mismatch {
                expected: s!("89f8spxm"),
                found: s!("89f8spxn")
            })
        );
        assert_eq!(
            verify_checksum("raw(deadbeef)##9f8spxm"),
            Err(ChecksumError::Mismatch {
                expected: s!("89f8spxm"),
                found: s!("#9f8spxm")
            })
        );
        assert_eq!(checksum("pk(Ω)"), Err(ChecksumError::InvalidChar('Ω')));
    }
}

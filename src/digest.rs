use std::{fmt, path::Path};

use sha2::Digest as _;

/// Algorithm to compute the hash value.
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum DigestAlgorithm {
    SHA256,
    SHA512,
}

/// A digest to validate the contents of a file.
///
/// It contains the algorithm (like `SHA256`) and its expected value as
/// a hexadecimal string.
///
/// # Examples
///
/// ```
/// # use image_inspect::*;
/// const DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
///
/// let digest = Digest::try_from(format!("sha256:{}", DIGEST)).unwrap();
/// assert_eq!(digest.algorithm(), DigestAlgorithm::SHA256);
/// assert_eq!(digest.hash_value(), DIGEST);
/// assert!(digest.verify(b"abc").is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Digest {
    hash: String,
    algorithm: DigestAlgorithm,
}

/// Errors from the digest parser.
#[derive(thiserror::Error, Debug)]
pub enum DigestError {
    #[error("Invalid digest algorithm.")]
    InvalidAlgorithm,

    #[error("Invalid digest value.")]
    InvalidValue,
}

impl Digest {
    /// Original string to build this instance (`algorithm:hash_value`).
    pub fn source(&self) -> &str {
        &self.hash
    }

    pub fn hash_value(&self) -> &str {
        self.hash
            .split_once(':')
            .map(|(_, h)| h)
            .unwrap_or_default()
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Get the digest from the name of a content-addressed file.
    ///
    /// `docker save` writes the config as `<sha256>.json` in older
    /// versions, and as `blobs/sha256/<sha256>` in newer ones.
    ///
    /// Returns `None` if the file name is not a SHA256 value.
    pub fn from_file_name(path: &Path) -> Option<Digest> {
        let name = path.file_name()?.to_str()?;
        let name = name.strip_suffix(".json").unwrap_or(name);
        Digest::try_from(format!("sha256:{name}")).ok()
    }

    /// Compute the digest of `data`, and compare it with the expected one.
    ///
    /// On mismatch, returns the computed value as a hex string.
    pub fn verify(&self, data: &[u8]) -> Result<(), String> {
        let actual = match self.algorithm {
            DigestAlgorithm::SHA256 => HexString(sha2::Sha256::digest(data)).to_string(),
            DigestAlgorithm::SHA512 => HexString(sha2::Sha512::digest(data)).to_string(),
        };

        if actual.eq_ignore_ascii_case(self.hash_value()) {
            Ok(())
        } else {
            Err(actual)
        }
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(hash: String) -> Result<Self, Self::Error> {
        let (algorithm, value, expected_size) = {
            if let Some(h) = hash.strip_prefix("sha256:") {
                (DigestAlgorithm::SHA256, h, 256 / 8 * 2)
            } else if let Some(h) = hash.strip_prefix("sha512:") {
                (DigestAlgorithm::SHA512, h, 512 / 8 * 2)
            } else {
                return Err(DigestError::InvalidAlgorithm);
            }
        };

        // Validate that the hash value is a string with the expected length,
        // and it only contains hexadecimal digits.
        if value.len() == expected_size && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Digest { hash, algorithm })
        } else {
            Err(DigestError::InvalidValue)
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

/// Encode a byte buffer as hex string.
pub(crate) struct HexString<T>(pub T);

impl<T: AsRef<[u8]>> fmt::Display for HexString<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0
            .as_ref()
            .iter()
            .try_for_each(|byte| write!(f, "{:02x}", byte))
    }
}

#[test]
fn encode_hex_bytes() {
    assert_eq!(HexString(b"\x01\x20\xf0").to_string(), "0120f0");
}

#[test]
fn verify_content() {
    /// Digest for `abc`
    const DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    let digest = Digest::try_from(format!("sha256:{DIGEST}")).unwrap();

    assert!(digest.verify(b"abc").is_ok());

    let actual = digest.verify(b"abcx").unwrap_err();
    assert_eq!(
        actual,
        "7571ce1f8e21c6b13dd7ec2c5ec7c9e4dd9852e209869511853f2f1f74b17927"
    );
}

#[test]
fn digest_from_file_names() {
    const HASH: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    for name in [
        format!("{HASH}.json"),
        format!("/root/blobs/sha256/{HASH}"),
    ] {
        let digest = Digest::from_file_name(Path::new(&name)).unwrap();
        assert_eq!(digest.hash_value(), HASH);
    }

    for name in ["config.json", "abc.json", "/root/blobs/sha256/00ff"] {
        assert!(Digest::from_file_name(Path::new(name)).is_none());
    }
}

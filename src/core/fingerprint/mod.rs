//! # Fingerprint Module
//!
//! Computes content fingerprints for cached images.
//!
//! A fingerprint is the lowercase hex SHA-256 digest of the raw image bytes.
//! Two downloads with byte-identical content always produce the same
//! fingerprint, which makes it the deduplication key of the cache.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Length of a hex-encoded SHA-256 digest
pub const FINGERPRINT_HEX_LEN: usize = 64;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hex-encoded SHA-256 digest of an image's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint of an in-memory buffer
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    /// Fingerprint of a file on disk, streamed in fixed-size chunks
    pub fn of_file(path: &Path) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(Self(format!("{:x}", hasher.finalize())))
    }

    /// The full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters, used to disambiguate file names
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

/// Compute the fingerprint of raw image bytes
pub fn fingerprint(bytes: &[u8]) -> Fingerprint {
    Fingerprint::of(bytes)
}

/// Error returned when text is not a valid fingerprint
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid fingerprint {value:?}: expected 64 lowercase hex characters")]
pub struct ParseFingerprintError {
    value: String,
}

impl FromStr for Fingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == FINGERPRINT_HEX_LEN
            && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(ParseFingerprintError {
                value: s.to_string(),
            })
        }
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = ParseFingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Fingerprint> for String {
    fn from(fp: Fingerprint) -> Self {
        fp.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn known_digest_of_empty_input() {
        let fp = fingerprint(b"");
        assert_eq!(
            fp.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn same_bytes_same_fingerprint() {
        let a = fingerprint(b"andromeda");
        let b = fingerprint(b"andromeda");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), FINGERPRINT_HEX_LEN);
    }

    #[test]
    fn different_bytes_different_fingerprint() {
        assert_ne!(fingerprint(b"andromeda"), fingerprint(b"andromedb"));
    }

    #[test]
    fn file_fingerprint_matches_buffer() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let from_file = Fingerprint::of_file(file.path()).unwrap();
        assert_eq!(from_file, fingerprint(&data));
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!("abc".parse::<Fingerprint>().is_err());
        assert!("Z".repeat(64).parse::<Fingerprint>().is_err());
        assert!("AB".repeat(32).parse::<Fingerprint>().is_err());

        let fp = fingerprint(b"m31");
        let parsed: Fingerprint = fp.as_str().parse().unwrap();
        assert_eq!(parsed, fp);
    }

    #[test]
    fn short_prefix() {
        let fp = fingerprint(b"");
        assert_eq!(fp.short(12), "e3b0c44298fc");
        assert_eq!(fp.short(100).len(), FINGERPRINT_HEX_LEN);
    }
}

//! Artifact checksums
//!
//! [`Checksum`] is the Blake3 digest of a stored document. It is recorded in
//! the activity log and lets the local backend skip identical rewrites.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Blake3 digest of artifact bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Digest of `data`
    #[inline]
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 16 hex chars, for log lines
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Whether `data` hashes to this checksum
    #[inline]
    #[must_use]
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::of(data) == *self
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChecksumError::InvalidLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl serde::Serialize for Checksum {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Checksum {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Checksum parse errors
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("checksum must be 32 bytes, got {0}")]
    InvalidLength(usize),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_bytes_same_checksum() {
        let a = Checksum::of(b"%PDF-1.5 lead");
        assert_eq!(a, Checksum::of(b"%PDF-1.5 lead"));
        assert_ne!(a, Checksum::of(b"%PDF-1.5 other"));
        assert!(a.matches(b"%PDF-1.5 lead"));
    }

    #[test]
    fn hex_roundtrip_and_short_prefix() {
        let sum = Checksum::of(b"doc");
        let text = sum.to_string();
        assert_eq!(text.len(), 64);
        assert!(text.starts_with(&sum.short()));
        assert_eq!(text.parse::<Checksum>().unwrap(), sum);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(matches!(
            "abcd".parse::<Checksum>(),
            Err(ChecksumError::InvalidLength(2))
        ));
        assert!(matches!(
            "zz".parse::<Checksum>(),
            Err(ChecksumError::HexDecode(_))
        ));
    }
}

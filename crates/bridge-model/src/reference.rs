//! Human-readable lead reference numbers

use crate::category::CategoryPrefix;
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Reference number in the persisted, externally visible form
/// `<PREFIX>-<YYYY>-<SEQ>` (sequence unpadded, starting at 1 per prefix/year)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceNumber {
    prefix: CategoryPrefix,
    year: i32,
    sequence: u64,
}

impl ReferenceNumber {
    /// Assemble a reference number from its parts
    #[inline]
    #[must_use]
    pub const fn new(prefix: CategoryPrefix, year: i32, sequence: u64) -> Self {
        Self {
            prefix,
            year,
            sequence,
        }
    }

    /// Category prefix
    #[inline]
    #[must_use]
    pub const fn prefix(&self) -> CategoryPrefix {
        self.prefix
    }

    /// Allocation year
    #[inline]
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Sequence within the prefix/year pair
    #[inline]
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Display for ReferenceNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:04}-{}", self.prefix, self.year, self.sequence)
    }
}

impl FromStr for ReferenceNumber {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ModelError::MalformedReference(s.to_string());

        let mut parts = s.splitn(3, '-');
        let (Some(prefix), Some(year), Some(sequence)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        if sequence.is_empty()
            || sequence.starts_with('0')
            || !sequence.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        if !prefix.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(malformed());
        }

        let prefix = CategoryPrefix::new(prefix).map_err(|_| malformed())?;
        let year = year.parse().map_err(|_| malformed())?;
        let sequence = sequence.parse().map_err(|_| malformed())?;
        Ok(Self::new(prefix, year, sequence))
    }
}

impl Serialize for ReferenceNumber {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReferenceNumber {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

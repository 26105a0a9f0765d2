//! Product category tags

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Two-letter uppercase prefix used in reference numbers (e.g. `LI`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CategoryPrefix([u8; 2]);

impl CategoryPrefix {
    /// Create prefix from a two-letter string
    ///
    /// # Errors
    /// Returns `ModelError::InvalidPrefix` unless `s` is exactly two ASCII letters
    pub fn new(s: &str) -> Result<Self, ModelError> {
        match s.as_bytes() {
            [a, b] if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() => {
                Ok(Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()]))
            }
            _ => Err(ModelError::InvalidPrefix(s.to_string())),
        }
    }

    /// Derive a prefix from a category display name
    ///
    /// Takes the initials of the first two words ("Life Insurance" -> `LI`).
    /// Single-word names fall back to their first two letters.
    ///
    /// # Errors
    /// Returns `ModelError::InvalidPrefix` if no two letters can be found
    pub fn derive(name: &str) -> Result<Self, ModelError> {
        let initials: String = name
            .split_whitespace()
            .take(2)
            .filter_map(|word| word.chars().next())
            .filter(char::is_ascii_alphabetic)
            .collect();
        if initials.len() == 2 {
            return Self::new(&initials);
        }

        let leading: String = name
            .chars()
            .filter(char::is_ascii_alphabetic)
            .take(2)
            .collect();
        Self::new(&leading).map_err(|_| ModelError::InvalidPrefix(name.to_string()))
    }

    /// Borrow as `&str`
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII letters by construction
        std::str::from_utf8(&self.0).unwrap_or("??")
    }
}

impl Display for CategoryPrefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CategoryPrefix {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for CategoryPrefix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CategoryPrefix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// A product category as seen by the intake pipeline
///
/// Supplied by the product catalog; determines the reference prefix and the
/// slug used in artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCategory {
    /// Stable catalog identifier (e.g. `life-insurance`)
    pub id: String,
    /// Display name (e.g. `Life Insurance`)
    pub name: String,
    /// Reference number prefix
    pub prefix: CategoryPrefix,
    /// Slug used in artifact file names
    pub slug: String,
}

impl ProductCategory {
    /// Create a category, deriving the prefix from its name
    ///
    /// # Errors
    /// Returns `ModelError::InvalidPrefix` if the name yields no usable prefix
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        let name = name.into();
        let prefix = CategoryPrefix::derive(&name)?;
        Ok(Self {
            slug: id.clone(),
            id,
            name,
            prefix,
        })
    }

    /// Override the derived prefix
    #[inline]
    #[must_use]
    pub fn with_prefix(mut self, prefix: CategoryPrefix) -> Self {
        self.prefix = prefix;
        self
    }

    /// Override the slug
    #[inline]
    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    /// Slug sanitised for file names: non-alphanumerics become `_`,
    /// capped at 20 characters
    #[must_use]
    pub fn file_slug(&self) -> String {
        self.slug
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(20)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_prefix_from_two_words() {
        assert_eq!(CategoryPrefix::derive("Life Insurance").unwrap().as_str(), "LI");
        assert_eq!(CategoryPrefix::derive("health insurance").unwrap().as_str(), "HI");
        assert_eq!(
            CategoryPrefix::derive("Motor/Bike Insurance").unwrap().as_str(),
            "MI"
        );
    }

    #[test]
    fn derive_prefix_single_word_falls_back() {
        assert_eq!(CategoryPrefix::derive("Loans").unwrap().as_str(), "LO");
    }

    #[test]
    fn derive_prefix_rejects_unusable_names() {
        assert!(CategoryPrefix::derive("7").is_err());
        assert!(CategoryPrefix::derive("").is_err());
    }

    #[test]
    fn prefix_rejects_wrong_length() {
        assert!(CategoryPrefix::new("L").is_err());
        assert!(CategoryPrefix::new("LIF").is_err());
        assert!(CategoryPrefix::new("L1").is_err());
        assert_eq!(CategoryPrefix::new("hi").unwrap().as_str(), "HI");
    }

    #[test]
    fn file_slug_sanitises_and_truncates() {
        let cat = ProductCategory::new("life-insurance", "Life Insurance").unwrap();
        assert_eq!(cat.file_slug(), "life_insurance");

        let long = cat.with_slug("comprehensive motor/bike insurance");
        assert_eq!(long.file_slug(), "comprehensive_motor_");
        assert_eq!(long.file_slug().len(), 20);
    }

    #[test]
    fn prefix_serde_is_a_plain_string() {
        let prefix = CategoryPrefix::new("CI").unwrap();
        assert_eq!(serde_json::to_string(&prefix).unwrap(), "\"CI\"");
        let back: CategoryPrefix = serde_json::from_str("\"ci\"").unwrap();
        assert_eq!(back, prefix);
        assert!(serde_json::from_str::<CategoryPrefix>("\"CIX\"").is_err());
    }
}

//! # Identity Newtypes
//!
//! [`NationalId`] is the ten-digit Iranian national code. It identifies a
//! [`User`](crate::user::User) (login name, JWT subject) and a
//! [`Person`](crate::user::Person) (dependent's national code). The format
//! is validated once, at construction, so every stored value is well-formed.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Ten-digit national identification code.
///
/// # Validation
///
/// - Exactly 10 characters
/// - ASCII digits only (no separators)
///
/// Serde goes through [`NationalId::new`], so deserializing an invalid code
/// fails instead of producing an unchecked value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NationalId(String);

impl NationalId {
    /// Expected number of digits.
    pub const LEN: usize = 10;

    /// Create a national id from a string value, validating format.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidNationalId`] if the trimmed value is
    /// not exactly ten ASCII digits.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.len() != Self::LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidNationalId(raw));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Access the ten-digit code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NationalId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NationalId> for String {
    fn from(id: NationalId) -> Self {
        id.0
    }
}

impl std::fmt::Display for NationalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for NationalId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_ten_digits() {
        let id = NationalId::new("0012345678").unwrap();
        assert_eq!(id.as_str(), "0012345678");
        assert_eq!(id.to_string(), "0012345678");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let id = NationalId::new("  1234567890 ").unwrap();
        assert_eq!(id.as_str(), "1234567890");
    }

    #[test]
    fn rejects_wrong_length_and_non_digits() {
        assert!(NationalId::new("").is_err());
        assert!(NationalId::new("123456789").is_err());
        assert!(NationalId::new("12345678901").is_err());
        assert!(NationalId::new("12345-6789").is_err());
        assert!(NationalId::new("۱۲۳۴۵۶۷۸۹۰").is_err());
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: NationalId = serde_json::from_str("\"1111111111\"").unwrap();
        assert_eq!(ok.as_str(), "1111111111");
        assert!(serde_json::from_str::<NationalId>("\"abc\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"1111111111\"");
    }

    proptest! {
        #[test]
        fn any_ten_digit_string_is_valid(s in "[0-9]{10}") {
            prop_assert!(NationalId::new(s).is_ok());
        }

        #[test]
        fn strings_with_a_letter_are_invalid(s in "[0-9]{0,9}[a-z][0-9]{0,9}") {
            prop_assert!(NationalId::new(s).is_err());
        }
    }
}

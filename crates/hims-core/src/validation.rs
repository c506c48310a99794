//! Field normalizers shared by every record type.
//!
//! Each helper trims its input, checks it, and returns the value that is
//! actually stored.

use crate::error::ValidationError;

/// Trim `value` and require `min..=max` characters (not bytes; names are
/// mostly Persian).
pub fn text(field: &'static str, value: &str, min: usize, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    let actual = trimmed.chars().count();
    if actual < min || actual > max {
        return Err(ValidationError::Length {
            field,
            min,
            max,
            actual,
        });
    }
    Ok(trimmed.to_string())
}

/// Optional free text: blank becomes `None`, otherwise capped at `max`.
pub fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => text(field, v, 1, max).map(Some),
    }
}

/// Eleven-digit phone number. Blank becomes `None`.
pub fn phone(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.len() == 11 && v.bytes().all(|b| b.is_ascii_digit()) => Ok(Some(v.to_string())),
        Some(v) => Err(ValidationError::InvalidPhone(v.to_string())),
    }
}

/// Email address with a lower-cased domain part. Blank becomes `None`.
///
/// The shape check is deliberately shallow: one `@`, a non-empty local part,
/// and a dotted domain without whitespace.
pub fn email(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    let v = match value.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(v) => v,
    };
    let invalid = || ValidationError::InvalidEmail(v.to_string());
    if v.chars().count() > 254 || v.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = v.rsplit_once('@').ok_or_else(invalid)?;
    if local.is_empty() || local.contains('@') {
        return Err(invalid());
    }
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }
    Ok(Some(format!("{local}@{}", domain.to_ascii_lowercase())))
}

/// Stored emails compare case-insensitively.
pub fn same_email(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_trims_and_counts_chars() {
        assert_eq!(text("first_name", "  علی ", 2, 100).unwrap(), "علی");
        assert!(text("first_name", "a", 2, 100).is_err());
        assert!(text("first_name", &"x".repeat(101), 2, 100).is_err());
    }

    #[test]
    fn optional_text_blank_is_none() {
        assert_eq!(optional_text("address", Some("   "), 10).unwrap(), None);
        assert_eq!(optional_text("address", None, 10).unwrap(), None);
        assert_eq!(
            optional_text("address", Some(" x "), 10).unwrap().as_deref(),
            Some("x")
        );
    }

    #[test]
    fn phone_requires_eleven_digits() {
        assert_eq!(phone(Some("09121234567")).unwrap().as_deref(), Some("09121234567"));
        assert_eq!(phone(Some("")).unwrap(), None);
        assert!(phone(Some("0912123456")).is_err());
        assert!(phone(Some("0912-123-4567")).is_err());
    }

    #[test]
    fn email_lowercases_domain_only() {
        assert_eq!(
            email(Some("Ali.Rezaei@Example.COM")).unwrap().as_deref(),
            Some("Ali.Rezaei@example.com")
        );
    }

    #[test]
    fn email_rejects_malformed() {
        for bad in ["plain", "@example.com", "a@b", "a@.com", "a b@example.com", "a@b..com"] {
            assert!(email(Some(bad)).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn same_email_ignores_case() {
        assert!(same_email("A@x.ir", "a@X.IR"));
        assert!(!same_email("a@x.ir", "b@x.ir"));
    }
}

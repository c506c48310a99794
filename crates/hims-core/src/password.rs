//! Password hashing (Argon2id, PHC string format).

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::OnceLock;

use argon2::Argon2;
use rand_core::{OsRng, RngCore};

use crate::error::{HimsError, ValidationError};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Alphabet for generated temporary passwords. Visually ambiguous
/// characters (0/O, 1/l/I) are left out.
const TEMP_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

/// Reject passwords shorter than [`MIN_PASSWORD_LEN`].
pub fn check_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, HimsError> {
    check_strength(password)?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| HimsError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC string. A malformed stored hash
/// never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a valid PHC string");
            false
        }
    }
}

/// Hash of a random secret nobody knows. Logins naming an unknown account
/// verify against it so they cost the same Argon2 work as a wrong password.
pub fn decoy_hash() -> &'static str {
    static DECOY: OnceLock<String> = OnceLock::new();
    DECOY.get_or_init(|| {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(&secret, &salt)
            .map(|hash| hash.to_string())
            .unwrap_or_default()
    })
}

/// Random password for administrator-initiated resets.
pub fn generate_temporary(len: usize) -> String {
    let len = len.max(MIN_PASSWORD_LEN);
    let mut rng = OsRng;
    (0..len)
        .map(|_| {
            let idx = (rng.next_u32() as usize) % TEMP_ALPHABET.len();
            TEMP_ALPHABET[idx] as char
        })
        .collect()
}

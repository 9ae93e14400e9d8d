//! Password Encoding
//!
//! The session core never sees passwords; host applications verify
//! credentials before calling `login`. This module provides the
//! [`PasswordEncoder`] seam they use for that, with an Argon2id default.
//!
//! ## Security Features
//! - Memory-hard hashing (Argon2id, OWASP default parameters)
//! - Unicode NFKC normalization before hashing
//! - Optional application-wide pepper, zeroized on drop

use std::fmt;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Password encoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordEncodeError {
    /// Password is empty or whitespace only
    #[error("Password cannot be empty or contain only whitespace")]
    Empty,

    /// Hashing failed
    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Encodes raw passwords and verifies raw passwords against stored encodings.
pub trait PasswordEncoder: Send + Sync {
    /// Encode a raw password into a storable string.
    fn encode(&self, raw: &str) -> Result<String, PasswordEncodeError>;

    /// Check a raw password against a previously encoded value.
    ///
    /// Malformed encodings never match.
    fn matches(&self, raw: &str, encoded: &str) -> bool;
}

/// Application-wide secret mixed into every hash
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
struct Pepper(Vec<u8>);

/// Argon2id encoder producing PHC strings
#[derive(Clone, Default)]
pub struct Argon2PasswordEncoder {
    pepper: Option<Pepper>,
}

impl Argon2PasswordEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an application-wide pepper (must be identical for encode and match)
    pub fn with_pepper(pepper: impl Into<Vec<u8>>) -> Self {
        Self {
            pepper: Some(Pepper(pepper.into())),
        }
    }

    fn material(&self, raw: &str) -> Vec<u8> {
        // NFKC so visually identical input hashes identically
        let normalized: String = raw.nfkc().collect();
        let mut bytes = normalized.into_bytes();
        if let Some(pepper) = &self.pepper {
            bytes.extend_from_slice(&pepper.0);
        }
        bytes
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw: &str) -> Result<String, PasswordEncodeError> {
        if raw.trim().is_empty() {
            return Err(PasswordEncodeError::Empty);
        }

        let mut material = self.material(raw);
        let salt = SaltString::generate(OsRng);
        let hashed = Argon2::default()
            .hash_password(&material, &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordEncodeError::HashingFailed(e.to_string()));
        material.zeroize();
        hashed
    }

    fn matches(&self, raw: &str, encoded: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(encoded) else {
            return false;
        };

        let mut material = self.material(raw);
        // Argon2 compares in constant time
        let ok = Argon2::default().verify_password(&material, &parsed).is_ok();
        material.zeroize();
        ok
    }
}

impl fmt::Debug for Argon2PasswordEncoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Argon2PasswordEncoder")
            .field("pepper", &self.pepper.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_and_match() {
        let encoder = Argon2PasswordEncoder::new();
        let encoded = encoder.encode("aaaaaa").unwrap();

        assert!(encoded.starts_with("$argon2id$"));
        assert!(encoder.matches("aaaaaa", &encoded));
        assert!(!encoder.matches("bbbbbb", &encoded));
    }

    #[test]
    fn test_salt_differs_per_encode() {
        let encoder = Argon2PasswordEncoder::new();
        let first = encoder.encode("same-password").unwrap();
        let second = encoder.encode("same-password").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_pepper_must_match() {
        let peppered = Argon2PasswordEncoder::with_pepper(b"server-secret".to_vec());
        let encoded = peppered.encode("hunter2").unwrap();

        assert!(peppered.matches("hunter2", &encoded));
        assert!(!Argon2PasswordEncoder::new().matches("hunter2", &encoded));
    }

    #[test]
    fn test_nfkc_equivalent_input_matches() {
        let encoder = Argon2PasswordEncoder::new();
        // Fullwidth "ＡＢＣ" normalizes to "ABC"
        let encoded = encoder.encode("\u{FF21}\u{FF22}\u{FF23}123").unwrap();
        assert!(encoder.matches("ABC123", &encoded));
    }

    #[test]
    fn test_rejects_empty_and_malformed() {
        let encoder = Argon2PasswordEncoder::new();
        assert_eq!(encoder.encode("   "), Err(PasswordEncodeError::Empty));
        assert!(!encoder.matches("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_debug_redacts_pepper() {
        let encoder = Argon2PasswordEncoder::with_pepper(b"secret".to_vec());
        let debug = format!("{:?}", encoder);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("secret"));
    }
}

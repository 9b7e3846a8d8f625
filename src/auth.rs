//! Authentication contract plus the credential rules and password hashing
//! used by the local account store.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use async_trait::async_trait;
use rand::rngs::OsRng;

use crate::error::AuthError;
use crate::models::User;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Source of the signed-in user.
///
/// Callers resolve the user once and pass its id explicitly to list,
/// dashboard and form operations.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> Result<Option<User>, AuthError>;

    /// Creates an account and signs it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Trims and lowercases an address, rejecting anything that does not look
/// like `local@domain.tld`.
pub fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidEmail(email))
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword { min: MIN_PASSWORD_LEN });
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(plain: &str, hashed: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hashed).map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_valid_addresses() {
        assert_eq!(normalize_email("  Jane@Example.COM ").unwrap(), "jane@example.com");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for bad in ["", "jane", "@example.com", "jane@", "jane@example", "ja ne@example.com", "a@b@c.com"] {
            assert!(
                matches!(normalize_email(bad), Err(AuthError::InvalidEmail(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn short_passwords_are_weak() {
        assert!(matches!(validate_password("12345"), Err(AuthError::WeakPassword { min: 6 })));
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("hunter22").unwrap();
        assert_ne!(hash, "hunter22");
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(verify_password("x", "not-a-hash"), Err(AuthError::Hash(_))));
    }
}

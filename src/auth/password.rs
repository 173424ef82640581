use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::errors::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;
/// Upper bound keeps argon2 work per request predictable.
pub const MAX_PASSWORD_LEN: usize = 128;

/// Length policy for passwords chosen at registration or profile update.
pub fn check_policy(plain: &str) -> Result<(), AppError> {
    let len = plain.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::invalid(format!(
            "password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Applies the policy, then hashes.
pub fn hash_new_password(plain: &str) -> Result<String, AppError> {
    check_policy(plain)?;
    Ok(hash_password(plain)?)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash failed");
            anyhow::anyhow!("password hashing failed: {e}")
        })
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash is unreadable.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow::anyhow!("malformed password hash: {e}")
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = hash_new_password("Secur3P@ssw0rd!").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Secur3P@ssw0rd!", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("repeatable-secret").unwrap();
        let b = hash_password("repeatable-secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn policy_bounds_length_in_characters() {
        assert!(check_policy("1234567").is_err());
        assert!(check_policy("12345678").is_ok());
        // eight multi-byte characters still count as eight
        assert!(check_policy("비밀번호비밀번호").is_ok());
        assert!(matches!(
            hash_new_password(&"x".repeat(MAX_PASSWORD_LEN + 1)),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        assert!(verify_password("anything", "not-a-valid-hash").is_err());
    }
}

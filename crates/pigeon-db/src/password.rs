use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};

use crate::{DbError, Result};

/// Hash compared against when the username does not exist, so an unknown
/// user costs the same Argon2 work as a wrong password.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash("pigeon-dummy-password").ok());

/// Hash a password with Argon2id and a fresh random salt (PHC string format).
pub fn hash(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| DbError::PasswordHash(e.to_string()))
}

/// Check `password` against a stored PHC hash. A mismatch is `Ok(false)`; a
/// hash that cannot be parsed is an error.
pub fn verify(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| DbError::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Burn one verification's worth of time without a real hash.
pub(crate) fn verify_dummy(password: &str) {
    if let Some(stored) = DUMMY_HASH.as_deref() {
        let _ = verify(password, stored);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_verifies() {
        let a = hash("hunter22").unwrap();
        let b = hash("hunter22").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(!a.contains("hunter22"));

        assert!(verify("hunter22", &a).unwrap());
        assert!(verify("hunter22", &b).unwrap());
        assert!(!verify("hunter23", &a).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(matches!(
            verify("anything", "not-a-phc-string"),
            Err(DbError::PasswordHash(_))
        ));
    }
}

use thiserror::Error;

use crate::config;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Failed to hash password")]
    Hash,
    #[error("Failed to verify password")]
    Verify,
    #[error("La contrasena debe tener al menos {0} caracteres")]
    TooShort(usize),
}

const MIN_PASSWORD_LEN: usize = 8;

/// Reject passwords the admin panel would not accept
pub fn validate_strength(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordError::TooShort(MIN_PASSWORD_LEN));
    }
    Ok(())
}

/// Hash a password using bcrypt at the configured cost
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    bcrypt::hash(password, config::config().security.bcrypt_cost).map_err(|_| PasswordError::Hash)
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    bcrypt::verify(password, hash).map_err(|_| PasswordError::Verify)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "cambiame-pronto";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("otra-cosa", &hash).unwrap());
    }

    #[test]
    fn short_passwords_rejected() {
        assert!(validate_strength("corta").is_err());
        assert!(validate_strength("suficiente").is_ok());
    }
}

//! Password-reset tokens. Only a SHA-256 digest of the token is persisted;
//! the plaintext exists once, in the reset message sent to the user.

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256};

/// Generate a fresh reset token (32 random bytes, hex-encoded)
pub fn generate_token() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes)?;
    Ok(HEXLOWER.encode(&bytes))
}

/// Digest stored in `users.reset_token_hash`
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    HEXLOWER.encode(&hasher.finalize())
}

/// Compare a submitted token against the stored digest without leaking the
/// match position
pub fn verify_token(token: &str, stored_digest: &str) -> bool {
    let candidate = token_digest(token);
    if candidate.len() != stored_digest.len() {
        return false;
    }
    candidate
        .bytes()
        .zip(stored_digest.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_verifies_against_own_digest() {
        let token = generate_token().unwrap();
        let digest = token_digest(&token);
        assert!(verify_token(&token, &digest));
        assert!(!verify_token("otra-cosa", &digest));
    }

    #[test]
    fn tokens_are_unique_and_hex() {
        let a = generate_token().unwrap();
        let b = generate_token().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
    }
}

//! One-time verification tokens.
//!
//! The plaintext is mailed to the user exactly once; only its SHA-256 hex
//! digest is stored, so a leaked `users` table cannot be used to verify
//! accounts.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of a generated token (alphanumeric characters).
pub const TOKEN_LENGTH: usize = 48;

pub struct GeneratedToken {
    pub plaintext: String,
    pub hash: String,
}

/// Generate a random verification token and its storage hash.
pub fn generate_verification_token() -> GeneratedToken {
    let plaintext: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();
    let hash = hash_token(&plaintext);
    GeneratedToken { plaintext, hash }
}

/// SHA-256 hex digest of a token.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_shape() {
        let token = generate_verification_token();
        assert_eq!(token.plaintext.len(), TOKEN_LENGTH);
        assert!(token.plaintext.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(token.hash.len(), 64);
    }

    #[test]
    fn hash_is_stable() {
        let token = generate_verification_token();
        assert_eq!(hash_token(&token.plaintext), token.hash);
    }

    #[test]
    fn tokens_differ() {
        let a = generate_verification_token();
        let b = generate_verification_token();
        assert_ne!(a.plaintext, b.plaintext);
    }
}

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordVerifier, SaltString, rand_core::OsRng},
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed")]
    HashingFailed,

    #[error("password cannot be empty")]
    Empty,
}

/// Password hashing port.
///
/// The primitive choice is a collaborator concern; components only depend on
/// this trait. Hashes are self-describing PHC strings, so the verifier does
/// not need to know which parameters produced them.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, PasswordError>;
    fn verify(&self, plain: &str, hash: &str) -> bool;
}

/// Argon2id implementation with default parameters.
#[derive(Debug, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        if plain.is_empty() {
            return Err(PasswordError::Empty);
        }
        let salt = SaltString::generate(&mut OsRng);
        argon2::PasswordHasher::hash_password(&Argon2::default(), plain.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|_| PasswordError::HashingFailed)
    }

    fn verify(&self, plain: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

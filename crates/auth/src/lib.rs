//! `tribunal-auth` — bearer-credential service (zero-trust).
//!
//! This crate is intentionally decoupled from HTTP and storage: it issues,
//! validates and refreshes signed identity tokens, and hashes/verifies
//! password credentials. Authorization decisions over stored entities live
//! in `tribunal-directory`.

pub mod claims;
pub mod password;
pub mod token;

pub use claims::{Claims, TokenError, validate_window};
pub use password::{Argon2Hasher, PasswordError, PasswordHasher};
pub use token::{CredentialService, IssuedToken, TokenConfig, TokenPrincipal};

//! Password hashing and invitation tokens.
//!
//! bcrypt is CPU-bound, so hashing and verification run on the blocking pool.
//! Invitation tokens are handed to the user in plain form and stored only as
//! a SHA-256 hex digest.

use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, CredentialError> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hashed)
}

/// `Ok(false)` for a wrong password. A malformed stored hash is an error.
pub async fn verify_password(password: String, hash: String) -> Result<bool, CredentialError> {
    let ok = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(ok)
}

/// A fresh invitation: the plain token for the user and the digest to store.
#[derive(Debug, Clone)]
pub struct Invitation {
    pub token: String,
    pub token_hash: String,
}

impl Invitation {
    pub fn generate() -> Self {
        let token = Uuid::new_v4().to_string();
        let token_hash = hash_token(&token);
        Self { token, token_hash }
    }
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

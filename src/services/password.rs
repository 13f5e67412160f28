// src/services/password.rs

use async_trait::async_trait;
use bcrypt::{hash, verify};

use crate::common::error::AppError;

/// One-way password hash primitive.
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String, AppError>;

    async fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AppError>;
}

#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

#[async_trait]
impl PasswordHasher for BcryptHasher {
    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_owned();
        let cost = self.cost;

        // bcrypt is CPU-bound; keep it off the async workers
        let hashed = tokio::task::spawn_blocking(move || hash(&password, cost))
            .await
            .map_err(|e| anyhow::anyhow!("hashing task failed: {}", e))??;

        Ok(hashed)
    }

    async fn verify(&self, password: &str, password_hash: &str) -> Result<bool, AppError> {
        let password = password.to_owned();
        let password_hash = password_hash.to_owned();

        let is_valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
            .await
            .map_err(|e| anyhow::anyhow!("password verification task failed: {}", e))??;

        Ok(is_valid)
    }
}

// src/services/notifier.rs

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("email could not be delivered: {0}")]
    Delivery(String),
}

/// Outbound message dispatch. Both calls either deliver or fail; there is
/// no partial state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_email(&self, email: &str, link: &str) -> Result<(), NotifierError>;

    async fn send_password_reset_email(&self, email: &str, link: &str)
        -> Result<(), NotifierError>;
}

/// Records dispatches in the log instead of delivering them. Used until a
/// real mail transport is wired in front of the service.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification_email(&self, email: &str, link: &str) -> Result<(), NotifierError> {
        tracing::info!(to = %email, "📧 verification email dispatched");
        tracing::debug!(%link, "verification link");
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        email: &str,
        link: &str,
    ) -> Result<(), NotifierError> {
        tracing::info!(to = %email, "📧 password reset email dispatched");
        tracing::debug!(%link, "password reset link");
        Ok(())
    }
}

// src/services/account_service.rs

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::AccountRepository,
    models::{
        auth::{
            normalize_email, CheckVerificationQuery, ForgotPasswordPayload, NewAdminUser,
            RegisterTenantPayload, RegistrationOutcome, ResetPasswordPayload, VerificationOutcome,
        },
        tenancy::NewTenant,
    },
    services::{
        links::{Links, LOGIN_PATH},
        notifier::Notifier,
        password::PasswordHasher,
        token_service::{is_live, log_prefix, TokenIssuer, TokenPurpose},
    },
};

/// Tenant + admin account lifecycle: registration, email verification,
/// password reset.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
    notifier: Arc<dyn Notifier>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: TokenIssuer,
    links: Links,
}

impl AccountService {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        notifier: Arc<dyn Notifier>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: TokenIssuer,
        links: Links,
    ) -> Self {
        Self {
            repo,
            notifier,
            hasher,
            tokens,
            links,
        }
    }

    /// Creates a pending tenant and its unverified admin, then sends the
    /// verification email. A failed send does not undo the registration; it
    /// is reported through `verification_email_sent`.
    pub async fn register(
        &self,
        mut payload: RegisterTenantPayload,
    ) -> Result<RegistrationOutcome, AppError> {
        // 1. Normalize, then validate every field
        payload.company_email = normalize_email(&payload.company_email);
        payload.company_name = payload.company_name.trim().to_string();
        payload.subdomain = payload.subdomain.trim().to_string();
        payload.validate()?;

        // 2. Exclusive existence check, email before subdomain
        let existing = self
            .repo
            .find_tenant_by_email_or_subdomain(&payload.company_email, &payload.subdomain)
            .await?;

        if existing
            .iter()
            .any(|t| t.company_email == payload.company_email)
        {
            return Err(AppError::EmailAlreadyExists);
        }
        if existing.iter().any(|t| t.subdomain == payload.subdomain) {
            return Err(AppError::SubdomainAlreadyTaken);
        }

        let login_url = self
            .links
            .tenant_url(&payload.subdomain, LOGIN_PATH)
            .map_err(|e| anyhow::anyhow!("no login URL for subdomain {}: {}", payload.subdomain, e))?;

        // 3. Hash + token, both outside the write
        let password_hash = self.hasher.hash(&payload.password).await?;
        let token = self.tokens.issue(TokenPurpose::Verification);

        // 4. Tenant and admin in one unit
        let (tenant, user) = self
            .repo
            .create_tenant_and_admin(
                NewTenant {
                    id: Uuid::new_v4(),
                    company_name: payload.company_name,
                    company_email: payload.company_email.clone(),
                    subdomain: payload.subdomain,
                    number_of_branches: payload.number_of_branches,
                },
                NewAdminUser {
                    id: Uuid::new_v4(),
                    email: payload.company_email,
                    password_hash,
                    verification_token: token.value.clone(),
                    verification_expires: token.expires_at,
                },
            )
            .await?;

        tracing::info!(tenant_id = %tenant.id, subdomain = %tenant.subdomain, "tenant registered");

        // 5. Notify; the account stays created either way
        let link = self.links.verification_link(&token.value);
        let verification_email_sent = match self
            .notifier
            .send_verification_email(&user.email, &link)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant.id, "verification email not sent: {}", e);
                false
            }
        };

        Ok(RegistrationOutcome {
            tenant_id: tenant.id,
            email: user.email,
            login_url,
            subdomain: tenant.subdomain,
            verification_email_sent,
        })
    }

    /// Redeems a verification token. Redeeming the admin's token also
    /// activates the tenant.
    pub async fn verify_email(&self, token: &str) -> Result<VerificationOutcome, AppError> {
        if token.is_empty() {
            return Err(AppError::InvalidToken);
        }

        let (user, tenant) = self
            .repo
            .find_user_by_token(TokenPurpose::Verification, token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        // Expired tokens stay in place and nothing is mutated
        if !is_live(user.verification_expires, Utc::now()) {
            tracing::info!(token = log_prefix(token), "verification token expired");
            return Err(AppError::TokenExpired);
        }

        if user.is_verified {
            return Ok(VerificationOutcome {
                email: user.email,
                subdomain: tenant.subdomain,
                already_verified: true,
            });
        }

        if !self.repo.consume_verification(user.id, token).await? {
            // A concurrent redemption won, or the token lapsed since the lookup.
            // Report what is stored now, never a second first-time success.
            let current = self
                .repo
                .find_user_by_email_and_tenant(&user.email, tenant.id)
                .await?;

            return match current {
                Some(current) if current.is_verified => Ok(VerificationOutcome {
                    email: user.email,
                    subdomain: tenant.subdomain,
                    already_verified: true,
                }),
                Some(current)
                    if current.verification_token.as_deref() == Some(token)
                        && !is_live(current.verification_expires, Utc::now()) =>
                {
                    Err(AppError::TokenExpired)
                }
                _ => Err(AppError::InvalidToken),
            };
        }

        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "email verified");

        Ok(VerificationOutcome {
            email: user.email,
            subdomain: tenant.subdomain,
            already_verified: false,
        })
    }

    /// Issues a one-hour reset token and emails it. An unknown email and a
    /// failed send produce the same error; a failed send also revokes the
    /// token so no undelivered credential stays live.
    pub async fn request_password_reset(
        &self,
        mut payload: ForgotPasswordPayload,
    ) -> Result<(), AppError> {
        payload.email = normalize_email(&payload.email);
        payload.subdomain = payload.subdomain.trim().to_ascii_lowercase();
        payload.validate()?;

        let tenant = self
            .repo
            .find_tenant_by_subdomain(&payload.subdomain)
            .await?
            .ok_or(AppError::InvalidTenant)?;

        let Some(user) = self
            .repo
            .find_user_by_email_and_tenant(&payload.email, tenant.id)
            .await?
        else {
            tracing::info!(tenant_id = %tenant.id, "password reset requested for unknown email");
            return Err(AppError::PasswordResetUnavailable);
        };

        let token = self.tokens.issue(TokenPurpose::Reset);
        self.repo.store_token(user.id, &token).await?;

        let link = self.links.reset_link(&token.value);
        if let Err(e) = self
            .notifier
            .send_password_reset_email(&user.email, &link)
            .await
        {
            tracing::warn!(user_id = %user.id, "password reset email not sent, revoking token: {}", e);

            if let Err(clear_err) = self.repo.clear_token(user.id, &token).await {
                tracing::error!(user_id = %user.id, "failed to revoke undelivered reset token: {}", clear_err);
                return Err(clear_err);
            }
            return Err(AppError::PasswordResetUnavailable);
        }

        tracing::info!(user_id = %user.id, "password reset token issued");
        Ok(())
    }

    /// Redeems a reset token: new hash and token removal in one update.
    pub async fn reset_password(&self, payload: ResetPasswordPayload) -> Result<(), AppError> {
        payload.validate()?;

        let (user, _) = self
            .repo
            .find_user_by_token(TokenPurpose::Reset, &payload.token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !is_live(user.reset_token_expires, Utc::now()) {
            return Err(AppError::TokenExpired);
        }

        let password_hash = self.hasher.hash(&payload.password).await?;

        // The update rechecks expiry, so a token that lapsed while hashing is refused
        if !self
            .repo
            .consume_reset(user.id, &payload.token, &password_hash)
            .await?
        {
            let still_stored = self
                .repo
                .find_user_by_email_and_tenant(&user.email, user.tenant_id)
                .await?
                .is_some_and(|u| u.reset_token.as_deref() == Some(payload.token.as_str()));

            return Err(if still_stored {
                AppError::TokenExpired
            } else {
                AppError::InvalidToken
            });
        }

        tracing::info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Lets the registration page poll until the admin has verified.
    pub async fn check_verification(
        &self,
        mut query: CheckVerificationQuery,
    ) -> Result<bool, AppError> {
        query.email = normalize_email(&query.email);
        query.validate()?;

        let tenant = self
            .repo
            .find_tenant_by_subdomain(&query.subdomain.trim().to_ascii_lowercase())
            .await?
            .ok_or(AppError::InvalidTenant)?;

        let user = self
            .repo
            .find_user_by_email_and_tenant(&query.email, tenant.id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(user.is_verified)
    }
}

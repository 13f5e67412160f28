// src/services/auth.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use validator::Validate;

use crate::{
    common::error::AppError,
    db::AccountRepository,
    models::{
        auth::{normalize_email, Claims, LoginPayload, Role, SessionGrant, User},
        tenancy::{Tenant, TenantStatus},
    },
    services::password::PasswordHasher,
};

/// Authenticates tenant users and mints stateless, signed session
/// credentials. Expiry is the only way a session ends.
#[derive(Clone)]
pub struct SessionService {
    repo: Arc<dyn AccountRepository>,
    hasher: Arc<dyn PasswordHasher>,
    jwt_secret: String,
    ttl: Duration,
}

impl SessionService {
    pub fn new(
        repo: Arc<dyn AccountRepository>,
        hasher: Arc<dyn PasswordHasher>,
        jwt_secret: String,
        ttl: Duration,
    ) -> Self {
        Self {
            repo,
            hasher,
            jwt_secret,
            ttl,
        }
    }

    /// `host_subdomain` is the tenant label of the request host; it is used
    /// when the payload does not name a subdomain.
    pub async fn authenticate(
        &self,
        mut payload: LoginPayload,
        host_subdomain: Option<&str>,
    ) -> Result<SessionGrant, AppError> {
        payload.email = normalize_email(&payload.email);
        payload.validate()?;

        // Same normalization as host-derived labels
        let subdomain = payload
            .subdomain
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or(host_subdomain)
            .map(str::to_ascii_lowercase)
            .ok_or(AppError::InvalidTenant)?;

        // 1. Tenant
        let tenant = self
            .repo
            .find_tenant_by_subdomain(&subdomain)
            .await?
            .ok_or(AppError::InvalidTenant)?;

        // 2. User; a miss is indistinguishable from a wrong password
        let user = self
            .repo
            .find_user_by_email_and_tenant(&payload.email, tenant.id)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // 3. Unverified accounts get their own error
        if !user.is_verified {
            return Err(AppError::EmailNotVerified);
        }

        // 4. Password
        if !self
            .hasher
            .verify(&payload.password, &user.password_hash)
            .await?
        {
            return Err(AppError::InvalidCredentials);
        }

        self.reconcile_tenant_status(&user, &tenant).await?;

        let token = self.create_token(&user)?;
        tracing::info!(user_id = %user.id, tenant_id = %tenant.id, "session issued");

        Ok(SessionGrant {
            token,
            user: (&user).into(),
            tenant: (&tenant).into(),
        })
    }

    /// Checks signature and expiry; every protected request goes through here.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_ref()),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!("session rejected: {}", e);
            AppError::InvalidSession
        })?;

        Ok(token_data.claims)
    }

    fn create_token(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: user.id,
            tenant_id: user.tenant_id,
            role: user.role,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )?)
    }

    // A verified admin implies an active tenant. Repairs tenants left
    // pending by a verification that predates atomic activation.
    async fn reconcile_tenant_status(&self, user: &User, tenant: &Tenant) -> Result<(), AppError> {
        if user.role == Role::Admin && tenant.status == TenantStatus::Pending {
            tracing::warn!(tenant_id = %tenant.id, "verified admin on pending tenant, activating");
            self.repo
                .update_tenant_status(tenant.id, TenantStatus::Active)
                .await?;
        }
        Ok(())
    }
}

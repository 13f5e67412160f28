// src/db/account_repo.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::map_tenant_insert_error, error::AppError},
    models::{
        auth::{NewAdminUser, Role, User},
        tenancy::{NewTenant, Tenant, TenantStatus},
    },
    services::token_service::{IssuedToken, TokenPurpose},
};

/// Persistence contract for tenants and their users.
///
/// Every method that touches more than one field or more than one row runs
/// behind a transaction. Token redemption (`consume_*`) is a conditional
/// update on the token value, so it can succeed at most once per token no
/// matter how many instances race on it.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, AppError>;

    /// Every tenant whose company email OR subdomain matches.
    async fn find_tenant_by_email_or_subdomain(
        &self,
        company_email: &str,
        subdomain: &str,
    ) -> Result<Vec<Tenant>, AppError>;

    /// Writes the pending tenant and its unverified admin together, or neither.
    async fn create_tenant_and_admin(
        &self,
        tenant: NewTenant,
        admin: NewAdminUser,
    ) -> Result<(Tenant, User), AppError>;

    async fn update_tenant_status(
        &self,
        tenant_id: Uuid,
        status: TenantStatus,
    ) -> Result<(), AppError>;

    async fn find_user_by_email_and_tenant(
        &self,
        email: &str,
        tenant_id: Uuid,
    ) -> Result<Option<User>, AppError>;

    /// Exact, case-sensitive match on the field that holds `purpose` tokens.
    async fn find_user_by_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<(User, Tenant)>, AppError>;

    /// Replaces whatever token of the same purpose the user held.
    async fn store_token(&self, user_id: Uuid, token: &IssuedToken) -> Result<(), AppError>;

    /// Nulls the token and its expiry, but only while `token` is still the
    /// stored one.
    async fn clear_token(&self, user_id: Uuid, token: &IssuedToken) -> Result<(), AppError>;

    /// Marks the user verified and nulls the verification token; an admin's
    /// tenant becomes active in the same unit. Returns `false` when the token
    /// no longer matches (already consumed) or has expired in the meantime.
    async fn consume_verification(&self, user_id: Uuid, token: &str) -> Result<bool, AppError>;

    /// Replaces the password hash and nulls the reset token together.
    /// Returns `false` when the token no longer matches or has expired.
    async fn consume_reset(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, AppError>;
}

const TENANT_COLUMNS: &str = "id, company_name, company_email, subdomain, number_of_branches, \
     status, created_at, updated_at";

const USER_COLUMNS: &str = "id, tenant_id, email, password_hash, role, is_verified, \
     verification_token, verification_expires, reset_token, reset_token_expires, \
     created_at, updated_at";

// The token column pair each purpose occupies.
fn token_columns(purpose: TokenPurpose) -> (&'static str, &'static str) {
    match purpose {
        TokenPurpose::Verification => ("verification_token", "verification_expires"),
        TokenPurpose::Reset => ("reset_token", "reset_token_expires"),
    }
}

#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE subdomain = $1"
        ))
        .bind(subdomain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn find_tenant_by_email_or_subdomain(
        &self,
        company_email: &str,
        subdomain: &str,
    ) -> Result<Vec<Tenant>, AppError> {
        let tenants = sqlx::query_as::<_, Tenant>(&format!(
            "SELECT {TENANT_COLUMNS} FROM tenants WHERE company_email = $1 OR subdomain = $2"
        ))
        .bind(company_email)
        .bind(subdomain)
        .fetch_all(&self.pool)
        .await?;

        Ok(tenants)
    }

    async fn create_tenant_and_admin(
        &self,
        tenant: NewTenant,
        admin: NewAdminUser,
    ) -> Result<(Tenant, User), AppError> {
        // Dropping `tx` on any early return rolls both inserts back
        let mut tx = self.pool.begin().await?;

        let created_tenant = sqlx::query_as::<_, Tenant>(&format!(
            r#"
            INSERT INTO tenants (id, company_name, company_email, subdomain, number_of_branches, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TENANT_COLUMNS}
            "#
        ))
        .bind(tenant.id)
        .bind(&tenant.company_name)
        .bind(&tenant.company_email)
        .bind(&tenant.subdomain)
        .bind(tenant.number_of_branches)
        .bind(TenantStatus::Pending)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_tenant_insert_error)?;

        let created_user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                id, tenant_id, email, password_hash, role, is_verified,
                verification_token, verification_expires
            )
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(admin.id)
        .bind(created_tenant.id)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(Role::Admin)
        .bind(&admin.verification_token)
        .bind(admin.verification_expires)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((created_tenant, created_user))
    }

    async fn update_tenant_status(
        &self,
        tenant_id: Uuid,
        status: TenantStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE tenants SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(tenant_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_user_by_email_and_tenant(
        &self,
        email: &str,
        tenant_id: Uuid,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND tenant_id = $2"
        ))
        .bind(email)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_user_by_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<(User, Tenant)>, AppError> {
        let (token_column, _) = token_columns(purpose);

        let Some(user) = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {token_column} = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        // tenant_id is a non-null foreign key, so a miss here is corruption
        let tenant = self
            .find_tenant_by_id(user.tenant_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} references a missing tenant", user.id))?;

        Ok(Some((user, tenant)))
    }

    async fn store_token(&self, user_id: Uuid, token: &IssuedToken) -> Result<(), AppError> {
        let (token_column, expires_column) = token_columns(token.purpose);

        sqlx::query(&format!(
            "UPDATE users SET {token_column} = $2, {expires_column} = $3, updated_at = NOW() \
             WHERE id = $1"
        ))
        .bind(user_id)
        .bind(&token.value)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_token(&self, user_id: Uuid, token: &IssuedToken) -> Result<(), AppError> {
        let (token_column, expires_column) = token_columns(token.purpose);

        sqlx::query(&format!(
            "UPDATE users SET {token_column} = NULL, {expires_column} = NULL, updated_at = NOW() \
             WHERE id = $1 AND {token_column} = $2"
        ))
        .bind(user_id)
        .bind(&token.value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn consume_verification(&self, user_id: Uuid, token: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Conditional update: only the first redemption still matches
        let consumed: Option<(Uuid, Role)> = sqlx::query_as(
            r#"
            UPDATE users
            SET is_verified = TRUE,
                verification_token = NULL,
                verification_expires = NULL,
                updated_at = NOW()
            WHERE id = $1
              AND verification_token = $2
              AND verification_expires > NOW()
              AND is_verified = FALSE
            RETURNING tenant_id, role
            "#,
        )
        .bind(user_id)
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((tenant_id, role)) = consumed else {
            return Ok(false);
        };

        // 2. The admin's verification activates the tenant, same transaction
        if role == Role::Admin {
            sqlx::query("UPDATE tenants SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(tenant_id)
                .bind(TenantStatus::Active)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(true)
    }

    async fn consume_reset(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3,
                reset_token = NULL,
                reset_token_expires = NULL,
                updated_at = NOW()
            WHERE id = $1 AND reset_token = $2 AND reset_token_expires > NOW()
            "#,
        )
        .bind(user_id)
        .bind(token)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

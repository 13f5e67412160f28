// src/db/memory_repo.rs

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AccountRepository,
    models::{
        auth::{NewAdminUser, Role, User},
        tenancy::{NewTenant, Tenant, TenantStatus},
    },
    services::token_service::{is_live, IssuedToken, TokenPurpose},
};

#[derive(Debug, Default)]
struct Tables {
    tenants: HashMap<Uuid, Tenant>,
    users: HashMap<Uuid, User>,
}

/// Mutex-backed repository with the same conditional semantics as the
/// Postgres one. Each method holds the lock for its whole body, which plays
/// the role of the transaction.
#[derive(Debug, Default)]
pub struct InMemoryAccountRepository {
    tables: Mutex<Tables>,
    fail_next_user_insert: AtomicBool,
    rival_consumes_next_verification: AtomicBool,
    tenant_activations: AtomicUsize,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes the next admin insert fail after the tenant row was staged.
    pub fn fail_next_user_insert(&self) {
        self.fail_next_user_insert.store(true, Ordering::SeqCst);
    }

    /// The next `consume_verification` finds its token already redeemed by
    /// another instance, as if that instance committed between lookup and
    /// update.
    pub fn rival_consumes_next_verification(&self) {
        self.rival_consumes_next_verification
            .store(true, Ordering::SeqCst);
    }

    /// How many times a verification moved a tenant to `active`.
    pub fn tenant_activations(&self) -> usize {
        self.tenant_activations.load(Ordering::SeqCst)
    }

    pub fn tenant_count(&self) -> usize {
        self.lock().tenants.len()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    pub fn tenant_by_subdomain(&self, subdomain: &str) -> Option<Tenant> {
        self.lock()
            .tenants
            .values()
            .find(|t| t.subdomain == subdomain)
            .cloned()
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.lock().users.values().find(|u| u.email == email).cloned()
    }

    pub fn set_token_expiry(&self, user_id: Uuid, purpose: TokenPurpose, at: DateTime<Utc>) {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            match purpose {
                TokenPurpose::Verification => user.verification_expires = Some(at),
                TokenPurpose::Reset => user.reset_token_expires = Some(at),
            }
        }
    }

    pub fn insert_member(&self, tenant_id: Uuid, email: &str, password_hash: &str) -> User {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            role: Role::Member,
            is_verified: true,
            verification_token: None,
            verification_expires: None,
            reset_token: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };
        self.lock().users.insert(user.id, user.clone());
        user
    }
}

impl InMemoryAccountRepository {
    // Same predicate as the conditional UPDATE in the Postgres repository
    fn redeem_verification(&self, tables: &mut Tables, user_id: Uuid, token: &str) -> bool {
        let Some(user) = tables.users.get_mut(&user_id) else {
            return false;
        };
        if user.is_verified
            || user.verification_token.as_deref() != Some(token)
            || !is_live(user.verification_expires, Utc::now())
        {
            return false;
        }

        user.is_verified = true;
        user.verification_token = None;
        user.verification_expires = None;
        let (tenant_id, role) = (user.tenant_id, user.role);

        if role == Role::Admin {
            if let Some(tenant) = tables.tenants.get_mut(&tenant_id) {
                tenant.status = TenantStatus::Active;
                self.tenant_activations.fetch_add(1, Ordering::SeqCst);
            }
        }

        true
    }
}

fn token_of(user: &User, purpose: TokenPurpose) -> Option<&str> {
    match purpose {
        TokenPurpose::Verification => user.verification_token.as_deref(),
        TokenPurpose::Reset => user.reset_token.as_deref(),
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, AppError> {
        Ok(self.tenant_by_subdomain(subdomain))
    }

    async fn find_tenant_by_email_or_subdomain(
        &self,
        company_email: &str,
        subdomain: &str,
    ) -> Result<Vec<Tenant>, AppError> {
        Ok(self
            .lock()
            .tenants
            .values()
            .filter(|t| t.company_email == company_email || t.subdomain == subdomain)
            .cloned()
            .collect())
    }

    async fn create_tenant_and_admin(
        &self,
        tenant: NewTenant,
        admin: NewAdminUser,
    ) -> Result<(Tenant, User), AppError> {
        let mut tables = self.lock();

        // Unique constraints
        if tables
            .tenants
            .values()
            .any(|t| t.company_email == tenant.company_email)
        {
            return Err(AppError::EmailAlreadyExists);
        }
        if tables.tenants.values().any(|t| t.subdomain == tenant.subdomain) {
            return Err(AppError::SubdomainAlreadyTaken);
        }

        let now = Utc::now();
        let created_tenant = Tenant {
            id: tenant.id,
            company_name: tenant.company_name,
            company_email: tenant.company_email,
            subdomain: tenant.subdomain,
            number_of_branches: tenant.number_of_branches,
            status: TenantStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        // Nothing was written yet, so failing here leaves both tables untouched
        if self.fail_next_user_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::InternalServerError(anyhow::anyhow!(
                "injected user insert failure"
            )));
        }

        let created_user = User {
            id: admin.id,
            tenant_id: created_tenant.id,
            email: admin.email,
            password_hash: admin.password_hash,
            role: Role::Admin,
            is_verified: false,
            verification_token: Some(admin.verification_token),
            verification_expires: Some(admin.verification_expires),
            reset_token: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };

        tables.tenants.insert(created_tenant.id, created_tenant.clone());
        tables.users.insert(created_user.id, created_user.clone());

        Ok((created_tenant, created_user))
    }

    async fn update_tenant_status(
        &self,
        tenant_id: Uuid,
        status: TenantStatus,
    ) -> Result<(), AppError> {
        if let Some(tenant) = self.lock().tenants.get_mut(&tenant_id) {
            tenant.status = status;
            tenant.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn find_user_by_email_and_tenant(
        &self,
        email: &str,
        tenant_id: Uuid,
    ) -> Result<Option<User>, AppError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.email == email && u.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_user_by_token(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<Option<(User, Tenant)>, AppError> {
        let tables = self.lock();

        let found = tables
            .users
            .values()
            .find(|u| token_of(u, purpose) == Some(token))
            .and_then(|u| {
                tables
                    .tenants
                    .get(&u.tenant_id)
                    .map(|t| (u.clone(), t.clone()))
            });

        Ok(found)
    }

    async fn store_token(&self, user_id: Uuid, token: &IssuedToken) -> Result<(), AppError> {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            match token.purpose {
                TokenPurpose::Verification => {
                    user.verification_token = Some(token.value.clone());
                    user.verification_expires = Some(token.expires_at);
                }
                TokenPurpose::Reset => {
                    user.reset_token = Some(token.value.clone());
                    user.reset_token_expires = Some(token.expires_at);
                }
            }
        }
        Ok(())
    }

    async fn clear_token(&self, user_id: Uuid, token: &IssuedToken) -> Result<(), AppError> {
        if let Some(user) = self.lock().users.get_mut(&user_id) {
            if token_of(user, token.purpose) != Some(token.value.as_str()) {
                return Ok(());
            }
            match token.purpose {
                TokenPurpose::Verification => {
                    user.verification_token = None;
                    user.verification_expires = None;
                }
                TokenPurpose::Reset => {
                    user.reset_token = None;
                    user.reset_token_expires = None;
                }
            }
        }
        Ok(())
    }

    async fn consume_verification(&self, user_id: Uuid, token: &str) -> Result<bool, AppError> {
        let mut tables = self.lock();

        if self.rival_consumes_next_verification.swap(false, Ordering::SeqCst) {
            self.redeem_verification(&mut tables, user_id, token);
        }

        Ok(self.redeem_verification(&mut tables, user_id, token))
    }

    async fn consume_reset(
        &self,
        user_id: Uuid,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let mut tables = self.lock();

        let Some(user) = tables.users.get_mut(&user_id) else {
            return Ok(false);
        };
        if user.reset_token.as_deref() != Some(token)
            || !is_live(user.reset_token_expires, Utc::now())
        {
            return Ok(false);
        }

        user.password_hash = password_hash.to_string();
        user.reset_token = None;
        user.reset_token_expires = None;

        Ok(true)
    }
}

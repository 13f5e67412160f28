// src/models/tenancy.rs

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::ValidationError;

pub const SUBDOMAIN_MIN_LEN: usize = 3;
pub const SUBDOMAIN_MAX_LEN: usize = 63;

// Maps the `tenant_status` enum type from the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "tenant_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Active,
}

// ---
// Tenant (the customer organization)
// ---
// Addressed by its own subdomain; `pending` until its admin verifies.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub company_name: String,
    pub company_email: String,
    pub subdomain: String,
    pub number_of_branches: i32,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a tenant row. The id is chosen by the caller so the
/// tenant and its admin can be written in one unit.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub id: Uuid,
    pub company_name: String,
    pub company_email: String,
    pub subdomain: String,
    pub number_of_branches: i32,
}

// Minimal projection handed back to clients after login.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantSummary {
    pub id: Uuid,
    pub name: String,
    pub subdomain: String,
}

impl From<&Tenant> for TenantSummary {
    fn from(tenant: &Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.company_name.clone(),
            subdomain: tenant.subdomain.clone(),
        }
    }
}

/// `^[a-z0-9][a-z0-9-]*[a-z0-9]$`, 3 to 63 characters.
pub fn is_valid_subdomain(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() < SUBDOMAIN_MIN_LEN || bytes.len() > SUBDOMAIN_MAX_LEN {
        return false;
    }

    let is_alnum = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) if is_alnum(first) && is_alnum(last) => {
            bytes.iter().all(|b| is_alnum(b) || *b == b'-')
        }
        _ => false,
    }
}

pub fn validate_subdomain(value: &str) -> Result<(), ValidationError> {
    if is_valid_subdomain(value) {
        return Ok(());
    }

    Err(ValidationError::new("subdomain").with_message(Cow::Borrowed(
        "Subdomain must be 3-63 characters of lowercase letters, numbers, and hyphens, and cannot start or end with a hyphen",
    )))
}

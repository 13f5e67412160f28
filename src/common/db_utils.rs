// src/common/db_utils.rs

use crate::common::error::AppError;

// Constraint names created by migrations/0001_accounts.sql
pub const TENANTS_COMPANY_EMAIL_KEY: &str = "tenants_company_email_key";
pub const TENANTS_SUBDOMAIN_KEY: &str = "tenants_subdomain_key";

/// Returns the constraint name when `error` is a unique violation.
pub(crate) fn unique_violation(error: &sqlx::Error) -> Option<&str> {
    match error {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => db_err.constraint(),
        _ => None,
    }
}

/// Translates a failed tenant insert. Two concurrent registrations can both
/// pass the existence pre-check; the losing insert lands here and gets the
/// same conflict the pre-check would have produced.
pub(crate) fn map_tenant_insert_error(error: sqlx::Error) -> AppError {
    match unique_violation(&error) {
        Some(TENANTS_COMPANY_EMAIL_KEY) => AppError::EmailAlreadyExists,
        Some(TENANTS_SUBDOMAIN_KEY) => AppError::SubdomainAlreadyTaken,
        _ => error.into(),
    }
}

// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::tenancy::{validate_subdomain, TenantSummary};

// Maps the `user_role` enum type from the database.
// Registration only ever produces `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Member,
}

// A user row. Email is unique per tenant, not globally.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,

    #[serde(skip_serializing)]
    pub password_hash: String,

    pub role: Role,
    pub is_verified: bool,

    // Present together, and only while a request is outstanding.
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub verification_expires: Option<DateTime<Utc>>,

    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAdminUser {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub verification_token: String,
    pub verification_expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

// ---
// Payloads
// ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTenantPayload {
    #[validate(length(min = 2, message = "Company name must be at least 2 characters"))]
    #[schema(example = "Acme Corp")]
    pub company_name: String,

    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "admin@acme.com")]
    pub company_email: String,

    #[validate(custom(function = "validate_subdomain"))]
    #[schema(example = "acme")]
    pub subdomain: String,

    #[validate(range(min = 1, message = "Must have at least 1 branch"))]
    pub number_of_branches: i32,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginPayload {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    // Falls back to the tenant label of the request host.
    pub subdomain: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordPayload {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(length(min = 1, message = "Subdomain is required"))]
    pub subdomain: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordPayload {
    #[validate(length(min = 1, message = "Token is required"))]
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CheckVerificationQuery {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Subdomain is required"))]
    pub subdomain: String,
}

// ---
// Outcomes
// ---

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub tenant_id: Uuid,
    pub email: String,
    pub subdomain: String,
    pub login_url: String,

    // False means "registered, email not sent".
    #[serde(skip)]
    pub verification_email_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub email: String,
    pub subdomain: String,
    pub already_verified: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionGrant {
    pub token: String,
    pub user: UserSummary,
    pub tenant: TenantSummary,
}

// Claims carried by the signed session credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: Uuid, // user id
    pub tenant_id: Uuid,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
}

/// Trims and lower-cases an email address. Applied before validation,
/// persistence, and every lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_payload_reports_every_failing_field() {
        let payload = RegisterTenantPayload {
            company_name: "A".into(),
            company_email: "not-an-email".into(),
            subdomain: "-bad".into(),
            number_of_branches: 0,
            password: "short".into(),
        };

        let errors = payload.validate().unwrap_err();
        let fields = errors.field_errors();

        for field in [
            "company_name",
            "company_email",
            "subdomain",
            "number_of_branches",
            "password",
        ] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }
    }

    #[test]
    fn register_payload_accepts_valid_input() {
        let payload = RegisterTenantPayload {
            company_name: "Acme".into(),
            company_email: "a@acme.com".into(),
            subdomain: "acme".into(),
            number_of_branches: 1,
            password: "correct-horse".into(),
        };

        assert!(payload.validate().is_ok());
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  A@Acme.COM "), "a@acme.com");
    }

    #[test]
    fn user_serialization_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "a@acme.com".into(),
            password_hash: "hash".into(),
            role: Role::Admin,
            is_verified: false,
            verification_token: Some("tok".into()),
            verification_expires: Some(now),
            reset_token: None,
            reset_token_expires: None,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("verificationToken").is_none());
        assert_eq!(json["role"], "admin");
    }
}

// src/docs.rs

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Registration ---
        handlers::auth::register,
        handlers::auth::verify_email_redirect,
        handlers::auth::verify_email_json,
        handlers::auth::check_verification,

        // --- Password ---
        handlers::auth::forgot_password,
        handlers::auth::reset_password,

        // --- Session ---
        handlers::auth::login,
        handlers::auth::me,
    ),
    components(
        schemas(
            // --- Tenancy ---
            models::tenancy::TenantStatus,
            models::tenancy::TenantSummary,

            // --- Auth ---
            models::auth::Role,
            models::auth::UserSummary,
            models::auth::Claims,
            models::auth::RegisterTenantPayload,
            models::auth::LoginPayload,
            models::auth::ForgotPasswordPayload,
            models::auth::ResetPasswordPayload,
            models::auth::RegistrationOutcome,
            models::auth::VerificationOutcome,
            models::auth::SessionGrant,
            handlers::auth::VerificationStatus,
        )
    ),
    tags(
        (name = "Registration", description = "Tenant sign-up and email verification"),
        (name = "Password", description = "Password reset"),
        (name = "Session", description = "Login and session inspection")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = ApiDoc::openapi();

        for path in [
            "/api/register",
            "/api/verify-email",
            "/api/auth/verify-email",
            "/api/auth/check-verification",
            "/api/auth/forgot-password",
            "/api/auth/reset-password",
            "/api/login",
            "/api/auth/me",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}

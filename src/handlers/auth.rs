// src/handlers/auth.rs

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedSession, tenancy::TenantHost},
    models::auth::{
        CheckVerificationQuery, Claims, ForgotPasswordPayload, LoginPayload,
        RegisterTenantPayload, RegistrationOutcome, ResetPasswordPayload, SessionGrant,
        VerificationOutcome, VerifyEmailQuery,
    },
    services::links::VERIFY_SUCCESS_PATH,
};

pub const REGISTERED_MESSAGE: &str =
    "Registration successful! Please check your email to verify your account.";
pub const REGISTERED_UNSENT_MESSAGE: &str =
    "Registration successful but verification email could not be sent. Please contact support.";

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub is_verified: bool,
}

// POST /api/register
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Registration",
    request_body = RegisterTenantPayload,
    responses(
        (status = 201, description = "Tenant and admin created, pending verification", body = RegistrationOutcome),
        (status = 400, description = "Invalid fields"),
        (status = 409, description = "Email or subdomain already in use")
    )
)]
pub async fn register(
    State(app_state): State<AppState>,
    Json(payload): Json<RegisterTenantPayload>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = app_state.account_service.register(payload).await?;

    let message = if outcome.verification_email_sent {
        REGISTERED_MESSAGE
    } else {
        REGISTERED_UNSENT_MESSAGE
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": message,
            "data": outcome,
        })),
    ))
}

// GET /api/verify-email  (link target in the verification email)
#[utoipa::path(
    get,
    path = "/api/verify-email",
    tag = "Registration",
    params(VerifyEmailQuery),
    responses(
        (status = 307, description = "Redirect to the verification result page")
    )
)]
pub async fn verify_email_redirect(
    State(app_state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Redirect {
    let links = app_state.routing.links();

    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return Redirect::temporary(&links.with_params(VERIFY_SUCCESS_PATH, &[("error", "no_token")]));
    };

    let target = match app_state.account_service.verify_email(&token).await {
        Ok(outcome) => {
            let mut params = vec![
                ("verified", "true"),
                ("email", outcome.email.as_str()),
                ("subdomain", outcome.subdomain.as_str()),
            ];
            if outcome.already_verified {
                params.push(("alreadyVerified", "true"));
            }
            links.with_params(VERIFY_SUCCESS_PATH, &params)
        }
        Err(e) => {
            let code = match e {
                AppError::InvalidToken => "invalid_token",
                AppError::TokenExpired => "token_expired",
                other => {
                    tracing::error!("🔥 Email verification failed: {}", other);
                    "server_error"
                }
            };
            links.with_params(VERIFY_SUCCESS_PATH, &[("error", code)])
        }
    };

    Redirect::temporary(&target)
}

// GET /api/auth/verify-email
#[utoipa::path(
    get,
    path = "/api/auth/verify-email",
    tag = "Registration",
    params(VerifyEmailQuery),
    responses(
        (status = 200, description = "Email verified", body = VerificationOutcome),
        (status = 400, description = "Missing, unknown, used or expired token")
    )
)]
pub async fn verify_email_json(
    State(app_state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    let token = query.token.unwrap_or_default();
    let outcome = app_state.account_service.verify_email(&token).await?;

    let message = if outcome.already_verified {
        "Email already verified"
    } else {
        "Email verified successfully"
    };

    Ok(Json(json!({
        "success": true,
        "message": message,
        "data": outcome,
    })))
}

// GET /api/auth/check-verification
#[utoipa::path(
    get,
    path = "/api/auth/check-verification",
    tag = "Registration",
    params(CheckVerificationQuery),
    responses(
        (status = 200, description = "Verification state of the admin", body = VerificationStatus),
        (status = 404, description = "No such user in this tenant")
    )
)]
pub async fn check_verification(
    State(app_state): State<AppState>,
    Query(query): Query<CheckVerificationQuery>,
) -> Result<Json<VerificationStatus>, AppError> {
    let is_verified = app_state.account_service.check_verification(query).await?;
    Ok(Json(VerificationStatus { is_verified }))
}

// POST /api/auth/forgot-password
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "Password",
    request_body = ForgotPasswordPayload,
    responses(
        (status = 200, description = "Reset instructions sent"),
        (status = 400, description = "Unknown tenant, or instructions could not be sent")
    )
)]
pub async fn forgot_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .account_service
        .request_password_reset(payload)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password reset instructions have been sent to your email",
    })))
}

// POST /api/auth/reset-password
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "Password",
    request_body = ResetPasswordPayload,
    responses(
        (status = 200, description = "Password replaced"),
        (status = 400, description = "Invalid, used or expired token")
    )
)]
pub async fn reset_password(
    State(app_state): State<AppState>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state.account_service.reset_password(payload).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password has been reset successfully",
    })))
}

// POST /api/login
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "Session",
    request_body = LoginPayload,
    responses(
        (status = 200, description = "Session issued", body = SessionGrant),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified")
    )
)]
pub async fn login(
    State(app_state): State<AppState>,
    TenantHost(host_subdomain): TenantHost,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, AppError> {
    let grant = app_state
        .session_service
        .authenticate(payload, host_subdomain.as_deref())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": grant,
    })))
}

// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Session",
    responses(
        (status = 200, description = "Claims of the current session", body = Claims),
        (status = 401, description = "Missing, invalid or expired session")
    ),
    security(("api_jwt" = []))
)]
pub async fn me(AuthenticatedSession(claims): AuthenticatedSession) -> Json<Claims> {
    Json(claims)
}

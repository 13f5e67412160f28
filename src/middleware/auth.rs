// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::{common::error::AppError, config::AppState, models::auth::Claims};

/// Re-validates signature and expiry of the bearer credential on every
/// protected request and hands the claims to the handler.
pub async fn session_guard(
    State(app_state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AppError::InvalidSession)?;

    let claims = app_state.session_service.validate_token(bearer.token())?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

// Claims of the session validated by `session_guard`
pub struct AuthenticatedSession(pub Claims);

impl<S> FromRequestParts<S> for AuthenticatedSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(AuthenticatedSession)
            .ok_or(AppError::InvalidSession)
    }
}

// src/middleware/tenancy.rs

use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::HOST, request::Parts},
};

use crate::config::AppState;

// Tenant label of the request host; None on main hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantHost(pub Option<String>);

impl<S> FromRequestParts<S> for TenantHost
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);

        let host = parts
            .headers
            .get(HOST)
            .and_then(|value| value.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .unwrap_or_default();

        Ok(TenantHost(app_state.routing.tenant_subdomain(host)))
    }
}

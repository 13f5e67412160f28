// src/main.rs

use anyhow::Context;
use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::{
    config::{AppState, Settings},
    docs::ApiDoc,
    middleware::{auth::session_guard, tenant_router::tenant_router},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings)
        .await
        .context("failed to initialise application state")?;

    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("failed to run database migrations")?;

    tracing::info!("✅ Database migrations applied");

    let app = build_router(app_state);

    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    tracing::info!("🚀 Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn build_router(app_state: AppState) -> Router {
    // Session-protected
    let session_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            session_guard,
        ));

    let auth_routes = Router::new()
        .route("/verify-email", get(handlers::auth::verify_email_json))
        .route("/check-verification", get(handlers::auth::check_verification))
        .route("/forgot-password", post(handlers::auth::forgot_password))
        .route("/reset-password", post(handlers::auth::reset_password))
        .merge(session_routes);

    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/api/docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/verify-email", get(handlers::auth::verify_email_redirect))
        .route("/api/login", post(handlers::auth::login))
        .nest("/api/auth", auth_routes)
        // Pages are served by the frontend; forwarded page paths end here
        .fallback(|| async { StatusCode::NOT_FOUND })
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            tenant_router,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

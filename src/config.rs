// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration as StdDuration};

use anyhow::Context;
use chrono::Duration;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::PgAccountRepository,
    middleware::tenant_router::RoutingTable,
    services::{
        account_service::AccountService,
        auth::SessionService,
        links::Links,
        notifier::LogNotifier,
        password::BcryptHasher,
        token_service::TokenIssuer,
    },
};

pub const VERIFICATION_TOKEN_TTL: Duration = Duration::hours(24);
pub const RESET_TOKEN_TTL: Duration = Duration::minutes(60);
pub const SESSION_TTL: Duration = Duration::hours(24);

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_MAIN_HOSTS: &str = "localhost:3000";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub app_url: String,
    pub main_hosts: Vec<String>,
    pub bind_addr: String,
    pub bcrypt_cost: u32,
    pub verification_token_ttl: Duration,
    pub reset_token_ttl: Duration,
    pub session_ttl: Duration,
}

impl Settings {
    /// Reads the process environment after merging an optional `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let main_hosts = lookup("MAIN_HOSTS")
            .unwrap_or_else(|| DEFAULT_MAIN_HOSTS.to_string())
            .split(',')
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            app_url: lookup("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string()),
            main_hosts,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            bcrypt_cost: parse_var(&lookup, "BCRYPT_COST")?.unwrap_or(bcrypt::DEFAULT_COST),
            verification_token_ttl: ttl_var(
                &lookup,
                "VERIFICATION_TOKEN_TTL_HOURS",
                Duration::try_hours,
            )?
            .unwrap_or(VERIFICATION_TOKEN_TTL),
            reset_token_ttl: ttl_var(&lookup, "RESET_TOKEN_TTL_MINUTES", Duration::try_minutes)?
                .unwrap_or(RESET_TOKEN_TTL),
            session_ttl: ttl_var(&lookup, "SESSION_TTL_HOURS", Duration::try_hours)?
                .unwrap_or(SESSION_TTL),
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} is not a valid value: {raw}"))
        })
        .transpose()
}

// A positive lifetime in the unit `to_duration` builds
fn ttl_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    to_duration: fn(i64) -> Option<Duration>,
) -> anyhow::Result<Option<Duration>> {
    let Some(value) = parse_var::<i64>(lookup, key)? else {
        return Ok(None);
    };
    anyhow::ensure!(value > 0, "{key} must be positive");

    to_duration(value)
        .map(Some)
        .with_context(|| format!("{key} is out of range: {value}"))
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub routing: Arc<RoutingTable>,
    pub account_service: AccountService,
    pub session_service: SessionService,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(StdDuration::from_secs(3))
            .connect(&settings.database_url)
            .await
            .context("failed to connect to the database")?;

        tracing::info!("✅ Database connection established");

        Self::from_parts(settings, db_pool)
    }

    /// Builds the dependency graph over an existing pool.
    pub fn from_parts(settings: &Settings, db_pool: PgPool) -> anyhow::Result<Self> {
        let links = Links::parse(&settings.app_url)
            .with_context(|| format!("APP_URL is not a valid URL: {}", settings.app_url))?;

        let repo = Arc::new(PgAccountRepository::new(db_pool.clone()));
        let hasher = Arc::new(BcryptHasher::new(settings.bcrypt_cost));

        let account_service = AccountService::new(
            repo.clone(),
            Arc::new(LogNotifier),
            hasher.clone(),
            TokenIssuer::new(settings.verification_token_ttl, settings.reset_token_ttl),
            links.clone(),
        );
        let session_service = SessionService::new(
            repo,
            hasher,
            settings.jwt_secret.clone(),
            settings.session_ttl,
        );

        Ok(Self {
            db_pool,
            routing: Arc::new(RoutingTable::new(&settings.main_hosts, links)),
            account_service,
            session_service,
        })
    }
}

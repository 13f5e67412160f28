// src/middleware/tenant_router.rs

use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    http::{
        header::{CACHE_CONTROL, HOST, VARY},
        HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    config::AppState,
    services::links::{Links, LOGIN_PATH, VERIFY_SUCCESS_PATH},
};

// Always forwarded untouched (assets and the API namespace)
pub const BYPASS_PREFIXES: &[&str] = &["/_next", "/api", "/static", "/assets", "/favicon.ico"];

// Only reachable on main hosts
pub const PUBLIC_PATHS: &[&str] = &[
    "/",
    "/register",
    "/about",
    "/contact",
    "/registration-success",
    "/pricing",
    "/features",
    VERIFY_SUCCESS_PATH,
];

// Only reachable on tenant subdomains
pub const TENANT_ONLY_PATHS: &[&str] = &[
    "/dashboard",
    "/settings",
    "/profile",
    "/inventory",
    "/reports",
    LOGIN_PATH,
];

// Reachable on either
pub const VERIFICATION_PATHS: &[&str] = &["/verify-email"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Forward,
    RedirectTo(String),
    RejectToRoot,
}

/// Static host/path configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    main_hosts: HashSet<String>,
    bypass_prefixes: Vec<String>,
    public_paths: HashSet<String>,
    tenant_only_paths: HashSet<String>,
    verification_paths: HashSet<String>,
    links: Links,
}

fn owned_set(paths: &[&str]) -> HashSet<String> {
    paths.iter().map(|p| (*p).to_string()).collect()
}

impl RoutingTable {
    pub fn new<I, S>(main_hosts: I, links: Links) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            main_hosts: main_hosts
                .into_iter()
                .map(|h| h.as_ref().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            bypass_prefixes: BYPASS_PREFIXES.iter().map(|p| (*p).to_string()).collect(),
            public_paths: owned_set(PUBLIC_PATHS),
            tenant_only_paths: owned_set(TENANT_ONLY_PATHS),
            verification_paths: owned_set(VERIFICATION_PATHS),
            links,
        }
    }

    pub fn links(&self) -> &Links {
        &self.links
    }

    /// An absent host is treated as a main-host request.
    pub fn is_main_host(&self, host: &str) -> bool {
        host.is_empty() || self.main_hosts.contains(&host.to_ascii_lowercase())
    }

    /// First label of a non-main host, without any port.
    pub fn tenant_subdomain(&self, host: &str) -> Option<String> {
        if self.is_main_host(host) {
            return None;
        }

        let label = host.split('.').next()?;
        let label = label.split(':').next().unwrap_or(label);
        (!label.is_empty()).then(|| label.to_ascii_lowercase())
    }

    /// Pure routing decision for one request.
    pub fn decide(&self, host: &str, path: &str, query: Option<&str>) -> RouteDecision {
        if self
            .bypass_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
        {
            return RouteDecision::Forward;
        }

        if self.is_main_host(host) {
            if self.public_paths.contains(path) || self.verification_paths.contains(path) {
                return RouteDecision::Forward;
            }
            // Tenant-only and unknown paths alike go back to the landing page
            return RouteDecision::RejectToRoot;
        }

        // Tenant subdomain
        if path.is_empty() || path == "/" {
            return RouteDecision::RedirectTo(same_host_login(query));
        }

        if path == VERIFY_SUCCESS_PATH {
            return RouteDecision::Forward;
        }

        if self.public_paths.contains(path) {
            return RouteDecision::RedirectTo(self.links.main_url(path, query));
        }

        if self.tenant_only_paths.contains(path) || self.verification_paths.contains(path) {
            return RouteDecision::Forward;
        }

        RouteDecision::RedirectTo(same_host_login(query))
    }
}

fn same_host_login(query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{LOGIN_PATH}?{query}"),
        None => LOGIN_PATH.to_string(),
    }
}

pub(crate) fn request_host(request: &Request) -> String {
    request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
}

/// Front-door middleware: classifies every request by host and path.
/// Forwarded responses are marked uncacheable since they vary by host.
pub async fn tenant_router(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let host = request_host(&request);
    let decision = app_state
        .routing
        .decide(&host, request.uri().path(), request.uri().query());

    match decision {
        RouteDecision::Forward => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            headers.append(VARY, HeaderValue::from_static("Host"));
            response
        }
        RouteDecision::RedirectTo(location) => {
            tracing::debug!(%host, path = request.uri().path(), %location, "redirect");
            Redirect::temporary(&location).into_response()
        }
        RouteDecision::RejectToRoot => {
            tracing::debug!(%host, path = request.uri().path(), "rejected to root");
            Redirect::temporary("/").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RoutingTable {
        RoutingTable::new(
            ["main.example.com", "localhost:3000"],
            Links::parse("https://main.example.com").unwrap(),
        )
    }

    fn redirect(to: &str) -> RouteDecision {
        RouteDecision::RedirectTo(to.to_string())
    }

    #[test]
    fn bypass_prefixes_always_forward() {
        let t = table();

        assert_eq!(t.decide("tenant1.example.com", "/api/login", None), RouteDecision::Forward);
        assert_eq!(t.decide("main.example.com", "/_next/static/x.js", None), RouteDecision::Forward);
        assert_eq!(t.decide("tenant1.example.com", "/favicon.ico", None), RouteDecision::Forward);
    }

    #[test]
    fn main_host_serves_public_paths_only() {
        let t = table();

        assert_eq!(t.decide("main.example.com", "/", None), RouteDecision::Forward);
        assert_eq!(t.decide("main.example.com", "/register", None), RouteDecision::Forward);
        assert_eq!(t.decide("MAIN.example.com", "/pricing", None), RouteDecision::Forward);
        assert_eq!(t.decide("main.example.com", "/dashboard", None), RouteDecision::RejectToRoot);
        assert_eq!(t.decide("main.example.com", "/login", None), RouteDecision::RejectToRoot);
        assert_eq!(t.decide("main.example.com", "/nope", None), RouteDecision::RejectToRoot);
        assert_eq!(t.decide("main.example.com", "/verify-email", None), RouteDecision::Forward);
    }

    #[test]
    fn tenant_root_redirects_to_login_with_query() {
        let t = table();

        assert_eq!(t.decide("tenant1.example.com", "/", None), redirect("/login"));
        assert_eq!(t.decide("tenant1.example.com", "", None), redirect("/login"));
        assert_eq!(
            t.decide("tenant1.example.com", "/", Some("verified=true")),
            redirect("/login?verified=true")
        );
    }

    #[test]
    fn tenant_public_paths_go_to_the_main_host() {
        let t = table();

        assert_eq!(
            t.decide("tenant1.example.com", "/register", None),
            redirect("https://main.example.com/register")
        );
        assert_eq!(
            t.decide("tenant1.example.com", "/pricing", Some("plan=pro")),
            redirect("https://main.example.com/pricing?plan=pro")
        );
    }

    #[test]
    fn tenant_may_view_verification_success() {
        assert_eq!(
            table().decide("tenant1.example.com", "/verify-success", Some("verified=true")),
            RouteDecision::Forward
        );
    }

    #[test]
    fn tenant_only_and_verification_paths_forward_on_tenants() {
        let t = table();

        assert_eq!(t.decide("tenant1.example.com", "/dashboard", None), RouteDecision::Forward);
        assert_eq!(t.decide("tenant1.example.com", "/login", None), RouteDecision::Forward);
        assert_eq!(t.decide("tenant1.example.com", "/verify-email", None), RouteDecision::Forward);
    }

    #[test]
    fn unknown_tenant_paths_redirect_to_login() {
        assert_eq!(
            table().decide("tenant1.example.com", "/admin", Some("x=1")),
            redirect("/login?x=1")
        );
    }

    #[test]
    fn tenant_subdomain_is_the_first_label() {
        let t = table();

        assert_eq!(t.tenant_subdomain("acme.localhost:3000").as_deref(), Some("acme"));
        assert_eq!(t.tenant_subdomain("Tenant1.example.com").as_deref(), Some("tenant1"));
        assert_eq!(t.tenant_subdomain("main.example.com"), None);
        assert_eq!(t.tenant_subdomain("localhost:3000"), None);
        assert_eq!(t.tenant_subdomain(""), None);
    }
}

// src/services/links.rs

use url::Url;

pub const VERIFY_EMAIL_PATH: &str = "/api/verify-email";
pub const RESET_PASSWORD_PATH: &str = "/reset-password";
pub const VERIFY_SUCCESS_PATH: &str = "/verify-success";
pub const LOGIN_PATH: &str = "/login";

/// Builds absolute URLs on the main application host or on a tenant's
/// subdomain of it.
#[derive(Debug, Clone)]
pub struct Links {
    base: Url,
}

impl Links {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn parse(base: &str) -> Result<Self, url::ParseError> {
        Url::parse(base).map(Self::new)
    }

    /// `path` + raw `query` on the main host.
    pub fn main_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(query.filter(|q| !q.is_empty()));
        url.to_string()
    }

    /// `path` on `{subdomain}.{main host}`, keeping scheme and port.
    pub fn tenant_url(&self, subdomain: &str, path: &str) -> Result<String, url::ParseError> {
        let host = self.base.host_str().ok_or(url::ParseError::EmptyHost)?;

        let mut url = self.base.clone();
        url.set_host(Some(&format!("{subdomain}.{host}")))?;
        url.set_path(path);
        url.set_query(None);
        Ok(url.to_string())
    }

    pub fn verification_link(&self, token: &str) -> String {
        self.with_params(VERIFY_EMAIL_PATH, &[("token", token)])
    }

    pub fn reset_link(&self, token: &str) -> String {
        self.with_params(RESET_PASSWORD_PATH, &[("token", token)])
    }

    /// Main-host URL with form-encoded query parameters.
    pub fn with_params(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        url.to_string()
    }
}

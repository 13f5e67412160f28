// src/services/token_service.rs

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};

/// Number of random bytes behind every single-use token (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Which user field a token occupies. The field is the only purpose tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenPurpose {
    Verification,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub value: String,
    pub purpose: TokenPurpose,
    pub expires_at: DateTime<Utc>,
}

/// Mints opaque, URL-safe, expiring tokens. Tokens are only ever compared
/// for equality; nothing parses structure out of them.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    verification_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(verification_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            verification_ttl,
            reset_ttl,
        }
    }

    pub fn ttl(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Verification => self.verification_ttl,
            TokenPurpose::Reset => self.reset_ttl,
        }
    }

    pub fn issue(&self, purpose: TokenPurpose) -> IssuedToken {
        self.issue_at(purpose, Utc::now())
    }

    pub fn issue_at(&self, purpose: TokenPurpose, now: DateTime<Utc>) -> IssuedToken {
        IssuedToken {
            value: new_token(),
            purpose,
            expires_at: now + self.ttl(purpose),
        }
    }
}

pub fn new_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);

    URL_SAFE_NO_PAD.encode(bytes)
}

/// A token is live strictly before its expiry. A missing expiry is never live.
pub fn is_live(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|expires_at| expires_at > now)
}

/// Short, non-reusable prefix for log lines.
pub fn log_prefix(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

//! Caller authentication.
//!
//! Resolves an `Authorization: Bearer <token>` header to the owner whose
//! corpus the request may read. The owner is never taken from the body.

use crate::{config::AuthConfig, ids::OwnerId};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,
}

/// Maps bearer tokens to owners.
#[derive(Debug, Clone)]
pub struct Authenticator {
    require_auth: bool,
    anon_owner: OwnerId,
    tokens: Vec<(String, OwnerId)>,
}

impl Authenticator {
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            require_auth: config.require_auth,
            anon_owner: OwnerId::from(config.anon_owner.as_str()),
            tokens: config
                .tokens
                .iter()
                .map(|entry| (entry.token.clone(), OwnerId::from(entry.owner.as_str())))
                .collect(),
        }
    }

    pub fn require_auth(&self) -> bool {
        self.require_auth
    }

    /// Resolves the caller from the raw `Authorization` header value.
    ///
    /// With auth disabled every caller is the anonymous owner.
    pub fn authenticate(&self, header: Option<&str>) -> Result<OwnerId, AuthError> {
        if !self.require_auth {
            return Ok(self.anon_owner.clone());
        }

        let header = header.ok_or(AuthError::MissingHeader)?;
        let token = extract_bearer_token(header).ok_or(AuthError::InvalidFormat)?;

        // Every entry is compared so the lookup time does not depend on
        // which token matched.
        let mut owner = None;
        for (expected, entry_owner) in &self.tokens {
            if validate_token(token, expected) && owner.is_none() {
                owner = Some(entry_owner.clone());
            }
        }

        owner.ok_or_else(|| {
            log::warn!("rejected request with unknown bearer token");
            AuthError::InvalidToken
        })
    }
}

/// Validates a provided token against the expected token using constant-time comparison.
///
/// Returns `false` if either token is empty.
pub fn validate_token(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    if provided.is_empty() || expected.is_empty() {
        return false;
    }

    let len_match = provided.len() == expected.len();

    let mut diff: u8 = 0;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }

    len_match && diff == 0
}

/// Extracts the bearer token from an Authorization header value.
///
/// Expected format: "Bearer <token>", prefix matched case-insensitively.
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();

    let prefix = header.get(..7)?;
    if !prefix.eq_ignore_ascii_case("Bearer ") {
        return None;
    }

    let token = header[7..].trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use base64::Engine;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::config::AuthConfig;
use crate::error::TrackerError;

/// The single user allowed to write, stored as SHA-256 digests
#[derive(Clone)]
pub struct Credentials {
    username: [u8; 32],
    password: [u8; 32],
    enabled: bool,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

impl Credentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: digest(username),
            password: digest(password),
            enabled: !password.is_empty(),
        }
    }

    pub fn from_config(auth: &AuthConfig) -> Self {
        Self::new(&auth.username, &auth.password)
    }

    /// Check an `Authorization: Basic ...` header value
    pub fn verify(&self, header: Option<&HeaderValue>) -> bool {
        if !self.enabled {
            return false;
        }

        let Some((username, password)) = header.and_then(parse_basic) else {
            return false;
        };

        let user_ok = digest(&username) == self.username;
        let pass_ok = digest(&password) == self.password;
        user_ok & pass_ok
    }
}

fn parse_basic(value: &HeaderValue) -> Option<(String, String)> {
    let value = value.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Middleware rejecting requests without valid Basic credentials
pub async fn require_basic_auth(
    State(credentials): State<Arc<Credentials>>,
    request: Request,
    next: Next,
) -> Result<Response, TrackerError> {
    if !credentials.verify(request.headers().get(header::AUTHORIZATION)) {
        debug!("Rejected unauthenticated {} {}", request.method(), request.uri());
        return Err(TrackerError::Unauthorized);
    }
    Ok(next.run(request).await)
}

/// Build an `Authorization` header value for the given credentials
pub fn basic_header(username: &str, password: &str) -> String {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

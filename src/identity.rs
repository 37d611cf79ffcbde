//! Caller identity for policy decisions.
//! The policy core only needs an opaque identity string; this module derives it from HTTP
//! basic auth (when configured) or from a trusted header set by a fronting proxy.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use base64::Engine;

use crate::config::ServerConfig;
use crate::error::AppError;

/// Authentication settings shared by all requests.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    pub basic: Option<(String, String)>,
    pub identity_header: Option<String>,
}

impl AuthSettings {
    pub fn from_config(cfg: &ServerConfig) -> Self {
        Self {
            basic: cfg.basic_auth(),
            identity_header: cfg.identity_header.clone().filter(|h| !h.trim().is_empty()),
        }
    }
}

/// The requesting party. `identity` is `None` for anonymous callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub identity: Option<String>,
}

impl Caller {
    pub fn identity(&self) -> Option<&str> { self.identity.as_deref() }

    /// Authenticate a request against `settings`.
    pub fn from_headers(settings: &AuthSettings, headers: &HeaderMap) -> Result<Self, AppError> {
        if let Some((user, pass)) = &settings.basic {
            let Some((got_user, got_pass)) = parse_basic(headers) else {
                return Err(AppError::auth("auth_required", "basic authentication required"));
            };
            if &got_user != user || &got_pass != pass {
                return Err(AppError::auth("bad_credentials", "invalid username or password"));
            }
            return Ok(Caller { identity: Some(got_user) });
        }
        let identity = settings
            .identity_header
            .as_deref()
            .and_then(|name| headers.get(name))
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(Caller { identity })
    }
}

/// Decode `Authorization: Basic <b64(user:pass)>`.
pub fn parse_basic(headers: &HeaderMap) -> Option<(String, String)> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, b64) = raw.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") { return None; }
    let decoded = base64::engine::general_purpose::STANDARD.decode(b64.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, pass) = text.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
    Arc<AuthSettings>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let settings = Arc::<AuthSettings>::from_ref(state);
        Caller::from_headers(&settings, &parts.headers)
    }
}

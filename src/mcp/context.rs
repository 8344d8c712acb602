//! Per-call request context: the upstream API credential and a cancellation
//! token that every suspension point observes.

use std::fmt;
use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;

/// Header carrying the upstream API key, both inbound and outbound.
pub const API_KEY_HEADER: &str = "x-lifi-api-key";

/// An upstream API key. `Debug` never prints the value.
#[derive(Clone)]
pub struct ApiKey(Arc<SecretString>);

impl ApiKey {
    /// Returns `None` for an empty or whitespace-only key.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(Arc::new(SecretString::new(trimmed.to_string()))))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Extracts a credential from inbound transport headers.
///
/// `Authorization: Bearer <key>` wins over `X-LiFi-Api-Key`. No credential is
/// a valid outcome and means anonymous upstream rate limits.
pub fn extract_api_key(headers: &HeaderMap) -> Option<ApiKey> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            let (scheme, rest) = v.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| rest.to_string())
        })
        .and_then(ApiKey::new);
    if bearer.is_some() {
        return bearer;
    }
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(ApiKey::new)
}

/// Scoped state for one tool call.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    credential: Option<ApiKey>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(credential: Option<ApiKey>) -> Self {
        Self {
            credential,
            cancel: CancellationToken::new(),
        }
    }

    /// A context whose cancellation follows `parent`.
    pub fn with_parent(credential: Option<ApiKey>, parent: &CancellationToken) -> Self {
        Self {
            credential,
            cancel: parent.child_token(),
        }
    }

    pub fn credential(&self) -> Option<&ApiKey> {
        self.credential.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

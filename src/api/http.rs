//! HTTP transport for the remote API.
//!
//! [`Transport`] is the seam between the dispatch algorithm and the wire:
//! one call executes one attempt against one endpoint candidate and
//! classifies the outcome. [`HttpTransport`] is the reqwest-backed
//! implementation; tests substitute scripted transports.

use super::routes::{Method, Route};
use super::ClientConfig;
use crate::error::Error;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::debug;

/// Classified outcome of one failed attempt.
///
/// The classification decides whether the dispatch loop falls through to
/// the next endpoint candidate or aborts the whole operation.
#[derive(Debug, ThisError)]
pub enum TransportError {
    /// 401: the credential is missing or was rejected.
    #[error("credential rejected")]
    Unauthenticated,

    /// 403: authenticated but not permitted.
    #[error("permission denied")]
    Forbidden,

    /// 404: this candidate does not serve the operation (or the target is
    /// gone). The next candidate decides which.
    #[error("not found")]
    NotFound,

    /// 409: the transition is no longer valid server-side.
    #[error("conflict")]
    Conflict,

    /// 5xx: the candidate answered but failed.
    #[error("server error: status {0}")]
    Server(u16),

    /// Connection failure, timeout, or an unreadable response body.
    #[error("network error: {0}")]
    Network(String),
}

impl TransportError {
    /// Classifies an HTTP status. Returns `None` for success statuses.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(Self::Unauthenticated),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            500..=599 => Some(Self::Server(status)),
            other => Some(Self::Network(format!("unexpected status {}", other))),
        }
    }

    /// Whether the dispatch loop may try the next endpoint candidate.
    ///
    /// Credential and permission failures abort immediately; so does a
    /// conflict, which no other endpoint will answer differently.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::Server(_) | Self::Network(_)
        )
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthenticated => {
                Error::unauthenticated("bearer credential rejected")
            }
            TransportError::Forbidden => Error::forbidden("server denied the operation"),
            TransportError::NotFound => Error::not_found("target no longer exists"),
            TransportError::Conflict => Error::conflict("transition no longer valid"),
            other => Error::SyncFailed {
                attempts: 1,
                last_error: other.to_string(),
            },
        }
    }
}

/// Executes one request against one endpoint candidate.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `body` (if any) to the route and returns the decoded JSON
    /// payload, `Value::Null` for an empty success body.
    async fn execute(
        &self,
        route: &Route,
        body: Option<&Value>,
    ) -> std::result::Result<Value, TransportError>;
}

/// Production transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    bearer: RwLock<Option<String>>,
}

impl HttpTransport {
    /// Creates a transport from the client configuration.
    pub fn new(config: &ClientConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bearer: RwLock::new(config.bearer.clone()),
        }
    }

    /// Replaces the bearer credential (the host calls this after re-login).
    pub fn set_bearer(&self, token: Option<String>) {
        let mut bearer = self.bearer.write().unwrap_or_else(|e| e.into_inner());
        *bearer = token;
    }

    fn url(&self, route: &Route) -> String {
        format!("{}{}", self.base_url, route.path)
    }

    fn bearer_token(&self) -> Option<String> {
        self.bearer
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        route: &Route,
        body: Option<&Value>,
    ) -> std::result::Result<Value, TransportError> {
        let method = match route.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut request = self.client.request(method, self.url(route));
        if let Some(token) = self.bearer_token() {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(route = %route, "sending request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Network(format!("request timed out: {}", e))
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if let Some(err) = TransportError::from_status(status) {
            return Err(err);
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read body: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        // A malformed body from one candidate should not sink the
        // operation while another candidate might answer properly.
        serde_json::from_str(&text)
            .map_err(|e| TransportError::Network(format!("invalid response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(TransportError::from_status(200).is_none());
        assert!(TransportError::from_status(204).is_none());
        assert!(matches!(
            TransportError::from_status(401),
            Some(TransportError::Unauthenticated)
        ));
        assert!(matches!(
            TransportError::from_status(403),
            Some(TransportError::Forbidden)
        ));
        assert!(matches!(
            TransportError::from_status(404),
            Some(TransportError::NotFound)
        ));
        assert!(matches!(
            TransportError::from_status(409),
            Some(TransportError::Conflict)
        ));
        assert!(matches!(
            TransportError::from_status(503),
            Some(TransportError::Server(503))
        ));
    }

    #[test]
    fn test_fallback_eligibility() {
        assert!(TransportError::NotFound.allows_fallback());
        assert!(TransportError::Server(500).allows_fallback());
        assert!(TransportError::Network("down".to_string()).allows_fallback());

        assert!(!TransportError::Unauthenticated.allows_fallback());
        assert!(!TransportError::Forbidden.allows_fallback());
        assert!(!TransportError::Conflict.allows_fallback());
    }

    #[test]
    fn test_abort_error_conversion() {
        assert!(matches!(
            Error::from(TransportError::Unauthenticated),
            Error::Unauthenticated(_)
        ));
        assert!(matches!(
            Error::from(TransportError::Forbidden),
            Error::Forbidden(_)
        ));
        assert!(matches!(
            Error::from(TransportError::Conflict),
            Error::Conflict(_)
        ));
    }

    #[test]
    fn test_base_url_trimming() {
        let transport = HttpTransport::new(&ClientConfig::new("http://host/api/"));
        let route = Route::new(Method::Get, "/posts/1");
        assert_eq!(transport.url(&route), "http://host/api/posts/1");
    }
}

//! Remote API surface: endpoint routes, wire payloads, the response-shape
//! adapter and the HTTP transport.
//!
//! The backend's endpoint shapes vary across deployments, so every
//! operation carries an ordered list of candidate [`Route`]s (see
//! [`routes`]) and every response flows through the [`shape`] adapter
//! before typed decoding. The [`Transport`] trait is the seam between the
//! dispatch algorithm and the wire; [`HttpTransport`] is the production
//! implementation, tests script their own.

pub mod http;
pub mod routes;
pub mod shape;

pub use http::{HttpTransport, Transport, TransportError};
pub use routes::{Method, Route};

use crate::ledger::{Approval, ContentItem, UserAccount, VoteAggregate};
use crate::types::{current_timestamp_millis, TargetId, TargetRef, TargetType, UserId};
use serde::{Deserialize, Serialize};
use std::env;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";

/// Default per-attempt request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Client configuration.
///
/// The bearer credential is supplied by the host's auth layer; this crate
/// only attaches it and reports `Unauthenticated` when the server rejects
/// it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL.
    pub base_url: String,
    /// Per-attempt request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer credential, if the host has one.
    pub bearer: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            bearer: None,
        }
    }
}

impl ClientConfig {
    /// Creates a config for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Creates a config from environment variables, falling back to
    /// defaults: `BROADSHEET_API_URL`, `BROADSHEET_API_TIMEOUT_SECS`,
    /// `BROADSHEET_API_TOKEN`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var("BROADSHEET_API_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(secs) = env::var("BROADSHEET_API_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse() {
                config.timeout_secs = secs;
            }
        }
        if let Ok(token) = env::var("BROADSHEET_API_TOKEN") {
            if !token.trim().is_empty() {
                config.bearer = Some(token);
            }
        }
        config
    }

    /// Sets the bearer credential.
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

// =============================================================================
// Wire Payloads
// =============================================================================

/// Vote endpoint response: `{score, upvotes, downvotes, user_vote}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VotePayload {
    /// upvotes - downvotes.
    pub score: i64,
    /// Number of upvotes.
    pub upvotes: u32,
    /// Number of downvotes.
    pub downvotes: u32,
    /// The caller's active vote: -1, 0 or 1.
    pub user_vote: i8,
}

impl VotePayload {
    /// Converts to a ledger aggregate, trusting the server's score.
    pub fn aggregate(&self) -> VoteAggregate {
        VoteAggregate {
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            score: self.score,
        }
    }
}

/// Like endpoint response: `{likes, liked_by_user}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LikePayload {
    /// Total like count.
    pub likes: u32,
    /// Whether the caller has the target liked.
    pub liked_by_user: bool,
}

/// A content item as reported by the server.
///
/// Deployments disagree on field names and on how the approval axis is
/// encoded (a tri-state `approval` string vs. an `is_approved` bool), so
/// everything beyond the id is optional and resolved leniently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentPayload {
    /// Target id.
    pub id: TargetId,
    /// Authoring user id.
    #[serde(default)]
    pub author_id: Option<UserId>,
    /// Body text.
    #[serde(default)]
    pub body: Option<String>,
    /// Tri-state approval, when the deployment reports one.
    #[serde(default)]
    pub approval: Option<Approval>,
    /// Boolean approval, on deployments that only report approved-or-not.
    #[serde(default)]
    pub is_approved: Option<bool>,
    /// Flag axis.
    #[serde(default, alias = "is_flagged")]
    pub flagged: Option<bool>,
    /// Creation timestamp, unix millis.
    #[serde(default)]
    pub created_at: Option<u64>,
    /// Embedded vote score, on deployments that inline aggregates.
    #[serde(default)]
    pub score: Option<i64>,
    /// Embedded upvote count.
    #[serde(default)]
    pub upvotes: Option<u32>,
    /// Embedded downvote count.
    #[serde(default)]
    pub downvotes: Option<u32>,
    /// The caller's vote, when inlined.
    #[serde(default)]
    pub user_vote: Option<i8>,
    /// Embedded like count.
    #[serde(default)]
    pub likes: Option<u32>,
    /// Whether the caller liked the target, when inlined.
    #[serde(default)]
    pub liked_by_user: Option<bool>,
}

impl ContentPayload {
    /// Resolves the approval axis across encodings.
    ///
    /// `is_approved: false` maps to pending; deployments that distinguish
    /// rejection send the tri-state field, which wins when present.
    pub fn resolved_approval(&self) -> Option<Approval> {
        self.approval.or(match self.is_approved {
            Some(true) => Some(Approval::Approved),
            Some(false) => Some(Approval::Pending),
            None => None,
        })
    }

    /// Builds a ledger item for the given target kind.
    pub fn into_item(self, target_type: TargetType) -> ContentItem {
        let approval = self.resolved_approval();
        ContentItem {
            target: TargetRef {
                target_type,
                id: self.id,
            },
            author_id: self.author_id.unwrap_or(0),
            body: self.body.unwrap_or_default(),
            approval: approval.unwrap_or(Approval::Pending),
            flagged: self.flagged.unwrap_or(false),
            created_at: self.created_at.unwrap_or_else(current_timestamp_millis),
        }
    }
}

/// A user account as reported by the server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserPayload {
    /// Account id.
    pub id: UserId,
    /// Admin role flag.
    #[serde(default)]
    pub is_admin: Option<bool>,
    /// Blocked flag.
    #[serde(default)]
    pub is_blocked: Option<bool>,
}

impl UserPayload {
    /// Builds a ledger account record, defaulting absent flags to false.
    pub fn into_account(self) -> UserAccount {
        UserAccount {
            id: self.id,
            is_admin: self.is_admin.unwrap_or(false),
            is_blocked: self.is_blocked.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 10);
        assert!(config.bearer.is_none());
    }

    #[test]
    fn test_config_with_bearer() {
        let config = ClientConfig::new("https://api.example.net").with_bearer("tok");
        assert_eq!(config.base_url, "https://api.example.net");
        assert_eq!(config.bearer.as_deref(), Some("tok"));
    }

    #[test]
    fn test_vote_payload_aggregate() {
        let payload: VotePayload =
            serde_json::from_str(r#"{"score":3,"upvotes":5,"downvotes":2,"user_vote":1}"#)
                .unwrap();
        assert_eq!(payload.aggregate().score, 3);
        assert_eq!(payload.aggregate().upvotes, 5);
    }

    #[test]
    fn test_content_payload_approval_resolution() {
        let tri: ContentPayload =
            serde_json::from_str(r#"{"id":1,"approval":"rejected","is_approved":false}"#).unwrap();
        assert_eq!(tri.resolved_approval(), Some(Approval::Rejected));

        let boolean: ContentPayload =
            serde_json::from_str(r#"{"id":1,"is_approved":true}"#).unwrap();
        assert_eq!(boolean.resolved_approval(), Some(Approval::Approved));

        let unapproved: ContentPayload =
            serde_json::from_str(r#"{"id":1,"is_approved":false}"#).unwrap();
        assert_eq!(unapproved.resolved_approval(), Some(Approval::Pending));

        let silent: ContentPayload = serde_json::from_str(r#"{"id":1}"#).unwrap();
        assert_eq!(silent.resolved_approval(), None);
    }

    #[test]
    fn test_content_payload_flag_alias() {
        let payload: ContentPayload =
            serde_json::from_str(r#"{"id":1,"is_flagged":true}"#).unwrap();
        assert_eq!(payload.flagged, Some(true));
    }

    #[test]
    fn test_content_payload_into_item() {
        let payload: ContentPayload = serde_json::from_str(
            r#"{"id":9,"author_id":4,"body":"text","approval":"approved","flagged":false,"created_at":123}"#,
        )
        .unwrap();
        let item = payload.into_item(TargetType::Comment);
        assert_eq!(item.target, TargetRef::comment(9));
        assert_eq!(item.author_id, 4);
        assert_eq!(item.approval, Approval::Approved);
        assert_eq!(item.created_at, 123);
    }
}

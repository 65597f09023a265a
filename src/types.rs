//! Core identifier and actor types shared across the ledgers.
//!
//! Every mutating call takes an explicit [`Actor`] instead of reading an
//! ambient "current user" context. The actor carries exactly the three
//! facts the guards need: who is acting (if anyone), whether they hold the
//! admin role, and whether their account is blocked.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for a user account.
pub type UserId = u64;

/// Identifier for a post or comment.
pub type TargetId = u64;

/// Kind discriminator for interaction targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    /// A top-level post.
    Post,
    /// A comment attached to a post.
    Comment,
}

impl TargetType {
    /// Returns the REST collection segment (`posts` / `comments`).
    pub fn collection(&self) -> &'static str {
        match self {
            TargetType::Post => "posts",
            TargetType::Comment => "comments",
        }
    }

    /// Returns the singular segment used by the vote endpoint family.
    pub fn singular(&self) -> &'static str {
        match self {
            TargetType::Post => "post",
            TargetType::Comment => "comment",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetType::Post => write!(f, "post"),
            TargetType::Comment => write!(f, "comment"),
        }
    }
}

/// A post or comment identified by kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    /// Target kind.
    pub target_type: TargetType,
    /// Target id.
    pub id: TargetId,
}

impl TargetRef {
    /// Creates a reference to a post.
    pub fn post(id: TargetId) -> Self {
        Self {
            target_type: TargetType::Post,
            id,
        }
    }

    /// Creates a reference to a comment.
    pub fn comment(id: TargetId) -> Self {
        Self {
            target_type: TargetType::Comment,
            id,
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.target_type, self.id)
    }
}

/// The acting user for a ledger call or dispatch.
///
/// `user_id` is `None` for anonymous visitors. The admin and blocked flags
/// come from the host's session state; the access ledger holds the
/// authoritative copies that the server reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    /// Acting user id, absent for anonymous visitors.
    pub user_id: Option<UserId>,
    /// Whether the acting user holds the admin role.
    pub is_admin: bool,
    /// Whether the acting user's account is blocked.
    pub is_blocked: bool,
}

impl Actor {
    /// An anonymous visitor.
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            is_admin: false,
            is_blocked: false,
        }
    }

    /// A signed-in regular user.
    pub fn user(id: UserId) -> Self {
        Self {
            user_id: Some(id),
            is_admin: false,
            is_blocked: false,
        }
    }

    /// A signed-in administrator.
    pub fn admin(id: UserId) -> Self {
        Self {
            user_id: Some(id),
            is_admin: true,
            is_blocked: false,
        }
    }

    /// Marks the actor's account as blocked.
    pub fn blocked(mut self) -> Self {
        self.is_blocked = true;
        self
    }

    /// Returns the user id, or `Unauthenticated` for anonymous actors.
    pub fn require_user(&self) -> Result<UserId> {
        self.user_id
            .ok_or_else(|| Error::unauthenticated("sign in to perform this action"))
    }

    /// Checks that the actor may perform a mutating action.
    ///
    /// Blocked accounts are rejected here, before any network contact.
    pub fn require_mutating(&self) -> Result<UserId> {
        let user = self.require_user()?;
        if self.is_blocked {
            return Err(Error::forbidden("account is blocked"));
        }
        Ok(user)
    }

    /// Checks that the actor holds the admin role and may act.
    pub fn require_admin(&self) -> Result<UserId> {
        let user = self.require_mutating()?;
        if !self.is_admin {
            return Err(Error::forbidden("admin role required"));
        }
        Ok(user)
    }
}

/// Returns the current unix timestamp in milliseconds.
pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

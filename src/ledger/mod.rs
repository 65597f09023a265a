//! Interaction and moderation ledgers.
//!
//! This module holds the four ledgers that make up the client's local
//! state, each owning its own records:
//!
//! - [`VoteLedger`]: one vote per (target, user), toggle-to-neutral
//! - [`LikeRegistry`]: binary like flags and counts
//! - [`ModerationState`]: approval/flag lifecycle per content item
//! - [`AccessLedger`]: block and admin-role flags per user
//!
//! [`CoreState`] bundles them so deletion cascades (content → its votes and
//! likes, user → their content, votes and likes) cross ledger boundaries in
//! one place. Views read through shared references; the sync layer applies
//! optimistic mutations and reconciles server responses.

mod access;
mod like;
mod moderation;
mod vote;

pub use access::{AccessLedger, AccessSnapshot, UserAccount};
pub use like::{LikeRegistry, LikeSnapshot};
pub use moderation::{Approval, ContentItem, ModerationSnapshot, ModerationState};
pub use vote::{VoteAggregate, VoteLedger, VoteSnapshot, VoteValue};

use crate::error::Result;
use crate::types::{Actor, TargetRef, UserId};
use std::sync::{Arc, RwLock};

/// The four ledgers, bundled for cross-ledger cascades.
#[derive(Debug, Clone, Default)]
pub struct CoreState {
    /// Vote records and aggregates.
    pub votes: VoteLedger,
    /// Like flags and counts.
    pub likes: LikeRegistry,
    /// Content items and their moderation lifecycle.
    pub moderation: ModerationState,
    /// User accounts and access flags.
    pub accounts: AccessLedger,
}

impl CoreState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deletes content and cascades removal of its vote and like records.
    pub fn delete_content(&mut self, target: TargetRef, actor: &Actor) -> Result<ContentItem> {
        let item = self.moderation.delete(target, actor)?;
        self.votes.purge_target(target);
        self.likes.purge_target(target);
        Ok(item)
    }

    /// Deletes a user and cascades: their content (with each target's votes
    /// and likes), then their own votes and likes elsewhere.
    pub fn delete_user(&mut self, user: UserId, actor: &Actor) -> Result<()> {
        self.accounts.delete(user, actor)?;
        for target in self.moderation.purge_author(user) {
            self.votes.purge_target(target);
            self.likes.purge_target(target);
        }
        self.votes.purge_user(user);
        self.likes.purge_user(user);
        Ok(())
    }
}

/// Shared handle to the core state, cloneable across views and the sync
/// layer.
pub type SharedState = Arc<RwLock<CoreState>>;

/// Creates a fresh shared state handle.
pub fn shared_state() -> SharedState {
    Arc::new(RwLock::new(CoreState::new()))
}

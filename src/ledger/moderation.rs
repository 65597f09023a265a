//! Moderation lifecycle for posts and comments.
//!
//! Each content item carries an approval state (pending/approved/rejected)
//! and an independent flagged bit. Approval transitions and flagging are
//! admin-only; deletion is allowed for the author or an admin and is
//! terminal. Deleted ids are kept as tombstones so a late transition on
//! removed content reports a conflict instead of an unknown target.
//!
//! Re-running an already-satisfied transition is a no-op that returns the
//! unchanged state.

use crate::error::{Error, Result};
use crate::types::{Actor, TargetRef, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Approval axis of the moderation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approval {
    /// Awaiting review. Initial state for new content.
    Pending,
    /// Visible to everyone.
    Approved,
    /// Hidden by an admin decision.
    Rejected,
}

impl fmt::Display for Approval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Approval::Pending => write!(f, "pending"),
            Approval::Approved => write!(f, "approved"),
            Approval::Rejected => write!(f, "rejected"),
        }
    }
}

/// A post or comment as tracked by the moderation ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Target kind and id.
    pub target: TargetRef,
    /// Authoring user.
    pub author_id: UserId,
    /// Body text.
    pub body: String,
    /// Approval axis.
    pub approval: Approval,
    /// Flag axis, independent of approval.
    pub flagged: bool,
    /// Creation timestamp, unix millis.
    pub created_at: u64,
}

impl ContentItem {
    /// Creates a new item in the initial pending/unflagged state.
    pub fn new(target: TargetRef, author_id: UserId, body: String, created_at: u64) -> Self {
        Self {
            target,
            author_id,
            body,
            approval: Approval::Pending,
            flagged: false,
            created_at,
        }
    }
}

/// Undo token for one item slot (present, absent, or tombstoned).
#[derive(Debug, Clone)]
pub struct ModerationSnapshot {
    target: TargetRef,
    item: Option<ContentItem>,
    tombstoned: bool,
}

/// Registry of content items and their moderation state.
#[derive(Debug, Clone, Default)]
pub struct ModerationState {
    items: HashMap<TargetRef, ContentItem>,
    /// Ids of deleted content. Transitions on these report a conflict.
    deleted: HashSet<TargetRef>,
}

impl ModerationState {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an item by target.
    pub fn get(&self, target: TargetRef) -> Option<&ContentItem> {
        self.items.get(&target)
    }

    /// Returns true if the target was deleted.
    pub fn is_deleted(&self, target: TargetRef) -> bool {
        self.deleted.contains(&target)
    }

    /// Number of tracked items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Registers newly created content. Fails if the id is already taken.
    pub fn admit(&mut self, item: ContentItem) -> Result<()> {
        if self.deleted.contains(&item.target) {
            return Err(Error::conflict(format!("{} was deleted", item.target)));
        }
        if self.items.contains_key(&item.target) {
            return Err(Error::conflict(format!("{} already exists", item.target)));
        }
        self.items.insert(item.target, item);
        Ok(())
    }

    /// Inserts or replaces an item with server-reported state.
    pub fn upsert_authoritative(&mut self, item: ContentItem) {
        self.deleted.remove(&item.target);
        self.items.insert(item.target, item);
    }

    /// Overwrites the approval/flag axes with server truth.
    pub fn apply_authoritative(
        &mut self,
        target: TargetRef,
        approval: Option<Approval>,
        flagged: Option<bool>,
    ) {
        if let Some(item) = self.items.get_mut(&target) {
            if let Some(approval) = approval {
                item.approval = approval;
            }
            if let Some(flagged) = flagged {
                item.flagged = flagged;
            }
        }
    }

    /// Captures one item slot for rollback.
    pub fn snapshot(&self, target: TargetRef) -> ModerationSnapshot {
        ModerationSnapshot {
            target,
            item: self.items.get(&target).cloned(),
            tombstoned: self.deleted.contains(&target),
        }
    }

    /// Restores a snapshot taken with [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snap: ModerationSnapshot) {
        match snap.item {
            Some(item) => {
                self.items.insert(snap.target, item);
            }
            None => {
                self.items.remove(&snap.target);
            }
        }
        if snap.tombstoned {
            self.deleted.insert(snap.target);
        } else {
            self.deleted.remove(&snap.target);
        }
    }

    fn item_mut(&mut self, target: TargetRef) -> Result<&mut ContentItem> {
        if self.deleted.contains(&target) {
            return Err(Error::conflict(format!("{} was deleted", target)));
        }
        self.items
            .get_mut(&target)
            .ok_or_else(|| Error::not_found(format!("no such content: {}", target)))
    }

    /// Moves a target to `Approved` from any approval state. Admin only.
    pub fn approve(&mut self, target: TargetRef, actor: &Actor) -> Result<Approval> {
        actor.require_admin()?;
        let item = self.item_mut(target)?;
        item.approval = Approval::Approved;
        Ok(item.approval)
    }

    /// Moves a target to `Rejected` from any approval state. Admin only.
    pub fn reject(&mut self, target: TargetRef, actor: &Actor) -> Result<Approval> {
        actor.require_admin()?;
        let item = self.item_mut(target)?;
        item.approval = Approval::Rejected;
        Ok(item.approval)
    }

    /// Moves an `Approved` target back to `Pending`. Admin only.
    ///
    /// Already-pending content is a no-op; rejected content cannot be
    /// unapproved.
    pub fn unapprove(&mut self, target: TargetRef, actor: &Actor) -> Result<Approval> {
        actor.require_admin()?;
        let item = self.item_mut(target)?;
        match item.approval {
            Approval::Approved => {
                item.approval = Approval::Pending;
                Ok(item.approval)
            }
            Approval::Pending => Ok(item.approval),
            Approval::Rejected => Err(Error::conflict(format!(
                "{} is rejected and cannot be unapproved",
                target
            ))),
        }
    }

    /// Sets the flag bit. Admin only, independent of the approval axis.
    pub fn flag(&mut self, target: TargetRef, actor: &Actor) -> Result<bool> {
        actor.require_admin()?;
        let item = self.item_mut(target)?;
        item.flagged = true;
        Ok(item.flagged)
    }

    /// Clears the flag bit. Admin only, independent of the approval axis.
    pub fn unflag(&mut self, target: TargetRef, actor: &Actor) -> Result<bool> {
        actor.require_admin()?;
        let item = self.item_mut(target)?;
        item.flagged = false;
        Ok(item.flagged)
    }

    /// Deletes content. Allowed for the author or an admin; terminal.
    ///
    /// Returns the removed item so the caller can cascade removal of the
    /// target's vote and like records.
    pub fn delete(&mut self, target: TargetRef, actor: &Actor) -> Result<ContentItem> {
        let user = actor.require_mutating()?;
        let item = match self.items.get(&target) {
            Some(item) => item,
            None if self.deleted.contains(&target) => {
                return Err(Error::conflict(format!("{} was already deleted", target)))
            }
            None => return Err(Error::not_found(format!("no such content: {}", target))),
        };
        if item.author_id != user && !actor.is_admin {
            return Err(Error::forbidden(
                "only the author or an admin may delete content",
            ));
        }
        self.deleted.insert(target);
        self.items
            .remove(&target)
            .ok_or_else(|| Error::not_found(format!("no such content: {}", target)))
    }

    /// Removes every item authored by a deleted user.
    ///
    /// Returns the removed targets so the caller can cascade vote/like
    /// cleanup for each.
    pub fn purge_author(&mut self, author: UserId) -> Vec<TargetRef> {
        let targets: Vec<TargetRef> = self
            .items
            .values()
            .filter(|item| item.author_id == author)
            .map(|item| item.target)
            .collect();
        for target in &targets {
            self.items.remove(target);
            self.deleted.insert(*target);
        }
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (ModerationState, TargetRef) {
        let mut state = ModerationState::new();
        let target = TargetRef::post(1);
        state
            .admit(ContentItem::new(target, 10, "hello".to_string(), 1_000))
            .unwrap();
        (state, target)
    }

    #[test]
    fn test_new_content_is_pending_unflagged() {
        let (state, target) = seeded();
        let item = state.get(target).unwrap();
        assert_eq!(item.approval, Approval::Pending);
        assert!(!item.flagged);
    }

    #[test]
    fn test_approve_is_idempotent() {
        let (mut state, target) = seeded();
        let admin = Actor::admin(1);

        assert_eq!(state.approve(target, &admin).unwrap(), Approval::Approved);
        // Second call: no-op, same resulting state.
        assert_eq!(state.approve(target, &admin).unwrap(), Approval::Approved);
    }

    #[test]
    fn test_reject_then_approve() {
        let (mut state, target) = seeded();
        let admin = Actor::admin(1);

        state.reject(target, &admin).unwrap();
        assert_eq!(state.approve(target, &admin).unwrap(), Approval::Approved);
    }

    #[test]
    fn test_unapprove_only_from_approved() {
        let (mut state, target) = seeded();
        let admin = Actor::admin(1);

        // Pending already: no-op.
        assert_eq!(state.unapprove(target, &admin).unwrap(), Approval::Pending);

        state.approve(target, &admin).unwrap();
        assert_eq!(state.unapprove(target, &admin).unwrap(), Approval::Pending);

        state.reject(target, &admin).unwrap();
        assert!(matches!(
            state.unapprove(target, &admin),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_flag_axis_independent_of_approval() {
        let (mut state, target) = seeded();
        let admin = Actor::admin(1);

        state.flag(target, &admin).unwrap();
        state.reject(target, &admin).unwrap();
        state.approve(target, &admin).unwrap();

        // Approval churn left the flag untouched.
        assert!(state.get(target).unwrap().flagged);
        state.unflag(target, &admin).unwrap();
        assert!(!state.get(target).unwrap().flagged);
    }

    #[test]
    fn test_non_admin_transitions_forbidden() {
        let (mut state, target) = seeded();
        let user = Actor::user(10);

        assert!(matches!(state.approve(target, &user), Err(Error::Forbidden(_))));
        assert!(matches!(state.reject(target, &user), Err(Error::Forbidden(_))));
        assert!(matches!(state.flag(target, &user), Err(Error::Forbidden(_))));
    }

    #[test]
    fn test_delete_by_author_and_admin() {
        let (mut state, target) = seeded();

        // A stranger cannot delete.
        assert!(matches!(
            state.delete(target, &Actor::user(99)),
            Err(Error::Forbidden(_))
        ));

        // The author can.
        state.delete(target, &Actor::user(10)).unwrap();
        assert!(state.is_deleted(target));

        // Transitions on deleted content conflict.
        assert!(matches!(
            state.approve(target, &Actor::admin(1)),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_delete_unknown_is_not_found() {
        let mut state = ModerationState::new();
        assert!(matches!(
            state.delete(TargetRef::post(404), &Actor::admin(1)),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_admit_duplicate_conflicts() {
        let (mut state, target) = seeded();
        let dup = ContentItem::new(target, 11, "again".to_string(), 2_000);
        assert!(matches!(state.admit(dup), Err(Error::Conflict(_))));
    }

    #[test]
    fn test_snapshot_restore() {
        let (mut state, target) = seeded();
        let admin = Actor::admin(1);

        let snap = state.snapshot(target);
        state.approve(target, &admin).unwrap();
        state.flag(target, &admin).unwrap();

        state.restore(snap);
        let item = state.get(target).unwrap();
        assert_eq!(item.approval, Approval::Pending);
        assert!(!item.flagged);
    }

    #[test]
    fn test_purge_author() {
        let mut state = ModerationState::new();
        for id in 1..=3u64 {
            state
                .admit(ContentItem::new(TargetRef::post(id), 10, String::new(), 0))
                .unwrap();
        }
        state
            .admit(ContentItem::new(TargetRef::post(4), 11, String::new(), 0))
            .unwrap();

        let removed = state.purge_author(10);
        assert_eq!(removed.len(), 3);
        assert_eq!(state.item_count(), 1);
        assert!(state.is_deleted(TargetRef::post(1)));
    }
}

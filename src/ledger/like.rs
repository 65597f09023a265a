//! Like registry: a strictly binary flag per (target, user).
//!
//! Unlike votes there is no neutral middle state; toggling flips the flag
//! and the count follows. Only set flags are stored, absence means
//! not-liked.

use crate::error::Result;
use crate::types::{Actor, TargetRef, UserId};
use std::collections::{HashMap, HashSet};

/// Undo token for one (target, user) like slot and its count.
#[derive(Debug, Clone)]
pub struct LikeSnapshot {
    target: TargetRef,
    user: UserId,
    liked: bool,
    count: Option<u32>,
}

/// Per-(target, user) like flags with derived counts.
#[derive(Debug, Clone, Default)]
pub struct LikeRegistry {
    /// Set like flags. Absence means not liked.
    records: HashSet<(TargetRef, UserId)>,
    /// Last known like count per target.
    counts: HashMap<TargetRef, u32>,
}

impl LikeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the user has liked the target.
    pub fn liked_by(&self, target: TargetRef, user: UserId) -> bool {
        self.records.contains(&(target, user))
    }

    /// Returns the like count for a target (zero if never seen).
    pub fn count(&self, target: TargetRef) -> u32 {
        self.counts.get(&target).copied().unwrap_or(0)
    }

    /// Captures the state needed to undo one toggle.
    pub fn snapshot(&self, target: TargetRef, user: UserId) -> LikeSnapshot {
        LikeSnapshot {
            target,
            user,
            liked: self.records.contains(&(target, user)),
            count: self.counts.get(&target).copied(),
        }
    }

    /// Restores a snapshot taken with [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snap: LikeSnapshot) {
        let key = (snap.target, snap.user);
        if snap.liked {
            self.records.insert(key);
        } else {
            self.records.remove(&key);
        }
        match snap.count {
            Some(count) => {
                self.counts.insert(snap.target, count);
            }
            None => {
                self.counts.remove(&snap.target);
            }
        }
    }

    /// Flips the caller's like flag and returns the new count.
    pub fn toggle(&mut self, target: TargetRef, actor: &Actor) -> Result<u32> {
        let user = actor.require_mutating()?;
        let key = (target, user);
        let count = self.counts.entry(target).or_insert(0);
        if self.records.remove(&key) {
            *count = count.saturating_sub(1);
        } else {
            self.records.insert(key);
            *count += 1;
        }
        Ok(*count)
    }

    /// Overwrites local state with server truth after a round trip.
    pub fn apply_authoritative(
        &mut self,
        target: TargetRef,
        count: u32,
        user: Option<UserId>,
        liked_by_user: bool,
    ) {
        self.counts.insert(target, count);
        if let Some(user) = user {
            let key = (target, user);
            if liked_by_user {
                self.records.insert(key);
            } else {
                self.records.remove(&key);
            }
        }
    }

    /// Removes all flags and the count for a deleted target.
    pub fn purge_target(&mut self, target: TargetRef) {
        self.records.retain(|(t, _)| *t != target);
        self.counts.remove(&target);
    }

    /// Removes a deleted user's likes, decrementing the counts.
    pub fn purge_user(&mut self, user: UserId) {
        let removed: Vec<TargetRef> = self
            .records
            .iter()
            .filter(|(_, u)| *u == user)
            .map(|(t, _)| *t)
            .collect();
        for target in removed {
            self.records.remove(&(target, user));
            if let Some(count) = self.counts.get_mut(&target) {
                *count = count.saturating_sub(1);
            }
        }
    }

    /// Number of set like flags.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

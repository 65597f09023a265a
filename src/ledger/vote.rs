//! Vote ledger: one vote per (target, user), toggle-to-neutral semantics.
//!
//! Neutral votes are represented by record absence. A record is only stored
//! for up/down votes; casting the same value twice removes the record, and
//! an authoritative `user_vote` of 0 clears it. Aggregates hold the server's
//! last reported counts, adjusted incrementally by optimistic casts so the
//! visible score tracks the user's intent until the round trip confirms it.

use crate::error::Result;
use crate::types::{Actor, TargetRef, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A vote value on the wire: -1, 0 or 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum VoteValue {
    /// Downvote (-1).
    Down,
    /// No vote (0). Never stored as a record.
    Neutral,
    /// Upvote (+1).
    Up,
}

impl VoteValue {
    /// Returns the wire encoding.
    pub fn as_i8(&self) -> i8 {
        match self {
            VoteValue::Down => -1,
            VoteValue::Neutral => 0,
            VoteValue::Up => 1,
        }
    }

    /// Returns true for the neutral value.
    pub fn is_neutral(&self) -> bool {
        matches!(self, VoteValue::Neutral)
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = String;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(VoteValue::Down),
            0 => Ok(VoteValue::Neutral),
            1 => Ok(VoteValue::Up),
            other => Err(format!("vote value out of range: {}", other)),
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> i8 {
        value.as_i8()
    }
}

impl fmt::Display for VoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i8())
    }
}

/// Aggregate vote counts for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAggregate {
    /// Number of upvotes.
    pub upvotes: u32,
    /// Number of downvotes.
    pub downvotes: u32,
    /// upvotes - downvotes.
    pub score: i64,
}

impl VoteAggregate {
    /// Creates an aggregate, computing the score from the counts.
    pub fn new(upvotes: u32, downvotes: u32) -> Self {
        Self {
            upvotes,
            downvotes,
            score: upvotes as i64 - downvotes as i64,
        }
    }

    /// Removes one vote's contribution from the counts.
    fn retract(&mut self, value: VoteValue) {
        match value {
            VoteValue::Up => self.upvotes = self.upvotes.saturating_sub(1),
            VoteValue::Down => self.downvotes = self.downvotes.saturating_sub(1),
            VoteValue::Neutral => {}
        }
        self.score = self.upvotes as i64 - self.downvotes as i64;
    }

    /// Adds one vote's contribution to the counts.
    fn apply(&mut self, value: VoteValue) {
        match value {
            VoteValue::Up => self.upvotes += 1,
            VoteValue::Down => self.downvotes += 1,
            VoteValue::Neutral => {}
        }
        self.score = self.upvotes as i64 - self.downvotes as i64;
    }
}

/// Undo token capturing one (target, user) slot and its aggregate.
///
/// Taken before an optimistic cast; `restore` puts both back exactly.
#[derive(Debug, Clone)]
pub struct VoteSnapshot {
    target: TargetRef,
    user: UserId,
    record: Option<VoteValue>,
    aggregate: Option<VoteAggregate>,
}

/// Per-(target, user) vote records with derived aggregates.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    /// Active non-neutral votes. Absence means neutral.
    records: HashMap<(TargetRef, UserId), VoteValue>,
    /// Last known aggregate per target (server baseline plus local drift).
    aggregates: HashMap<TargetRef, VoteAggregate>,
}

impl VoteLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the caller's active vote on a target (neutral if none).
    pub fn user_vote(&self, target: TargetRef, user: UserId) -> VoteValue {
        self.records
            .get(&(target, user))
            .copied()
            .unwrap_or(VoteValue::Neutral)
    }

    /// Returns the aggregate for a target (zero if never seen).
    pub fn aggregate(&self, target: TargetRef) -> VoteAggregate {
        self.aggregates.get(&target).copied().unwrap_or_default()
    }

    /// Captures the state needed to undo one cast.
    pub fn snapshot(&self, target: TargetRef, user: UserId) -> VoteSnapshot {
        VoteSnapshot {
            target,
            user,
            record: self.records.get(&(target, user)).copied(),
            aggregate: self.aggregates.get(&target).copied(),
        }
    }

    /// Restores a snapshot taken with [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snap: VoteSnapshot) {
        let key = (snap.target, snap.user);
        match snap.record {
            Some(value) => {
                self.records.insert(key, value);
            }
            None => {
                self.records.remove(&key);
            }
        }
        match snap.aggregate {
            Some(agg) => {
                self.aggregates.insert(snap.target, agg);
            }
            None => {
                self.aggregates.remove(&snap.target);
            }
        }
    }

    /// Casts a vote, replacing any existing vote by the same user.
    ///
    /// Casting the value already held toggles the vote off (the record is
    /// removed and the slot goes back to neutral). Returns the locally
    /// recomputed aggregate.
    pub fn cast(
        &mut self,
        target: TargetRef,
        actor: &Actor,
        value: VoteValue,
    ) -> Result<VoteAggregate> {
        let user = actor.require_mutating()?;
        let key = (target, user);
        let previous = self.records.get(&key).copied();

        // Recasting the held value toggles back to neutral.
        let effective = if previous == Some(value) {
            VoteValue::Neutral
        } else {
            value
        };

        let aggregate = self.aggregates.entry(target).or_default();
        if let Some(prev) = previous {
            aggregate.retract(prev);
        }
        aggregate.apply(effective);

        if effective.is_neutral() {
            self.records.remove(&key);
        } else {
            self.records.insert(key, effective);
        }

        Ok(*aggregate)
    }

    /// Overwrites local state with server truth after a round trip.
    ///
    /// Replaces the aggregate and, when a user is given, that user's own
    /// vote. A neutral `user_vote` clears the record rather than storing 0.
    pub fn apply_authoritative(
        &mut self,
        target: TargetRef,
        aggregate: VoteAggregate,
        user: Option<UserId>,
        user_vote: VoteValue,
    ) {
        self.aggregates.insert(target, aggregate);
        if let Some(user) = user {
            let key = (target, user);
            if user_vote.is_neutral() {
                self.records.remove(&key);
            } else {
                self.records.insert(key, user_vote);
            }
        }
    }

    /// Removes all records and the aggregate for a deleted target.
    pub fn purge_target(&mut self, target: TargetRef) {
        self.records.retain(|(t, _), _| *t != target);
        self.aggregates.remove(&target);
    }

    /// Removes a deleted user's votes, retracting them from the aggregates.
    pub fn purge_user(&mut self, user: UserId) {
        let removed: Vec<(TargetRef, VoteValue)> = self
            .records
            .iter()
            .filter(|((_, u), _)| *u == user)
            .map(|((t, _), v)| (*t, *v))
            .collect();
        for (target, value) in removed {
            self.records.remove(&(target, user));
            if let Some(agg) = self.aggregates.get_mut(&target) {
                agg.retract(value);
            }
        }
    }

    /// Number of active (non-neutral) vote records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_value_wire_encoding() {
        assert_eq!(VoteValue::Down.as_i8(), -1);
        assert_eq!(VoteValue::Neutral.as_i8(), 0);
        assert_eq!(VoteValue::Up.as_i8(), 1);
        assert_eq!(VoteValue::try_from(-1i8).unwrap(), VoteValue::Down);
        assert!(VoteValue::try_from(2i8).is_err());
    }

    #[test]
    fn test_cast_then_recast_toggles_off() {
        let mut ledger = VoteLedger::new();
        let target = TargetRef::post(1);
        let actor = Actor::user(7);

        let agg = ledger.cast(target, &actor, VoteValue::Up).unwrap();
        assert_eq!(agg, VoteAggregate::new(1, 0));
        assert_eq!(ledger.user_vote(target, 7), VoteValue::Up);

        // Same value again: back to neutral, record removed.
        let agg = ledger.cast(target, &actor, VoteValue::Up).unwrap();
        assert_eq!(agg, VoteAggregate::new(0, 0));
        assert_eq!(ledger.user_vote(target, 7), VoteValue::Neutral);
        assert_eq!(ledger.record_count(), 0);
    }

    #[test]
    fn test_cast_replaces_opposite_vote() {
        let mut ledger = VoteLedger::new();
        let target = TargetRef::post(1);
        let actor = Actor::user(7);

        ledger.cast(target, &actor, VoteValue::Up).unwrap();
        let agg = ledger.cast(target, &actor, VoteValue::Down).unwrap();

        assert_eq!(agg, VoteAggregate::new(0, 1));
        assert_eq!(ledger.user_vote(target, 7), VoteValue::Down);
        // Still exactly one record for this (target, user).
        assert_eq!(ledger.record_count(), 1);
    }

    #[test]
    fn test_guards() {
        let mut ledger = VoteLedger::new();
        let target = TargetRef::post(1);

        assert!(ledger
            .cast(target, &Actor::anonymous(), VoteValue::Up)
            .is_err());
        assert!(ledger
            .cast(target, &Actor::user(7).blocked(), VoteValue::Up)
            .is_err());
        assert_eq!(ledger.record_count(), 0);
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut ledger = VoteLedger::new();
        let target = TargetRef::comment(3);
        let actor = Actor::user(2);
        ledger.apply_authoritative(target, VoteAggregate::new(10, 4), None, VoteValue::Neutral);

        let snap = ledger.snapshot(target, 2);
        ledger.cast(target, &actor, VoteValue::Down).unwrap();
        assert_eq!(ledger.aggregate(target), VoteAggregate::new(10, 5));

        ledger.restore(snap);
        assert_eq!(ledger.aggregate(target), VoteAggregate::new(10, 4));
        assert_eq!(ledger.user_vote(target, 2), VoteValue::Neutral);
    }

    #[test]
    fn test_authoritative_overwrites_drift() {
        let mut ledger = VoteLedger::new();
        let target = TargetRef::post(5);
        let actor = Actor::user(1);

        ledger.cast(target, &actor, VoteValue::Up).unwrap();
        // Server reports different counts (other users voted meanwhile).
        ledger.apply_authoritative(target, VoteAggregate::new(12, 3), Some(1), VoteValue::Up);

        assert_eq!(ledger.aggregate(target), VoteAggregate::new(12, 3));
        assert_eq!(ledger.user_vote(target, 1), VoteValue::Up);
    }

    #[test]
    fn test_authoritative_neutral_clears_record() {
        let mut ledger = VoteLedger::new();
        let target = TargetRef::post(5);
        ledger.cast(target, &Actor::user(1), VoteValue::Up).unwrap();

        ledger.apply_authoritative(target, VoteAggregate::new(0, 0), Some(1), VoteValue::Neutral);
        assert_eq!(ledger.record_count(), 0);
    }

    #[test]
    fn test_purge_user_retracts_contributions() {
        let mut ledger = VoteLedger::new();
        let a = TargetRef::post(1);
        let b = TargetRef::post(2);
        ledger.cast(a, &Actor::user(1), VoteValue::Up).unwrap();
        ledger.cast(b, &Actor::user(1), VoteValue::Down).unwrap();
        ledger.cast(a, &Actor::user(2), VoteValue::Up).unwrap();

        ledger.purge_user(1);

        assert_eq!(ledger.aggregate(a), VoteAggregate::new(1, 0));
        assert_eq!(ledger.aggregate(b), VoteAggregate::new(0, 0));
        assert_eq!(ledger.user_vote(a, 2), VoteValue::Up);
    }
}

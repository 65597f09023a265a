//! Per-key serialization of in-flight dispatches.
//!
//! Two overlapping dispatches for the same (target, user, kind) must reach
//! the wire one at a time, in submission order, or toggles race and updates
//! get lost. Each key owns a fair async mutex: waiters wake FIFO, so queued
//! dispatches keep their submission order. Distinct keys never contend.
//!
//! The pending counter backs the views' disabled-button state: a key counts
//! as pending from the moment a dispatch is submitted until its round trip
//! resolves, queued time included.

use crate::types::{TargetRef, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// What a dispatch is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneTarget {
    /// A post or comment.
    Content(TargetRef),
    /// A user account.
    User(UserId),
}

/// Kind of remote operation, part of the serialization key.
///
/// A vote and a like on the same target by the same user may fly
/// concurrently; two votes may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Vote,
    Like,
    Approval,
    Flag,
    DeleteContent,
    Block,
    AdminRole,
    DeleteUser,
    Create,
    Refresh,
}

/// Serialization key for one stream of dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpKey {
    /// Dispatch target.
    pub target: LaneTarget,
    /// Acting user, absent for anonymous reads.
    pub user: Option<UserId>,
    /// Operation kind.
    pub kind: OpKind,
}

impl OpKey {
    /// Key for an operation on a post or comment.
    pub fn content(target: TargetRef, user: Option<UserId>, kind: OpKind) -> Self {
        Self {
            target: LaneTarget::Content(target),
            user,
            kind,
        }
    }

    /// Key for an operation on a user account.
    pub fn user(target: UserId, acting: Option<UserId>, kind: OpKind) -> Self {
        Self {
            target: LaneTarget::User(target),
            user: acting,
            kind,
        }
    }
}

#[derive(Debug, Default)]
struct LanesInner {
    /// One fair mutex per active key.
    lanes: Mutex<HashMap<OpKey, Arc<AsyncMutex<()>>>>,
    /// Submitted-but-unresolved dispatch count per key.
    pending: Mutex<HashMap<OpKey, usize>>,
}

/// Registry of per-key dispatch lanes.
#[derive(Debug, Clone, Default)]
pub struct OpLanes {
    inner: Arc<LanesInner>,
}

impl OpLanes {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the key pending and waits for its lane.
    ///
    /// The returned guard holds the lane until dropped; dropping it also
    /// clears the pending mark once no other dispatch waits on the key.
    pub async fn acquire(&self, key: OpKey) -> LaneGuard {
        let lane = {
            let mut lanes = self
                .inner
                .lanes
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            // Drop lanes nobody holds or waits on.
            lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            Arc::clone(
                lanes
                    .entry(key)
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        {
            let mut pending = self
                .inner
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            *pending.entry(key).or_insert(0) += 1;
        }

        let permit = lane.lock_owned().await;
        LaneGuard {
            key,
            inner: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Whether any dispatch for this key is queued or in flight.
    pub fn is_pending(&self, key: &OpKey) -> bool {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
            > 0
    }
}

/// Holds one key's lane for the duration of a dispatch.
pub struct LaneGuard {
    key: OpKey,
    inner: Arc<LanesInner>,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(count) = pending.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                pending.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_pending_tracks_guard_lifetime() {
        let lanes = OpLanes::new();
        let key = OpKey::content(TargetRef::post(1), Some(7), OpKind::Vote);

        assert!(!lanes.is_pending(&key));
        let guard = lanes.acquire(key).await;
        assert!(lanes.is_pending(&key));
        drop(guard);
        assert!(!lanes.is_pending(&key));
    }

    #[tokio::test]
    async fn test_same_key_serializes_in_submission_order() {
        let lanes = OpLanes::new();
        let key = OpKey::content(TargetRef::post(1), Some(7), OpKind::Like);
        let order = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for i in 0..4usize {
            let lanes = lanes.clone();
            let order = Arc::clone(&order);
            let running = Arc::clone(&running);
            handles.push(tokio::spawn(async move {
                let _guard = lanes.acquire(key).await;
                // Nobody else may hold this lane at the same time.
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                order.lock().unwrap().push(i);
            }));
            // Stagger submissions so the expected order is deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let lanes = OpLanes::new();
        let vote = OpKey::content(TargetRef::post(1), Some(7), OpKind::Vote);
        let like = OpKey::content(TargetRef::post(1), Some(7), OpKind::Like);

        let _vote_guard = lanes.acquire(vote).await;
        // A like on the same target by the same user proceeds immediately.
        let _like_guard = lanes.acquire(like).await;

        assert!(lanes.is_pending(&vote));
        assert!(lanes.is_pending(&like));
    }
}

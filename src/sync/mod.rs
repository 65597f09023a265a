//! Sync coordinator: optimistic mutations reconciled against server truth.
//!
//! Every user action follows the same dispatch shape:
//!
//! 1. guard checks (signed in, not blocked, role), run before any network
//!    contact,
//! 2. optimistic mutation of the owning ledger, with an undo captured,
//! 3. the remote call, tried against an ordered list of endpoint
//!    candidates,
//! 4. on success, the server payload overwrites the optimistic values; on
//!    any failure the undo restores the last known-good state.
//!
//! Network failures, timeouts, 404s and 5xx fall through to the next
//! candidate; 401/403/409 abort immediately. Dispatches for the same
//! (target, user, kind) key are serialized in submission order (see
//! [`lanes`]); everything else runs concurrently.
//!
//! The coordinator owns no domain state of its own: the ledgers hold the
//! records, the coordinator only mediates.
//!
//! Hosts usually spawn dispatches rather than await them in view code, so
//! navigating away from a view does not abort the round trip: the
//! authoritative result still lands in the ledgers and an unmounted view
//! simply never reads it.

mod lanes;

pub use lanes::{LaneGuard, LaneTarget, OpKey, OpKind, OpLanes};

use crate::api::routes::{self, Route};
use crate::api::{
    shape, ClientConfig, ContentPayload, HttpTransport, LikePayload, Transport, UserPayload,
    VotePayload,
};
use crate::error::{Error, Result};
use crate::ledger::{
    shared_state, Approval, ContentItem, CoreState, SharedState, UserAccount, VoteAggregate,
    VoteValue,
};
use crate::types::{Actor, TargetId, TargetRef, TargetType, UserId};
use serde_json::{json, Value};
use std::sync::{RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, instrument, warn};

/// Coordinator over the production HTTP transport.
pub type HttpSyncCoordinator = SyncCoordinator<HttpTransport>;

/// Mediates between the ledgers and the remote API.
pub struct SyncCoordinator<T: Transport> {
    state: SharedState,
    transport: T,
    lanes: OpLanes,
}

impl SyncCoordinator<HttpTransport> {
    /// Creates a coordinator speaking HTTP per the given configuration.
    pub fn connect(config: &ClientConfig) -> Self {
        Self::new(HttpTransport::new(config))
    }
}

impl<T: Transport> SyncCoordinator<T> {
    /// Creates a coordinator with fresh state over the given transport.
    pub fn new(transport: T) -> Self {
        Self::with_state(shared_state(), transport)
    }

    /// Creates a coordinator over existing shared state.
    pub fn with_state(state: SharedState, transport: T) -> Self {
        Self {
            state,
            transport,
            lanes: OpLanes::new(),
        }
    }

    /// Returns the shared state handle for views to read through.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    // =========================================================================
    // Lock Helpers (Handle Poisoning Gracefully)
    // =========================================================================

    fn read_state(&self) -> RwLockReadGuard<'_, CoreState> {
        self.state.read().unwrap_or_else(|poisoned| {
            error!("state lock was poisoned on read, recovering");
            poisoned.into_inner()
        })
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CoreState> {
        self.state.write().unwrap_or_else(|poisoned| {
            error!("state lock was poisoned on write, recovering");
            poisoned.into_inner()
        })
    }

    // =========================================================================
    // Read Accessors
    // =========================================================================

    /// Current aggregate for a target.
    pub fn vote_aggregate(&self, target: TargetRef) -> VoteAggregate {
        self.read_state().votes.aggregate(target)
    }

    /// The user's active vote on a target.
    pub fn user_vote(&self, target: TargetRef, user: UserId) -> VoteValue {
        self.read_state().votes.user_vote(target, user)
    }

    /// Current like count for a target.
    pub fn like_count(&self, target: TargetRef) -> u32 {
        self.read_state().likes.count(target)
    }

    /// Whether the user has the target liked.
    pub fn liked_by(&self, target: TargetRef, user: UserId) -> bool {
        self.read_state().likes.liked_by(target, user)
    }

    /// A content item, if tracked.
    pub fn content(&self, target: TargetRef) -> Option<ContentItem> {
        self.read_state().moderation.get(target).cloned()
    }

    /// A user account, if tracked.
    pub fn account(&self, user: UserId) -> Option<UserAccount> {
        self.read_state().accounts.get(user)
    }

    /// Whether any dispatch for this key is queued or in flight. Views use
    /// this to disable the triggering control until the key settles.
    pub fn is_pending(&self, key: &OpKey) -> bool {
        self.lanes.is_pending(key)
    }

    /// Pending check for a user's vote control on a target.
    pub fn vote_pending(&self, target: TargetRef, user: UserId) -> bool {
        self.is_pending(&OpKey::content(target, Some(user), OpKind::Vote))
    }

    /// Pending check for a user's like control on a target.
    pub fn like_pending(&self, target: TargetRef, user: UserId) -> bool {
        self.is_pending(&OpKey::content(target, Some(user), OpKind::Like))
    }

    // =========================================================================
    // Candidate Loop
    // =========================================================================

    /// Tries each endpoint candidate in order and returns the first
    /// success payload.
    ///
    /// Fallback-eligible failures (404, 5xx, network) move to the next
    /// candidate; 401/403/409 abort the operation. When every candidate
    /// fails the last observed cause is reported.
    async fn run_candidates(
        &self,
        op: &'static str,
        candidates: &[Route],
        body: Option<&Value>,
    ) -> Result<Value> {
        let mut last_error: Option<String> = None;
        let mut attempts: u32 = 0;

        for route in candidates {
            attempts += 1;
            debug!(op, %route, attempt = attempts, "dispatching");
            match self.transport.execute(route, body).await {
                Ok(payload) => {
                    if attempts > 1 {
                        info!(op, %route, "fallback endpoint candidate answered");
                    }
                    return Ok(payload);
                }
                Err(err) if err.allows_fallback() => {
                    warn!(op, %route, error = %err, "endpoint candidate failed, trying next");
                    last_error = Some(err.to_string());
                }
                Err(err) => {
                    warn!(op, %route, error = %err, "aborting dispatch");
                    return Err(err.into());
                }
            }
        }

        Err(Error::SyncFailed {
            attempts,
            last_error: last_error.unwrap_or_else(|| "no endpoint candidates".to_string()),
        })
    }

    // =========================================================================
    // Votes and Likes
    // =========================================================================

    /// Casts a vote and syncs it.
    ///
    /// Recasting the held value toggles back to neutral. Returns the
    /// server-confirmed aggregate.
    #[instrument(skip(self), fields(target = %target, value = %value))]
    pub async fn cast_vote(
        &self,
        actor: &Actor,
        target: TargetRef,
        value: VoteValue,
    ) -> Result<VoteAggregate> {
        let user = actor.require_mutating()?;
        let _lane = self
            .lanes
            .acquire(OpKey::content(target, Some(user), OpKind::Vote))
            .await;

        // Optimistic cast; the effective value after toggle semantics is
        // what goes on the wire.
        let (snapshot, sent_value) = {
            let mut state = self.write_state();
            let snapshot = state.votes.snapshot(target, user);
            state.votes.cast(target, actor, value)?;
            (snapshot, state.votes.user_vote(target, user))
        };

        let body = json!({ "target_id": target.id, "value": sent_value.as_i8() });
        let outcome = self
            .run_candidates("vote", &routes::vote(target), Some(&body))
            .await
            .and_then(|payload| shape::decode::<VotePayload>(shape::normalize_object(payload)));

        match outcome {
            Ok(payload) => {
                // An out-of-range user_vote from a lenient backend reads
                // as neutral rather than failing the reconcile.
                let user_vote =
                    VoteValue::try_from(payload.user_vote).unwrap_or(VoteValue::Neutral);
                let mut state = self.write_state();
                state
                    .votes
                    .apply_authoritative(target, payload.aggregate(), Some(user), user_vote);
                Ok(state.votes.aggregate(target))
            }
            Err(err) => {
                self.write_state().votes.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Toggles a like and syncs it. Returns the server-confirmed count.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn toggle_like(&self, actor: &Actor, target: TargetRef) -> Result<u32> {
        let user = actor.require_mutating()?;
        let _lane = self
            .lanes
            .acquire(OpKey::content(target, Some(user), OpKind::Like))
            .await;

        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.likes.snapshot(target, user);
            state.likes.toggle(target, actor)?;
            snapshot
        };

        let body = json!({ "target_id": target.id });
        let outcome = self
            .run_candidates("like", &routes::like(target), Some(&body))
            .await
            .and_then(|payload| shape::decode::<LikePayload>(shape::normalize_object(payload)));

        match outcome {
            Ok(payload) => {
                let mut state = self.write_state();
                state.likes.apply_authoritative(
                    target,
                    payload.likes,
                    Some(user),
                    payload.liked_by_user,
                );
                Ok(state.likes.count(target))
            }
            Err(err) => {
                self.write_state().likes.restore(snapshot);
                Err(err)
            }
        }
    }

    // =========================================================================
    // Moderation
    // =========================================================================

    /// Approves content. Admin only, idempotent.
    pub async fn approve(&self, actor: &Actor, target: TargetRef) -> Result<Approval> {
        self.set_approval(actor, target, Approval::Approved).await
    }

    /// Rejects content. Admin only, idempotent.
    pub async fn reject(&self, actor: &Actor, target: TargetRef) -> Result<Approval> {
        self.set_approval(actor, target, Approval::Rejected).await
    }

    /// Moves approved content back to pending. Admin only.
    pub async fn unapprove(&self, actor: &Actor, target: TargetRef) -> Result<Approval> {
        self.set_approval(actor, target, Approval::Pending).await
    }

    #[instrument(skip(self), fields(target = %target, desired = %desired))]
    async fn set_approval(
        &self,
        actor: &Actor,
        target: TargetRef,
        desired: Approval,
    ) -> Result<Approval> {
        actor.require_admin()?;
        let _lane = self
            .lanes
            .acquire(OpKey::content(target, actor.user_id, OpKind::Approval))
            .await;

        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.moderation.snapshot(target);
            match desired {
                Approval::Approved => state.moderation.approve(target, actor)?,
                Approval::Rejected => state.moderation.reject(target, actor)?,
                Approval::Pending => state.moderation.unapprove(target, actor)?,
            };
            snapshot
        };

        let body = json!({
            "is_approved": desired == Approval::Approved,
            "approval": desired,
        });
        let outcome = self
            .run_candidates("approval", &routes::approve(target), Some(&body))
            .await;

        match outcome {
            Ok(payload) => {
                let mut state = self.write_state();
                self.reconcile_content(&mut state, target, payload);
                Ok(state
                    .moderation
                    .get(target)
                    .map(|item| item.approval)
                    .unwrap_or(desired))
            }
            Err(err) => {
                self.write_state().moderation.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Flags content. Admin only, independent of the approval axis.
    pub async fn flag(&self, actor: &Actor, target: TargetRef) -> Result<bool> {
        self.set_flag(actor, target, true).await
    }

    /// Clears a content flag. Admin only.
    pub async fn unflag(&self, actor: &Actor, target: TargetRef) -> Result<bool> {
        self.set_flag(actor, target, false).await
    }

    #[instrument(skip(self), fields(target = %target))]
    async fn set_flag(&self, actor: &Actor, target: TargetRef, flagged: bool) -> Result<bool> {
        actor.require_admin()?;
        let _lane = self
            .lanes
            .acquire(OpKey::content(target, actor.user_id, OpKind::Flag))
            .await;

        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.moderation.snapshot(target);
            if flagged {
                state.moderation.flag(target, actor)?;
            } else {
                state.moderation.unflag(target, actor)?;
            }
            snapshot
        };

        let body = json!({ "is_flagged": flagged });
        let outcome = self
            .run_candidates("flag", &routes::flag(target), Some(&body))
            .await;

        match outcome {
            Ok(payload) => {
                let mut state = self.write_state();
                self.reconcile_content(&mut state, target, payload);
                Ok(state
                    .moderation
                    .get(target)
                    .map(|item| item.flagged)
                    .unwrap_or(flagged))
            }
            Err(err) => {
                self.write_state().moderation.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Deletes content. Author or admin; terminal; cascades the removal of
    /// the target's vote and like records.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn delete_content(&self, actor: &Actor, target: TargetRef) -> Result<()> {
        actor.require_mutating()?;
        let _lane = self
            .lanes
            .acquire(OpKey::content(target, actor.user_id, OpKind::DeleteContent))
            .await;

        // The cascade spans three ledgers, so the undo is a full copy.
        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.clone();
            state.delete_content(target, actor)?;
            snapshot
        };

        match self
            .run_candidates("delete-content", &routes::delete_content(target), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                *self.write_state() = snapshot;
                Err(err)
            }
        }
    }

    /// Applies a lenient content payload to the moderation ledger.
    ///
    /// An empty success body confirms the optimistic value as
    /// authoritative; a recognizable payload overwrites it.
    fn reconcile_content(&self, state: &mut CoreState, target: TargetRef, payload: Value) {
        if payload.is_null() {
            return;
        }
        match shape::decode::<ContentPayload>(shape::normalize_object(payload)) {
            Ok(payload) => {
                let approval = payload.resolved_approval();
                let flagged = payload.flagged;
                state.moderation.apply_authoritative(target, approval, flagged);
            }
            Err(err) => {
                debug!(%target, error = %err, "ignoring unrecognized moderation payload");
            }
        }
    }

    // =========================================================================
    // Accounts
    // =========================================================================

    /// Blocks a user. Admin only.
    pub async fn block_user(&self, actor: &Actor, user: UserId) -> Result<UserAccount> {
        self.set_blocked(actor, user, true).await
    }

    /// Unblocks a user. Admin only.
    pub async fn unblock_user(&self, actor: &Actor, user: UserId) -> Result<UserAccount> {
        self.set_blocked(actor, user, false).await
    }

    #[instrument(skip(self))]
    async fn set_blocked(&self, actor: &Actor, user: UserId, blocked: bool) -> Result<UserAccount> {
        actor.require_admin()?;
        let _lane = self
            .lanes
            .acquire(OpKey::user(user, actor.user_id, OpKind::Block))
            .await;

        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.accounts.snapshot(user);
            if blocked {
                state.accounts.block(user, actor)?;
            } else {
                state.accounts.unblock(user, actor)?;
            }
            snapshot
        };

        let body = json!({ "is_blocked": blocked });
        let outcome = self
            .run_candidates("block", &routes::block(user), Some(&body))
            .await;

        match outcome {
            Ok(payload) => {
                let mut state = self.write_state();
                self.reconcile_account(&mut state, user, payload);
                Ok(state
                    .accounts
                    .get(user)
                    .unwrap_or_else(|| UserAccount::new(user)))
            }
            Err(err) => {
                self.write_state().accounts.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Grants the admin role. Admin only.
    pub async fn grant_admin(&self, actor: &Actor, user: UserId) -> Result<UserAccount> {
        self.set_admin(actor, user, true).await
    }

    /// Revokes the admin role. Admin only; self-revocation is forbidden.
    pub async fn revoke_admin(&self, actor: &Actor, user: UserId) -> Result<UserAccount> {
        self.set_admin(actor, user, false).await
    }

    #[instrument(skip(self))]
    async fn set_admin(&self, actor: &Actor, user: UserId, admin: bool) -> Result<UserAccount> {
        actor.require_admin()?;
        let _lane = self
            .lanes
            .acquire(OpKey::user(user, actor.user_id, OpKind::AdminRole))
            .await;

        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.accounts.snapshot(user);
            if admin {
                state.accounts.grant_admin(user, actor)?;
            } else {
                state.accounts.revoke_admin(user, actor)?;
            }
            snapshot
        };

        let body = json!({ "is_admin": admin });
        let outcome = self
            .run_candidates("admin-role", &routes::admin_role(user), Some(&body))
            .await;

        match outcome {
            Ok(payload) => {
                let mut state = self.write_state();
                self.reconcile_account(&mut state, user, payload);
                Ok(state
                    .accounts
                    .get(user)
                    .unwrap_or_else(|| UserAccount::new(user)))
            }
            Err(err) => {
                self.write_state().accounts.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Deletes a user account. Admin or self; cascades their content,
    /// votes and likes.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, actor: &Actor, user: UserId) -> Result<()> {
        actor.require_user()?;
        let _lane = self
            .lanes
            .acquire(OpKey::user(user, actor.user_id, OpKind::DeleteUser))
            .await;

        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.clone();
            state.delete_user(user, actor)?;
            snapshot
        };

        match self
            .run_candidates("delete-user", &routes::delete_user(user), None)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                *self.write_state() = snapshot;
                Err(err)
            }
        }
    }

    fn reconcile_account(&self, state: &mut CoreState, user: UserId, payload: Value) {
        if payload.is_null() {
            return;
        }
        match shape::decode::<UserPayload>(shape::normalize_object(payload)) {
            Ok(payload) => {
                state
                    .accounts
                    .apply_authoritative(user, payload.is_admin, payload.is_blocked);
            }
            Err(err) => {
                debug!(user, error = %err, "ignoring unrecognized account payload");
            }
        }
    }

    // =========================================================================
    // Content Creation and Refresh
    // =========================================================================

    /// Creates a post. The server assigns the id; the item is admitted
    /// locally from the authoritative payload, pending unless the server
    /// says otherwise.
    #[instrument(skip(self, body))]
    pub async fn create_post(&self, actor: &Actor, body: impl Into<String>) -> Result<ContentItem> {
        let user = actor.require_mutating()?;
        let _lane = self
            .lanes
            .acquire(OpKey::user(user, Some(user), OpKind::Create))
            .await;

        let request = json!({ "body": body.into() });
        let payload = self
            .run_candidates("create-post", &routes::create_post(), Some(&request))
            .await?;
        self.admit_created(TargetType::Post, user, payload)
    }

    /// Creates a comment under a post.
    #[instrument(skip(self, body))]
    pub async fn create_comment(
        &self,
        actor: &Actor,
        post_id: TargetId,
        body: impl Into<String>,
    ) -> Result<ContentItem> {
        let user = actor.require_mutating()?;
        let _lane = self
            .lanes
            .acquire(OpKey::user(user, Some(user), OpKind::Create))
            .await;

        let request = json!({ "post_id": post_id, "body": body.into() });
        let payload = self
            .run_candidates(
                "create-comment",
                &routes::create_comment(post_id),
                Some(&request),
            )
            .await?;
        self.admit_created(TargetType::Comment, user, payload)
    }

    fn admit_created(
        &self,
        target_type: TargetType,
        author: UserId,
        payload: Value,
    ) -> Result<ContentItem> {
        let payload: ContentPayload = shape::decode(shape::normalize_object(payload))?;
        let author = payload.author_id.unwrap_or(author);
        let embedded = payload.clone();
        let mut item = payload.into_item(target_type);
        item.author_id = author;

        let mut state = self.write_state();
        state.moderation.admit(item.clone())?;
        apply_embedded_interactions(&mut state, item.target, &embedded, Some(author));
        Ok(item)
    }

    /// Fetches one target's authoritative state and applies it.
    ///
    /// This is the explicit refresh path: no optimistic phase, no
    /// rollback, just server truth into the ledgers.
    #[instrument(skip(self), fields(target = %target))]
    pub async fn refresh_target(&self, actor: &Actor, target: TargetRef) -> Result<ContentItem> {
        let _lane = self
            .lanes
            .acquire(OpKey::content(target, actor.user_id, OpKind::Refresh))
            .await;

        let payload = self
            .run_candidates("refresh", &routes::fetch_target(target), None)
            .await?;
        let payload: ContentPayload = shape::decode(shape::normalize_object(payload))?;

        let mut state = self.write_state();
        let item = ContentItem {
            target,
            ..payload.clone().into_item(target.target_type)
        };
        state.moderation.upsert_authoritative(item.clone());
        apply_embedded_interactions(&mut state, target, &payload, actor.user_id);
        Ok(item)
    }

    /// Fetches the post listing and applies every recognizable entry.
    ///
    /// Unrecognizable entries are skipped with a warning rather than
    /// failing the whole refresh.
    #[instrument(skip(self))]
    pub async fn refresh_posts(&self, actor: &Actor) -> Result<Vec<ContentItem>> {
        let payload = self
            .run_candidates("refresh-posts", &routes::list_posts(), None)
            .await?;

        let mut items = Vec::new();
        let mut state = self.write_state();
        for entry in shape::normalize_collection(payload) {
            let payload = match shape::decode::<ContentPayload>(entry) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(error = %err, "skipping unrecognizable post entry");
                    continue;
                }
            };
            let item = payload.clone().into_item(TargetType::Post);
            state.moderation.upsert_authoritative(item.clone());
            apply_embedded_interactions(&mut state, item.target, &payload, actor.user_id);
            items.push(item);
        }

        info!(count = items.len(), "post listing refreshed");
        Ok(items)
    }
}

/// Applies aggregates inlined in a content payload to the vote and like
/// ledgers.
fn apply_embedded_interactions(
    state: &mut CoreState,
    target: TargetRef,
    payload: &ContentPayload,
    user: Option<UserId>,
) {
    if let (Some(upvotes), Some(downvotes)) = (payload.upvotes, payload.downvotes) {
        let aggregate = VoteAggregate {
            upvotes,
            downvotes,
            score: payload
                .score
                .unwrap_or(upvotes as i64 - downvotes as i64),
        };
        let user_vote = payload
            .user_vote
            .and_then(|v| VoteValue::try_from(v).ok())
            .unwrap_or(VoteValue::Neutral);
        state
            .votes
            .apply_authoritative(target, aggregate, user, user_vote);
    }
    if let Some(likes) = payload.likes {
        state.likes.apply_authoritative(
            target,
            likes,
            user,
            payload.liked_by_user.unwrap_or(false),
        );
    }
}

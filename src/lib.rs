//! # Broadsheet Client Core
//!
//! Client-side interaction and moderation state for the Broadsheet
//! publishing platform. Views (post lists, single-post pages, comment
//! threads, the admin dashboard) render from one set of ledgers and push
//! every user action through one dispatch path, so vote tallies, like
//! counts and moderation status stay consistent everywhere.
//!
//! ## Architecture
//!
//! - **Ledgers** ([`ledger`]): vote records and aggregates, like flags and
//!   counts, the content moderation lifecycle, and user access flags. Each
//!   ledger owns its records exclusively.
//! - **Sync** ([`sync`]): the [`SyncCoordinator`] applies an optimistic
//!   mutation, sends the remote operation against an ordered list of
//!   endpoint candidates, and either reconciles the authoritative response
//!   or rolls the mutation back. Dispatches for the same (target, user,
//!   kind) are serialized in submission order.
//! - **API** ([`api`]): endpoint candidates, wire payloads, the
//!   response-shape adapter, and the HTTP transport.
//!
//! ## Example
//!
//! ```no_run
//! use broadsheet::api::ClientConfig;
//! use broadsheet::sync::SyncCoordinator;
//! use broadsheet::{Actor, TargetRef, VoteValue};
//!
//! # async fn example() -> broadsheet::Result<()> {
//! let config = ClientConfig::new("https://broadsheet.example.net/api").with_bearer("token");
//! let client = SyncCoordinator::connect(&config);
//!
//! let actor = Actor::user(42);
//! let post = TargetRef::post(17);
//!
//! // Optimistic locally, confirmed by the server round trip.
//! let aggregate = client.cast_vote(&actor, post, VoteValue::Up).await?;
//! println!("score is now {}", aggregate.score);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod error;
pub mod ledger;
pub mod sync;
pub mod types;

pub use error::{Error, Result};
pub use ledger::{
    AccessLedger, Approval, ContentItem, CoreState, LikeRegistry, ModerationState, SharedState,
    UserAccount, VoteAggregate, VoteLedger, VoteValue,
};
pub use sync::{HttpSyncCoordinator, OpKey, OpKind, SyncCoordinator};
pub use types::{Actor, TargetId, TargetRef, TargetType, UserId};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! User account flags: block/unblock and the admin role.
//!
//! Both axes are admin-only. An admin may not revoke their own role, so a
//! misclick cannot leave the system without an administrator. Blocking does
//! not touch the user's past content; it only gates future mutating
//! dispatches (enforced at the guard layer before any network contact).

use crate::error::{Error, Result};
use crate::types::{Actor, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A user account as tracked by the access ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Account id.
    pub id: UserId,
    /// Whether the account holds the admin role.
    pub is_admin: bool,
    /// Whether the account is blocked from mutating actions.
    pub is_blocked: bool,
}

impl UserAccount {
    /// Creates a regular, unblocked account record.
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            is_admin: false,
            is_blocked: false,
        }
    }
}

/// Undo token for one account slot.
#[derive(Debug, Clone)]
pub struct AccessSnapshot {
    user: UserId,
    account: Option<UserAccount>,
}

/// Registry of user accounts and their access flags.
#[derive(Debug, Clone, Default)]
pub struct AccessLedger {
    accounts: HashMap<UserId, UserAccount>,
}

impl AccessLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an account record, if known.
    pub fn get(&self, user: UserId) -> Option<UserAccount> {
        self.accounts.get(&user).copied()
    }

    /// Number of tracked accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Inserts or replaces an account with server-reported state.
    pub fn upsert_authoritative(&mut self, account: UserAccount) {
        self.accounts.insert(account.id, account);
    }

    /// Overwrites individual flags with server truth.
    pub fn apply_authoritative(
        &mut self,
        user: UserId,
        is_admin: Option<bool>,
        is_blocked: Option<bool>,
    ) {
        let account = self.accounts.entry(user).or_insert_with(|| UserAccount::new(user));
        if let Some(is_admin) = is_admin {
            account.is_admin = is_admin;
        }
        if let Some(is_blocked) = is_blocked {
            account.is_blocked = is_blocked;
        }
    }

    /// Captures one account slot for rollback.
    pub fn snapshot(&self, user: UserId) -> AccessSnapshot {
        AccessSnapshot {
            user,
            account: self.accounts.get(&user).copied(),
        }
    }

    /// Restores a snapshot taken with [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snap: AccessSnapshot) {
        match snap.account {
            Some(account) => {
                self.accounts.insert(snap.user, account);
            }
            None => {
                self.accounts.remove(&snap.user);
            }
        }
    }

    /// Blocks a user. Admin only. Idempotent.
    pub fn block(&mut self, user: UserId, actor: &Actor) -> Result<UserAccount> {
        actor.require_admin()?;
        let account = self.accounts.entry(user).or_insert_with(|| UserAccount::new(user));
        account.is_blocked = true;
        Ok(*account)
    }

    /// Unblocks a user. Admin only. Idempotent.
    pub fn unblock(&mut self, user: UserId, actor: &Actor) -> Result<UserAccount> {
        actor.require_admin()?;
        let account = self.accounts.entry(user).or_insert_with(|| UserAccount::new(user));
        account.is_blocked = false;
        Ok(*account)
    }

    /// Grants the admin role. Admin only. Idempotent.
    pub fn grant_admin(&mut self, user: UserId, actor: &Actor) -> Result<UserAccount> {
        actor.require_admin()?;
        let account = self.accounts.entry(user).or_insert_with(|| UserAccount::new(user));
        account.is_admin = true;
        Ok(*account)
    }

    /// Revokes the admin role. Admin only; self-revocation is forbidden.
    pub fn revoke_admin(&mut self, user: UserId, actor: &Actor) -> Result<UserAccount> {
        let acting = actor.require_admin()?;
        if acting == user {
            return Err(Error::forbidden("admins may not revoke their own role"));
        }
        let account = self.accounts.entry(user).or_insert_with(|| UserAccount::new(user));
        account.is_admin = false;
        Ok(*account)
    }

    /// Deletes an account. Allowed for an admin or the user themself.
    pub fn delete(&mut self, user: UserId, actor: &Actor) -> Result<()> {
        let acting = actor.require_user()?;
        if acting != user && !actor.is_admin {
            return Err(Error::forbidden(
                "only an admin or the account owner may delete an account",
            ));
        }
        if actor.is_blocked && acting != user {
            return Err(Error::forbidden("account is blocked"));
        }
        self.accounts
            .remove(&user)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("no such user: {}", user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_unblock() {
        let mut ledger = AccessLedger::new();
        let admin = Actor::admin(1);

        let account = ledger.block(7, &admin).unwrap();
        assert!(account.is_blocked);

        // Idempotent.
        assert!(ledger.block(7, &admin).unwrap().is_blocked);

        let account = ledger.unblock(7, &admin).unwrap();
        assert!(!account.is_blocked);
    }

    #[test]
    fn test_non_admin_cannot_block() {
        let mut ledger = AccessLedger::new();
        assert!(matches!(
            ledger.block(7, &Actor::user(2)),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_grant_and_revoke_admin() {
        let mut ledger = AccessLedger::new();
        let admin = Actor::admin(1);

        assert!(ledger.grant_admin(7, &admin).unwrap().is_admin);
        assert!(!ledger.revoke_admin(7, &admin).unwrap().is_admin);
    }

    #[test]
    fn test_self_revocation_forbidden() {
        let mut ledger = AccessLedger::new();
        ledger.upsert_authoritative(UserAccount {
            id: 1,
            is_admin: true,
            is_blocked: false,
        });

        let admin = Actor::admin(1);
        assert!(matches!(
            ledger.revoke_admin(1, &admin),
            Err(Error::Forbidden(_))
        ));
        // Role unchanged.
        assert!(ledger.get(1).unwrap().is_admin);
    }

    #[test]
    fn test_delete_by_self_and_admin() {
        let mut ledger = AccessLedger::new();
        ledger.upsert_authoritative(UserAccount::new(7));
        ledger.upsert_authoritative(UserAccount::new(8));

        // Self-delete.
        ledger.delete(7, &Actor::user(7)).unwrap();
        assert!(ledger.get(7).is_none());

        // A stranger cannot delete.
        assert!(matches!(
            ledger.delete(8, &Actor::user(9)),
            Err(Error::Forbidden(_))
        ));

        // An admin can.
        ledger.delete(8, &Actor::admin(1)).unwrap();
        assert_eq!(ledger.account_count(), 0);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut ledger = AccessLedger::new();
        let snap = ledger.snapshot(7);
        ledger.block(7, &Actor::admin(1)).unwrap();

        ledger.restore(snap);
        assert!(ledger.get(7).is_none());
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Persistence Contract

//! Persistence contract consumed by the economy core.
//!
//! RULE: only the ledger mutator writes user records, and it writes them
//! exclusively through [`EconomyStore::commit`]. A commit carries the new
//! state together with every ledger entry and audit event it produced; the
//! store applies it all-or-nothing and only if the stored version still
//! matches `expected_version`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AuditEvent, Currency, Direction, LedgerEntry, LedgerSource, UserEconomyState, UserId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("user {0} already exists")]
    AlreadyExists(UserId),

    #[error("version conflict on {user_id}: expected {expected}, found {found}")]
    VersionConflict {
        user_id: UserId,
        expected: u64,
        found: u64,
    },
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// One atomic write of a user record and everything it produced.
#[derive(Debug, Clone)]
pub struct UserCommit {
    /// Version the state was read at; the store rejects the commit otherwise.
    pub expected_version: u64,
    /// New state; its `version` is `expected_version + 1`.
    pub state: UserEconomyState,
    pub entries: Vec<LedgerEntry>,
    pub audits: Vec<AuditEvent>,
}

impl UserCommit {
    pub fn user_id(&self) -> &UserId {
        &self.state.user_id
    }
}

// ---------------------------------------------------------------------------
// Ledger query
// ---------------------------------------------------------------------------

/// Filter over ledger history. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub user_id: Option<UserId>,
    pub entry_id: Option<String>,
    pub currency: Option<Currency>,
    pub direction: Option<Direction>,
    pub source: Option<LedgerSource>,
    /// Inclusive lower bound on `timestamp`.
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent `limit` matches.
    pub limit: Option<usize>,
}

impl LedgerQuery {
    pub fn for_user(user_id: &UserId) -> Self {
        Self {
            user_id: Some(user_id.clone()),
            ..Self::default()
        }
    }

    pub fn entry(entry_id: impl Into<String>) -> Self {
        Self {
            entry_id: Some(entry_id.into()),
            ..Self::default()
        }
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn source(mut self, source: LedgerSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        self.user_id.as_ref().map_or(true, |u| &entry.user_id == u)
            && self.entry_id.as_ref().map_or(true, |id| &entry.id == id)
            && self.currency.map_or(true, |c| entry.currency == c)
            && self.direction.map_or(true, |d| entry.direction == d)
            && self.source.map_or(true, |s| entry.source == s)
            && self.since.map_or(true, |t| entry.timestamp >= t)
    }
}

// ---------------------------------------------------------------------------
// EconomyStore
// ---------------------------------------------------------------------------

/// Backing store for user economy records, the ledger and the audit trail.
#[async_trait]
pub trait EconomyStore: Send + Sync {
    /// Load a user record, `None` if absent.
    async fn load_user(&self, user_id: &UserId) -> Result<Option<UserEconomyState>, StoreError>;

    /// Create a user record. Fails with `AlreadyExists` if present.
    async fn insert_user(&self, state: UserEconomyState) -> Result<(), StoreError>;

    /// Apply a commit atomically (compare-and-swap on version).
    async fn commit(&self, commit: UserCommit) -> Result<(), StoreError>;

    /// All known user ids.
    async fn list_users(&self) -> Result<Vec<UserId>, StoreError>;

    /// Ledger entries matching `query` in append order (per-user `seq` ascending).
    async fn query_ledger(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Audit events, optionally for one user.
    async fn audit_log(&self, user_id: Option<&UserId>) -> Result<Vec<AuditEvent>, StoreError>;
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - In-Memory Store

//! In-process [`EconomyStore`] used by tests, the bench runner and hosts that
//! keep the economy in memory.
//!
//! All state lives behind one `RwLock`, so a commit is applied in a single
//! critical section. Failure injection lets tests exercise the
//! store-unavailable path.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;

use crate::store::{EconomyStore, LedgerQuery, StoreError, UserCommit};
use crate::types::{AuditEvent, LedgerEntry, UserEconomyState, UserId};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, UserEconomyState>,
    ledger: Vec<LedgerEntry>,
    audits: Vec<AuditEvent>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
    failing_commits: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle every operation failing with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail the next `n` commits with `Unavailable`; reads keep working.
    pub fn fail_next_commits(&self, n: u32) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }

    /// Write a record as-is, bypassing the commit path.
    ///
    /// Used to import records from another system, or to reproduce corrupt
    /// state in tests.
    pub async fn import_user(&self, state: UserEconomyState) {
        let mut inner = self.inner.write().await;
        inner.users.insert(state.user_id.clone(), state);
    }

    /// Append a ledger entry as-is, bypassing the commit path.
    pub async fn import_entry(&self, entry: LedgerEntry) {
        self.inner.write().await.ledger.push(entry);
    }

    pub async fn ledger_len(&self) -> usize {
        self.inner.read().await.ledger.len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EconomyStore for MemoryStore {
    async fn load_user(&self, user_id: &UserId) -> Result<Option<UserEconomyState>, StoreError> {
        self.check_online()?;
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }

    async fn insert_user(&self, state: UserEconomyState) -> Result<(), StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&state.user_id) {
            return Err(StoreError::AlreadyExists(state.user_id));
        }
        inner.users.insert(state.user_id.clone(), state);
        Ok(())
    }

    async fn commit(&self, commit: UserCommit) -> Result<(), StoreError> {
        self.check_online()?;
        if self.take_commit_failure() {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        let mut inner = self.inner.write().await;
        let user_id = commit.user_id().clone();
        let found = inner
            .users
            .get(&user_id)
            .map(|u| u.version)
            .ok_or_else(|| StoreError::NotFound(user_id.clone()))?;
        if found != commit.expected_version {
            return Err(StoreError::VersionConflict {
                user_id,
                expected: commit.expected_version,
                found,
            });
        }

        inner.users.insert(user_id, commit.state);
        inner.ledger.extend(commit.entries);
        inner.audits.extend(commit.audits);
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<UserId>, StoreError> {
        self.check_online()?;
        let mut ids: Vec<UserId> = self.inner.read().await.users.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn query_ledger(&self, query: &LedgerQuery) -> Result<Vec<LedgerEntry>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        let mut matches: Vec<LedgerEntry> = inner
            .ledger
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        if let Some(limit) = query.limit {
            let skip = matches.len().saturating_sub(limit);
            matches.drain(..skip);
        }
        Ok(matches)
    }

    async fn audit_log(&self, user_id: Option<&UserId>) -> Result<Vec<AuditEvent>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .audits
            .iter()
            .filter(|a| user_id.map_or(true, |u| &a.user_id == u))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::level_for_xp;
    use crate::plan::Plan;
    use chrono::Utc;

    fn user(id: &str) -> UserEconomyState {
        UserEconomyState::new(UserId::from(id), Plan::Free, level_for_xp(0), Utc::now())
    }

    #[tokio::test]
    async fn insert_then_load() {
        let store = MemoryStore::new();
        store.insert_user(user("u1")).await.expect("test: insert");
        let loaded = store
            .load_user(&UserId::from("u1"))
            .await
            .expect("test: load")
            .expect("test: present");
        assert_eq!(loaded.coins, 0);

        let dup = store.insert_user(user("u1")).await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn commit_rejects_stale_version() {
        let store = MemoryStore::new();
        store.insert_user(user("u1")).await.expect("test: insert");

        let mut next = user("u1");
        next.coins = 10;
        next.version = 1;
        store
            .commit(UserCommit { expected_version: 0, state: next.clone(), entries: vec![], audits: vec![] })
            .await
            .expect("test: first commit");

        let stale = store
            .commit(UserCommit { expected_version: 0, state: next, entries: vec![], audits: vec![] })
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::VersionConflict { expected: 0, found: 1, .. })
        ));
    }

    #[tokio::test]
    async fn injected_failure_leaves_state_untouched() {
        let store = MemoryStore::new();
        store.insert_user(user("u1")).await.expect("test: insert");
        store.fail_next_commits(1);

        let mut next = user("u1");
        next.coins = 99;
        next.version = 1;
        let commit = UserCommit { expected_version: 0, state: next, entries: vec![], audits: vec![] };
        assert!(matches!(store.commit(commit.clone()).await, Err(StoreError::Unavailable(_))));

        let loaded = store.load_user(&UserId::from("u1")).await.expect("test: load");
        assert_eq!(loaded.map(|u| u.coins), Some(0));

        // failure budget is spent, the retry goes through
        store.commit(commit).await.expect("test: retry succeeds");
    }

    #[tokio::test]
    async fn offline_store_fails_reads() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.list_users().await,
            Err(StoreError::Unavailable(_))
        ));
    }
}

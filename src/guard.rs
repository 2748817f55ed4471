// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Reward Idempotency Guard

//! Claim-once semantics for reward source keys.
//!
//! A claim is only linearizable because it runs under the ledger's per-user
//! lock and lands through the same versioned commit as the payment. Reward
//! flows call [`claim_first`] as the opening step of their transaction, so a
//! failed payment also leaves the key unclaimed.

use std::sync::Arc;
use tracing::debug;

use crate::error::{EconomyResult, Outcome, Rejection};
use crate::ledger::{LedgerMutator, UserTxn};
use crate::types::{SourceKey, UserId};

/// Claim `key` inside a running transaction, rejecting duplicates.
pub fn claim_first(txn: &mut UserTxn, key: &SourceKey) -> Result<(), Rejection> {
    if txn.claim(key) {
        Ok(())
    } else {
        Err(Rejection::AlreadyRewarded { key: key.clone() })
    }
}

pub struct RewardGuard {
    ledger: Arc<LedgerMutator>,
}

impl RewardGuard {
    pub fn new(ledger: Arc<LedgerMutator>) -> Self {
        Self { ledger }
    }

    /// Atomically add `key` to the user's claimed set.
    ///
    /// `true` means the caller now owns the payout; `false` means it was
    /// already claimed and must not be paid again.
    pub async fn try_claim(&self, user_id: &UserId, key: &SourceKey) -> EconomyResult<bool> {
        let owned = key.clone();
        let outcome = self
            .ledger
            .transact(user_id, move |txn| claim_first(txn, &owned))
            .await?;
        let claimed = matches!(outcome, Outcome::Applied(_));
        debug!(user_id = %user_id, key = %key, claimed, "reward claim");
        Ok(claimed)
    }

    /// Whether `key` has already been claimed, without claiming it.
    pub async fn is_claimed(&self, user_id: &UserId, key: &SourceKey) -> EconomyResult<bool> {
        Ok(self.ledger.load(user_id).await?.has_claimed(key))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LevelCurve;
    use crate::memory::MemoryStore;
    use crate::plan::Plan;
    use crate::ports::{NoopSink, SystemClock};

    async fn guard() -> (RewardGuard, UserId) {
        let ledger = Arc::new(LedgerMutator::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            Arc::new(NoopSink),
            LevelCurve::default(),
        ));
        let user = UserId::from("fan-7");
        ledger.open_account(&user, Plan::Free).await.expect("test: open");
        (RewardGuard::new(ledger), user)
    }

    #[tokio::test]
    async fn second_claim_fails() {
        let (guard, user) = guard().await;
        let key = SourceKey::Achievement("first-stream".into());
        assert!(guard.try_claim(&user, &key).await.expect("test: claim"));
        assert!(!guard.try_claim(&user, &key).await.expect("test: reclaim"));
        assert!(guard.is_claimed(&user, &key).await.expect("test: lookup"));
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (guard, user) = guard().await;
        assert!(guard
            .try_claim(&user, &SourceKey::Mission("a".into()))
            .await
            .expect("test: claim a"));
        assert!(guard
            .try_claim(&user, &SourceKey::Achievement("a".into()))
            .await
            .expect("test: claim achievement a"));
    }

    #[tokio::test]
    async fn concurrent_claims_only_one_wins() {
        let (guard, user) = guard().await;
        let guard = Arc::new(guard);
        let key = SourceKey::Event("listening-party".into());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let guard = guard.clone();
            let user = user.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                guard.try_claim(&user, &key).await.expect("test: claim")
            }));
        }
        let mut wins = 0;
        for handle in handles {
            if handle.await.expect("test: join") {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}

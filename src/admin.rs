// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Admin Tools

//! Operator corrections: grants, deductions, refunds and plan changes.
//!
//! Admin grants bypass the plan multiplier and the balance cap. Refunds never
//! touch the original entry; they append a reversing one keyed by
//! `reversal:<entry id>` so the same entry cannot be refunded twice.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::error::{EconomyError, EconomyResult, Outcome};
use crate::guard::claim_first;
use crate::ledger::{LedgerMutator, LedgerReceipt};
use crate::plan::Plan;
use crate::store::LedgerQuery;
use crate::types::{
    Currency, Direction, EconomySnapshot, LedgerEntry, LedgerSource, SourceKey, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefundReceipt {
    pub original: LedgerEntry,
    pub reversal: LedgerEntry,
    pub snapshot: EconomySnapshot,
}

pub struct AdminTools {
    ledger: Arc<LedgerMutator>,
}

impl AdminTools {
    pub fn new(ledger: Arc<LedgerMutator>) -> Self {
        Self { ledger }
    }

    pub async fn admin_grant(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        reason: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        check_amount(amount)?;
        info!(user_id = %user_id, %currency, amount, reason, "admin grant");
        self.ledger
            .apply_gain(user_id, currency, amount, LedgerSource::AdminGrant, reason)
            .await
    }

    /// Remove `amount`; for XP this is the only path that lowers it.
    pub async fn admin_deduct(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        reason: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        check_amount(amount)?;
        info!(user_id = %user_id, %currency, amount, reason, "admin deduction");
        self.ledger
            .apply_spend(user_id, currency, amount, LedgerSource::AdminDeduction, reason)
            .await
    }

    /// Append an entry reversing `entry_id`.
    ///
    /// A second refund of the same entry is rejected with `ALREADY_REWARDED`.
    /// Reversing an earn the user already spent is `INSUFFICIENT_FUNDS`.
    pub async fn admin_refund(
        &self,
        user_id: &UserId,
        entry_id: &str,
        reason: &str,
    ) -> EconomyResult<Outcome<RefundReceipt>> {
        let query = LedgerQuery {
            entry_id: Some(entry_id.to_string()),
            ..LedgerQuery::for_user(user_id)
        };
        let original = self
            .ledger
            .store()
            .query_ledger(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EconomyError::InvalidInput(format!("no ledger entry {entry_id} for user {user_id}"))
            })?;
        if original.source == LedgerSource::AdminRefund {
            return Err(EconomyError::InvalidInput(format!(
                "entry {entry_id} is itself a refund"
            )));
        }

        let key = SourceKey::Reversal(original.id.clone());
        let description = format!("Refund of {}: {reason}", original.id);
        let target = original.clone();

        let outcome = self
            .ledger
            .transact(user_id, move |txn| {
                claim_first(txn, &key)?;
                let reversal = match target.direction.reversed() {
                    Direction::Earn => {
                        txn.gain(target.currency, target.amount, LedgerSource::AdminRefund, description)?
                    }
                    Direction::Spend => {
                        txn.spend(target.currency, target.amount, LedgerSource::AdminRefund, description)?
                    }
                };
                Ok((reversal, txn.state().snapshot()))
            })
            .await?;

        let outcome = match outcome {
            Outcome::Applied(applied) => {
                let (reversal, snapshot) = applied.value;
                // ledger amounts are always positive, so the reversal always writes
                let reversal = reversal.ok_or_else(|| {
                    EconomyError::InvalidInput(format!("entry {entry_id} has no amount to reverse"))
                })?;
                info!(
                    user_id = %user_id,
                    entry = %original.id,
                    reversal = %reversal.id,
                    reason,
                    "admin refund"
                );
                Outcome::Applied(RefundReceipt { original, reversal, snapshot })
            }
            Outcome::Rejected(rejection) => Outcome::Rejected(rejection),
        };
        Ok(outcome)
    }

    /// Change the user's plan. Writes no ledger entry.
    pub async fn set_plan(&self, user_id: &UserId, plan: Plan) -> EconomyResult<EconomySnapshot> {
        let outcome = self
            .ledger
            .transact(user_id, move |txn| {
                let previous = txn.plan();
                txn.set_plan(plan);
                Ok((previous, txn.state().snapshot()))
            })
            .await?;
        match outcome {
            Outcome::Applied(applied) => {
                let (previous, snapshot) = applied.value;
                if previous != plan {
                    info!(user_id = %user_id, from = %previous, to = %plan, "plan changed");
                }
                Ok(snapshot)
            }
            // the closure never rejects
            Outcome::Rejected(rejection) => Err(EconomyError::InvalidInput(rejection.to_string())),
        }
    }
}

fn check_amount(amount: i64) -> EconomyResult<()> {
    if amount < 0 {
        return Err(EconomyError::InvalidInput(format!("negative admin amount {amount}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

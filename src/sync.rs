// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Consistency Sync

//! Self-heal pass over user records.
//!
//! Per user, in one commit:
//!
//! 1. level fields recomputed from xp (`level_drift_fix`)
//! 2. negative coins / xp clamped to zero (`negative_balance_fix`)
//! 3. mission counter replaced by the submission service's approved count
//!    (`mission_counter_fix`)
//!
//! Corrections are audited, never raised. Ledger entries are never touched.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{EconomyError, EconomyResult, Outcome};
use crate::ledger::LedgerMutator;
use crate::ports::{SubmissionSource, TelemetrySink};
use crate::types::{AuditEvent, Currency, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub user_id: UserId,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub users_scanned: usize,
    pub corrections: Vec<AuditEvent>,
    pub failures: Vec<SyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty() && self.failures.is_empty()
    }
}

pub struct ConsistencySync {
    ledger: Arc<LedgerMutator>,
    submissions: Arc<dyn SubmissionSource>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl ConsistencySync {
    pub fn new(
        ledger: Arc<LedgerMutator>,
        submissions: Arc<dyn SubmissionSource>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self { ledger, submissions, telemetry }
    }

    /// Heal one user, or every user when `user_id` is `None`.
    ///
    /// A single-user run propagates its error. A full scan records per-user
    /// failures in the report and keeps going.
    pub async fn run(&self, user_id: Option<&UserId>) -> EconomyResult<SyncReport> {
        let mut report = SyncReport::default();
        match user_id {
            Some(user_id) => {
                report.users_scanned = 1;
                report.corrections = self.heal_user(user_id).await?;
            }
            None => {
                let users = self.ledger.store().list_users().await?;
                report.users_scanned = users.len();
                for user_id in &users {
                    match self.heal_user(user_id).await {
                        Ok(mut fixes) => report.corrections.append(&mut fixes),
                        Err(err) => {
                            warn!(user_id = %user_id, error = %err, "self-heal skipped user");
                            report.failures.push(SyncFailure {
                                user_id: user_id.clone(),
                                code: err.code(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
        info!(
            users = report.users_scanned,
            corrections = report.corrections.len(),
            failures = report.failures.len(),
            "consistency sync finished"
        );
        Ok(report)
    }

    async fn heal_user(&self, user_id: &UserId) -> EconomyResult<Vec<AuditEvent>> {
        let approved = self.submissions.approved_submission_count(user_id).await?;

        let outcome = self
            .ledger
            .transact(user_id, move |txn| {
                txn.heal_level();
                txn.heal_negative(Currency::Coins);
                txn.heal_negative(Currency::Xp);
                if let Some(approved) = approved {
                    txn.heal_mission_counter(approved);
                }
                Ok(())
            })
            .await?;

        let audits = match outcome {
            Outcome::Applied(applied) => applied.audits,
            // healing never rejects
            Outcome::Rejected(rejection) => {
                return Err(EconomyError::InvalidInput(rejection.to_string()))
            }
        };

        if audits.is_empty() {
            debug!(user_id = %user_id, "record consistent");
        }
        for audit in &audits {
            warn!(
                user_id = %user_id,
                kind = ?audit.kind,
                field = %audit.field,
                before = audit.before,
                after = audit.after,
                "self-heal correction"
            );
            self.telemetry.emit(
                "self_heal_correction",
                json!({
                    "user_id": audit.user_id,
                    "kind": audit.kind,
                    "field": audit.field,
                    "before": audit.before,
                    "after": audit.after,
                }),
            );
        }
        Ok(audits)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

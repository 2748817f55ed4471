// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Ledger & Balance Mutator

//! The single write path for balances, XP and claim sets.
//!
//! Every mutation runs as a [`UserTxn`] against a working copy of the user
//! record:
//!
//! ```text
//! lock(user) -> load -> op(&mut txn) -> commit(state + entries + audits) -> unlock
//! ```
//!
//! The per-user async mutex serializes writers inside this process; the
//! store's version check catches writers outside it. If `op` rejects, or the
//! commit fails, nothing is written.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::{EconomyError, EconomyResult, Outcome, Rejection};
use crate::level::{LevelCurve, LevelProgress};
use crate::plan::Plan;
use crate::ports::{Clock, TelemetrySink};
use crate::store::{EconomyStore, UserCommit};
use crate::types::{
    AuditEvent, AuditKind, Currency, Direction, LedgerEntry, LedgerSource, SourceKey,
    UserEconomyState, UserId,
};

// ---------------------------------------------------------------------------
// Per-user locks
// ---------------------------------------------------------------------------

/// One async mutex per user; holders are the only writers of that user.
#[derive(Debug, Default)]
pub struct UserLocks {
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl UserLocks {
    pub async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

// ---------------------------------------------------------------------------
// UserTxn
// ---------------------------------------------------------------------------

/// Working copy of one user record inside a ledger transaction.
pub struct UserTxn {
    state: UserEconomyState,
    entries: Vec<LedgerEntry>,
    audits: Vec<AuditEvent>,
    curve: LevelCurve,
    now: DateTime<Utc>,
    dirty: bool,
}

impl UserTxn {
    fn new(state: UserEconomyState, curve: LevelCurve, now: DateTime<Utc>) -> Self {
        Self {
            state,
            entries: Vec::new(),
            audits: Vec::new(),
            curve,
            now,
            dirty: false,
        }
    }

    pub fn state(&self) -> &UserEconomyState {
        &self.state
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn plan(&self) -> Plan {
        self.state.plan
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Credit `amount` of `currency`. Non-positive amounts write nothing.
    pub fn gain(
        &mut self,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: impl Into<String>,
    ) -> Result<Option<LedgerEntry>, Rejection> {
        if amount <= 0 {
            return Ok(None);
        }
        let balance = self.state.balance(currency);
        let next = balance
            .checked_add(amount)
            .ok_or(Rejection::BalanceOverflow { currency })?;
        self.set_balance(currency, next);
        Ok(Some(self.push_entry(Direction::Earn, currency, amount, source, description.into())))
    }

    /// Debit `amount` of `currency`, rejecting if it exceeds the balance.
    /// Non-positive amounts write nothing.
    pub fn spend(
        &mut self,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: impl Into<String>,
    ) -> Result<Option<LedgerEntry>, Rejection> {
        if amount <= 0 {
            return Ok(None);
        }
        let balance = self.state.balance(currency);
        if amount > balance {
            return Err(Rejection::InsufficientFunds {
                currency,
                requested: amount,
                available: balance.max(0),
            });
        }
        self.set_balance(currency, balance - amount);
        Ok(Some(self.push_entry(Direction::Spend, currency, amount, source, description.into())))
    }

    /// Mark `key` as paid. Returns `false` if it already was.
    pub fn claim(&mut self, key: &SourceKey) -> bool {
        let inserted = self.state.insert_claim(key);
        self.dirty |= inserted;
        inserted
    }

    pub(crate) fn set_plan(&mut self, plan: Plan) {
        if self.state.plan != plan {
            self.state.plan = plan;
            self.dirty = true;
        }
    }

    pub(crate) fn set_streak(&mut self, last_checkin: chrono::NaiveDate, count: u32) {
        self.state.streak.last_checkin = Some(last_checkin);
        self.state.streak.count = count;
        self.dirty = true;
    }

    /// Count one rewarded mission on `today`.
    pub(crate) fn record_mission(&mut self, today: chrono::NaiveDate) {
        let daily = &mut self.state.daily_missions;
        if daily.date != Some(today) {
            daily.date = Some(today);
            daily.count = 0;
        }
        daily.count = daily.count.saturating_add(1);
        self.state.total_missions_completed = self.state.total_missions_completed.saturating_add(1);
        self.dirty = true;
    }

    // -- self-heal -------------------------------------------------------------

    /// Raise a negative balance to zero, recording the correction.
    pub(crate) fn heal_negative(&mut self, currency: Currency) -> Option<AuditEvent> {
        let before = self.state.balance(currency);
        if before >= 0 {
            return None;
        }
        self.set_balance(currency, 0);
        Some(self.push_audit(AuditKind::NegativeBalanceFix, currency_field(currency), before, 0))
    }

    /// Overwrite level fields that disagree with the level curve.
    pub(crate) fn heal_level(&mut self) -> Vec<AuditEvent> {
        let expected = self.curve.level_for_xp(self.state.xp);
        let mut fixes = Vec::new();
        if self.state.level != expected.level {
            let before = i64::from(self.state.level);
            self.state.level = expected.level;
            fixes.push(self.push_audit(AuditKind::LevelDriftFix, "level", before, i64::from(expected.level)));
        }
        if self.state.xp_to_next_level != expected.xp_to_next_level {
            let before = self.state.xp_to_next_level;
            self.state.xp_to_next_level = expected.xp_to_next_level;
            fixes.push(self.push_audit(
                AuditKind::LevelDriftFix,
                "xp_to_next_level",
                before,
                expected.xp_to_next_level,
            ));
        }
        fixes
    }

    /// Replace a stale mission counter with the authoritative count.
    pub(crate) fn heal_mission_counter(&mut self, approved: u32) -> Option<AuditEvent> {
        let before = self.state.total_missions_completed;
        if before == approved {
            return None;
        }
        self.state.total_missions_completed = approved;
        Some(self.push_audit(
            AuditKind::MissionCounterFix,
            "total_missions_completed",
            i64::from(before),
            i64::from(approved),
        ))
    }

    // -- internals -------------------------------------------------------------

    fn set_balance(&mut self, currency: Currency, value: i64) {
        match currency {
            Currency::Coins => self.state.coins = value,
            Currency::Xp => {
                self.state.xp = value;
                let LevelProgress { level, xp_to_next_level } = self.curve.level_for_xp(value);
                self.state.level = level;
                self.state.xp_to_next_level = xp_to_next_level;
            }
        }
        self.dirty = true;
    }

    fn push_entry(
        &mut self,
        direction: Direction,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: String,
    ) -> LedgerEntry {
        self.state.ledger_seq += 1;
        let entry = LedgerEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.state.user_id.clone(),
            seq: self.state.ledger_seq,
            direction,
            currency,
            amount,
            source,
            description,
            timestamp: self.now,
        };
        self.entries.push(entry.clone());
        entry
    }

    fn push_audit(&mut self, kind: AuditKind, field: &str, before: i64, after: i64) -> AuditEvent {
        let event = AuditEvent {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: self.state.user_id.clone(),
            kind,
            field: field.to_string(),
            before,
            after,
            timestamp: self.now,
        };
        self.audits.push(event.clone());
        self.dirty = true;
        event
    }
}

fn reduces_xp(source: LedgerSource) -> bool {
    matches!(source, LedgerSource::AdminDeduction | LedgerSource::AdminRefund)
}

fn currency_field(currency: Currency) -> &'static str {
    match currency {
        Currency::Coins => "coins",
        Currency::Xp => "xp",
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A committed transaction.
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub value: T,
    pub state: UserEconomyState,
    pub entries: Vec<LedgerEntry>,
    pub audits: Vec<AuditEvent>,
}

/// Result of a single gain or spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerReceipt {
    pub state: UserEconomyState,
    /// `None` for zero-amount calls.
    pub entry: Option<LedgerEntry>,
}

// ---------------------------------------------------------------------------
// LedgerMutator
// ---------------------------------------------------------------------------

pub struct LedgerMutator {
    store: Arc<dyn EconomyStore>,
    locks: UserLocks,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySink>,
    curve: LevelCurve,
}

impl LedgerMutator {
    pub fn new(
        store: Arc<dyn EconomyStore>,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn TelemetrySink>,
        curve: LevelCurve,
    ) -> Self {
        Self {
            store,
            locks: UserLocks::default(),
            clock,
            telemetry,
            curve,
        }
    }

    pub fn store(&self) -> &Arc<dyn EconomyStore> {
        &self.store
    }

    pub fn curve(&self) -> LevelCurve {
        self.curve
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a zeroed account.
    pub async fn open_account(&self, user_id: &UserId, plan: Plan) -> EconomyResult<UserEconomyState> {
        let state = UserEconomyState::new(
            user_id.clone(),
            plan,
            self.curve.level_for_xp(0),
            self.clock.now(),
        );
        self.store.insert_user(state.clone()).await?;
        debug!(user_id = %user_id, plan = %plan, "account opened");
        Ok(state)
    }

    pub async fn load(&self, user_id: &UserId) -> EconomyResult<UserEconomyState> {
        self.store
            .load_user(user_id)
            .await?
            .ok_or_else(|| EconomyError::UserNotFound(user_id.clone()))
    }

    /// Run `op` against the user's record and commit everything it changed
    /// as one unit.
    pub async fn transact<T, F>(&self, user_id: &UserId, op: F) -> EconomyResult<Outcome<Applied<T>>>
    where
        F: FnOnce(&mut UserTxn) -> Result<T, Rejection> + Send,
        T: Send,
    {
        let _guard = self.locks.acquire(user_id).await;
        let state = self.load(user_id).await?;
        let expected_version = state.version;
        let mut txn = UserTxn::new(state, self.curve, self.clock.now());

        let value = match op(&mut txn) {
            Ok(value) => value,
            Err(rejection) => {
                self.report_rejection(user_id, &rejection);
                return Ok(Outcome::Rejected(rejection));
            }
        };

        let UserTxn { mut state, entries, audits, dirty, .. } = txn;
        if dirty {
            state.version = expected_version + 1;
            let commit = UserCommit {
                expected_version,
                state: state.clone(),
                entries: entries.clone(),
                audits: audits.clone(),
            };
            if let Err(err) = self.store.commit(commit).await {
                warn!(user_id = %user_id, error = %err, "ledger commit failed, nothing applied");
                return Err(err.into());
            }
            debug!(
                user_id = %user_id,
                version = state.version,
                entries = entries.len(),
                audits = audits.len(),
                "ledger commit"
            );
            self.report_entries(&entries);
        }

        Ok(Outcome::Applied(Applied { value, state, entries, audits }))
    }

    /// Credit `amount` of `currency`.
    pub async fn apply_gain(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        let description = description.to_string();
        let outcome = self
            .transact(user_id, move |txn| txn.gain(currency, amount, source, description))
            .await?;
        Ok(outcome.map(|applied| LedgerReceipt { state: applied.state, entry: applied.value }))
    }

    /// Debit `amount` of `currency`; `INSUFFICIENT_FUNDS` if it exceeds the balance.
    ///
    /// XP only goes down through admin corrections; any other source is
    /// `INVALID_INPUT`.
    pub async fn apply_spend(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        if currency == Currency::Xp && !reduces_xp(source) {
            return Err(EconomyError::InvalidInput(format!(
                "xp can only be deducted by admin correction, not {source}"
            )));
        }
        let description = description.to_string();
        let outcome = self
            .transact(user_id, move |txn| txn.spend(currency, amount, source, description))
            .await?;
        Ok(outcome.map(|applied| LedgerReceipt { state: applied.state, entry: applied.value }))
    }

    fn report_entries(&self, entries: &[LedgerEntry]) {
        for entry in entries {
            let event = match entry.direction {
                Direction::Earn => "reward",
                Direction::Spend => "spend",
            };
            self.telemetry.emit(
                event,
                json!({
                    "user_id": entry.user_id,
                    "entry_id": entry.id,
                    "currency": entry.currency,
                    "amount": entry.amount,
                    "source": entry.source,
                }),
            );
        }
    }

    fn report_rejection(&self, user_id: &UserId, rejection: &Rejection) {
        debug!(user_id = %user_id, code = rejection.code(), "operation rejected");
        if let Rejection::InsufficientFunds { currency, requested, available } = rejection {
            self.telemetry.emit(
                "insufficient_funds",
                json!({
                    "user_id": user_id,
                    "currency": currency,
                    "requested": requested,
                    "available": available,
                }),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Check-in Streak Engine

//! Daily check-in state machine.
//!
//! ```text
//! eligible --perform_checkin--> checked_in --next local midnight--> eligible
//! ```
//!
//! Consecutive days grow the streak; any gap restarts it at 1. Reaching the
//! milestone pays a bonus and resets the counter to 0.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::config::EconomyConfig;
use crate::error::{EconomyResult, Outcome, Rejection};
use crate::ledger::LedgerMutator;
use crate::plan::MultiplierResolver;
use crate::ports::NotificationSink;
use crate::rewards::{credit_capped, summarize};
use crate::types::{EconomySnapshot, LedgerSource, Streak, UserId};

/// Streak value after checking in on `today`, before milestone handling.
pub fn next_streak(streak: &Streak, today: NaiveDate) -> u32 {
    match streak.last_checkin {
        Some(last) if today.pred_opt() == Some(last) => streak.count.saturating_add(1),
        _ => 1,
    }
}

/// Whether a user whose last check-in was `last` may check in on `today`.
pub fn is_eligible(last: Option<NaiveDate>, today: NaiveDate) -> bool {
    last.map_or(true, |last| last < today)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckinReceipt {
    pub date: NaiveDate,
    pub coins_awarded: i64,
    pub bonus_awarded: i64,
    /// Day of the streak this check-in counted as (1-based).
    pub streak_day: u32,
    /// Stored counter after the check-in; 0 right after a milestone.
    pub streak: u32,
    pub milestone_reached: bool,
    pub snapshot: EconomySnapshot,
}

pub struct CheckinEngine {
    ledger: Arc<LedgerMutator>,
    resolver: MultiplierResolver,
    config: Arc<EconomyConfig>,
    notifier: Arc<dyn NotificationSink>,
}

impl CheckinEngine {
    pub fn new(
        ledger: Arc<LedgerMutator>,
        config: Arc<EconomyConfig>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            resolver: MultiplierResolver::new(config.plans.clone()),
            config,
            notifier,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.config.local_date(self.ledger.now())
    }

    pub async fn can_checkin(&self, user_id: &UserId) -> EconomyResult<bool> {
        let state = self.ledger.load(user_id).await?;
        Ok(is_eligible(state.streak.last_checkin, self.today()))
    }

    pub async fn perform_checkin(&self, user_id: &UserId) -> EconomyResult<Outcome<CheckinReceipt>> {
        let resolver = self.resolver.clone();
        let config = self.config.clone();

        let outcome = self
            .ledger
            .transact(user_id, move |txn| {
                let today = config.local_date(txn.now());
                let streak = txn.state().streak.clone();
                if !is_eligible(streak.last_checkin, today) {
                    return Err(Rejection::AlreadyCheckedIn { date: today });
                }

                let plan = txn.plan();
                let cap = resolver.limits_for(plan).max_balance_cap;
                let streak_day = next_streak(&streak, today);
                let milestone = config.checkin.milestone_days;

                let base = resolver.apply_multiplier(config.checkin.base_coins, plan);
                let coins_awarded = credit_capped(
                    txn,
                    base,
                    cap,
                    LedgerSource::DailyCheckIn,
                    &format!("Daily check-in, day {streak_day}"),
                )?;

                let milestone_reached = streak_day >= milestone;
                let mut bonus_awarded = 0;
                let stored = if milestone_reached {
                    let bonus = resolver.apply_multiplier(config.checkin.milestone_bonus_coins, plan);
                    bonus_awarded = credit_capped(
                        txn,
                        bonus,
                        cap,
                        LedgerSource::StreakBonus,
                        &format!("Day {streak_day} streak bonus"),
                    )?;
                    0
                } else {
                    streak_day
                };
                txn.set_streak(today, stored);

                Ok(CheckinReceipt {
                    date: today,
                    coins_awarded,
                    bonus_awarded,
                    streak_day,
                    streak: stored,
                    milestone_reached,
                    snapshot: txn.state().snapshot(),
                })
            })
            .await?;

        Ok(outcome.map(|applied| {
            let receipt = applied.value;
            self.announce(user_id, &receipt);
            receipt
        }))
    }

    fn announce(&self, user_id: &UserId, receipt: &CheckinReceipt) {
        info!(
            user_id = %user_id,
            streak_day = receipt.streak_day,
            coins = receipt.coins_awarded + receipt.bonus_awarded,
            milestone = receipt.milestone_reached,
            "check-in"
        );
        let coins = receipt.coins_awarded + receipt.bonus_awarded;
        let title = if receipt.milestone_reached { "Streak milestone" } else { "Daily check-in" };
        let body = checkin_body(coins, receipt.streak_day, receipt.milestone_reached);
        self.notifier.notify(user_id, title, &body);
    }
}

/// Notification body; the coin part is left out when the cap withheld everything.
fn checkin_body(coins: i64, streak_day: u32, milestone: bool) -> String {
    let day = if milestone {
        format!("Day {streak_day} streak bonus!")
    } else {
        format!("Day {streak_day} streak")
    };
    match summarize(coins, 0) {
        gained if gained.is_empty() => day,
        gained => format!("{gained}, {day}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

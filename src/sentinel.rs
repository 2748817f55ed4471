// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Economy Sentinel

//! Read-only anomaly scan over user records, the ledger and the audit trail.
//!
//! | check                                   | severity |
//! |-----------------------------------------|----------|
//! | negative coins or xp                    | critical |
//! | completed missions with zero xp         | high     |
//! | coins != ledger net + audited deltas    | medium   |
//! | windowed coin earnings above threshold  | warning  |

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use crate::config::SentinelConfig;
use crate::error::EconomyResult;
use crate::ports::Clock;
use crate::store::{EconomyStore, LedgerQuery};
use crate::types::{
    Currency, Direction, HealthAlert, LedgerEntry, Severity, UserEconomyState, UserId,
};

pub struct EconomySentinel {
    store: Arc<dyn EconomyStore>,
    clock: Arc<dyn Clock>,
    config: SentinelConfig,
}

impl EconomySentinel {
    pub fn new(store: Arc<dyn EconomyStore>, clock: Arc<dyn Clock>, config: SentinelConfig) -> Self {
        Self { store, clock, config }
    }

    /// All current alerts, most severe first.
    pub async fn alerts(&self) -> EconomyResult<Vec<HealthAlert>> {
        let since = window_start(self.clock.now(), self.config.window_hours);
        let mut alerts = Vec::new();

        for user_id in self.store.list_users().await? {
            let Some(state) = self.store.load_user(&user_id).await? else {
                continue;
            };
            alerts.extend(negative_balance(&state));
            alerts.extend(missions_without_xp(&state));

            let coin_entries = self
                .store
                .query_ledger(&LedgerQuery::for_user(&user_id).currency(Currency::Coins))
                .await?;
            let audited: i64 = self
                .store
                .audit_log(Some(&user_id))
                .await?
                .iter()
                .filter(|a| a.field == "coins")
                .map(|a| a.delta())
                .sum();
            alerts.extend(ledger_drift(&state, &coin_entries, audited));

            let earned: i64 = coin_entries
                .iter()
                .filter(|e| e.direction == Direction::Earn && e.timestamp >= since)
                .map(|e| e.amount)
                .sum();
            if earned > self.config.whale_threshold {
                alerts.push(alert(
                    "whale",
                    Severity::Warning,
                    "Whale activity",
                    format!(
                        "{user_id} earned {earned} coins in the last {}h (threshold {})",
                        self.config.window_hours, self.config.whale_threshold
                    ),
                    &user_id,
                ));
            }
        }

        alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.user_id.cmp(&b.user_id)));
        debug!(alerts = alerts.len(), "sentinel scan");
        Ok(alerts)
    }
}

/// Start of the earnings window; saturates at the earliest representable instant.
fn window_start(now: DateTime<Utc>, window_hours: i64) -> DateTime<Utc> {
    Duration::try_hours(window_hours)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Alert ids are `<check>:<user>` so repeated scans report the same condition
/// under the same id.
fn alert(check: &str, severity: Severity, title: &str, description: String, user_id: &UserId) -> HealthAlert {
    HealthAlert {
        id: format!("{check}:{user_id}"),
        severity,
        title: title.to_string(),
        description,
        user_id: Some(user_id.clone()),
    }
}

fn negative_balance(state: &UserEconomyState) -> Option<HealthAlert> {
    if state.coins >= 0 && state.xp >= 0 {
        return None;
    }
    Some(alert(
        "negative_balance",
        Severity::Critical,
        "Negative balance",
        format!(
            "{} has coins {} and xp {}; consistency sync has not repaired it",
            state.user_id, state.coins, state.xp
        ),
        &state.user_id,
    ))
}

fn missions_without_xp(state: &UserEconomyState) -> Option<HealthAlert> {
    if state.total_missions_completed == 0 || state.xp != 0 {
        return None;
    }
    Some(alert(
        "missions_without_xp",
        Severity::High,
        "Missions without XP",
        format!(
            "{} completed {} missions but has 0 XP",
            state.user_id, state.total_missions_completed
        ),
        &state.user_id,
    ))
}

fn ledger_drift(state: &UserEconomyState, coin_entries: &[LedgerEntry], audited: i64) -> Option<HealthAlert> {
    let net: i64 = coin_entries.iter().map(LedgerEntry::signed_amount).sum();
    let expected = net + audited;
    if state.coins == expected {
        return None;
    }
    Some(alert(
        "ledger_drift",
        Severity::Medium,
        "Ledger drift",
        format!(
            "{} holds {} coins but the ledger accounts for {}",
            state.user_id, state.coins, expected
        ),
        &state.user_id,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Type Definitions

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::level::LevelProgress;
use crate::plan::Plan;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Stable user identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self { UserId(s) }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self { UserId(s.to_string()) }
}

// ---------------------------------------------------------------------------
// Currency / Direction / Source
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    Coins,
    Xp,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coins => write!(f, "coins"),
            Self::Xp => write!(f, "XP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Earn,
    Spend,
}

impl Direction {
    pub fn reversed(&self) -> Self {
        match self {
            Self::Earn => Self::Spend,
            Self::Spend => Self::Earn,
        }
    }
}

/// Trigger that caused a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    MissionCompletion,
    DailyCheckIn,
    StreakBonus,
    AchievementUnlock,
    EventParticipation,
    Redemption,
    SubscriptionBonus,
    AdminGrant,
    AdminDeduction,
    AdminRefund,
    StorePurchase,
}

impl LedgerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissionCompletion => "mission_completion",
            Self::DailyCheckIn => "daily_check_in",
            Self::StreakBonus => "streak_bonus",
            Self::AchievementUnlock => "achievement_unlock",
            Self::EventParticipation => "event_participation",
            Self::Redemption => "redemption",
            Self::SubscriptionBonus => "subscription_bonus",
            Self::AdminGrant => "admin_grant",
            Self::AdminDeduction => "admin_deduction",
            Self::AdminRefund => "admin_refund",
            Self::StorePurchase => "store_purchase",
        }
    }
}

impl fmt::Display for LedgerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SourceKey
// ---------------------------------------------------------------------------

/// Idempotency key of a reward, rendered as `kind:id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SourceKey {
    Mission(String),
    Achievement(String),
    Event(String),
    Redemption(String),
    Subscription(String),
    /// Reversal of a ledger entry (admin refund).
    Reversal(String),
}

impl SourceKey {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mission(_) => "mission",
            Self::Achievement(_) => "achievement",
            Self::Event(_) => "event",
            Self::Redemption(_) => "redemption",
            Self::Subscription(_) => "subscription",
            Self::Reversal(_) => "reversal",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Mission(id)
            | Self::Achievement(id)
            | Self::Event(id)
            | Self::Redemption(id)
            | Self::Subscription(id)
            | Self::Reversal(id) => id,
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Error parsing a [`SourceKey`] from its `kind:id` form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed source key `{0}`")]
pub struct SourceKeyError(pub String);

impl FromStr for SourceKey {
    type Err = SourceKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| SourceKeyError(s.to_string()))?;
        if id.is_empty() {
            return Err(SourceKeyError(s.to_string()));
        }
        let id = id.to_string();
        match kind {
            "mission" => Ok(Self::Mission(id)),
            "achievement" => Ok(Self::Achievement(id)),
            "event" => Ok(Self::Event(id)),
            "redemption" => Ok(Self::Redemption(id)),
            "subscription" => Ok(Self::Subscription(id)),
            "reversal" => Ok(Self::Reversal(id)),
            _ => Err(SourceKeyError(s.to_string())),
        }
    }
}

impl TryFrom<String> for SourceKey {
    type Error = SourceKeyError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<SourceKey> for String {
    fn from(key: SourceKey) -> Self {
        key.to_string()
    }
}

// ---------------------------------------------------------------------------
// LedgerEntry
// ---------------------------------------------------------------------------

/// Immutable record of one balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: UserId,
    /// Per-user sequence number; establishes the total order of a user's entries.
    pub seq: u64,
    pub direction: Direction,
    pub currency: Currency,
    /// Always > 0.
    pub amount: i64,
    pub source: LedgerSource,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed effect of this entry on its currency's balance.
    pub fn signed_amount(&self) -> i64 {
        match self.direction {
            Direction::Earn => self.amount,
            Direction::Spend => -self.amount,
        }
    }
}

// ---------------------------------------------------------------------------
// AuditEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    NegativeBalanceFix,
    LevelDriftFix,
    MissionCounterFix,
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeBalanceFix => write!(f, "negative_balance_fix"),
            Self::LevelDriftFix => write!(f, "level_drift_fix"),
            Self::MissionCounterFix => write!(f, "mission_counter_fix"),
        }
    }
}

/// Record of a self-heal correction. Written next to the ledger, never into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: String,
    pub user_id: UserId,
    pub kind: AuditKind,
    pub field: String,
    pub before: i64,
    pub after: i64,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn delta(&self) -> i64 {
        self.after - self.before
    }
}

// ---------------------------------------------------------------------------
// UserEconomyState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub last_checkin: Option<NaiveDate>,
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMissions {
    pub date: Option<NaiveDate>,
    pub count: u32,
}

impl DailyMissions {
    /// Missions rewarded on `today`; a stale date counts as zero.
    pub fn count_on(&self, today: NaiveDate) -> u32 {
        if self.date == Some(today) { self.count } else { 0 }
    }
}

/// The part of a user record owned by the economy core.
///
/// Balances are signed so that corrupt records can still be loaded and
/// repaired by the consistency sync; every operation leaves them >= 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEconomyState {
    pub user_id: UserId,
    pub coins: i64,
    pub xp: i64,
    pub level: u32,
    pub xp_to_next_level: i64,
    pub plan: Plan,
    #[serde(default)]
    pub completed_missions: BTreeSet<String>,
    #[serde(default)]
    pub unlocked_achievements: BTreeSet<String>,
    #[serde(default)]
    pub rewarded_redemptions: BTreeSet<String>,
    #[serde(default)]
    pub claimed_rewards: BTreeSet<String>,
    #[serde(default)]
    pub total_missions_completed: u32,
    #[serde(default)]
    pub daily_missions: DailyMissions,
    #[serde(default)]
    pub streak: Streak,
    #[serde(default)]
    pub ledger_seq: u64,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl UserEconomyState {
    /// Zeroed state for a newly opened account.
    pub fn new(user_id: UserId, plan: Plan, progress: LevelProgress, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            coins: 0,
            xp: 0,
            level: progress.level,
            xp_to_next_level: progress.xp_to_next_level,
            plan,
            completed_missions: BTreeSet::new(),
            unlocked_achievements: BTreeSet::new(),
            rewarded_redemptions: BTreeSet::new(),
            claimed_rewards: BTreeSet::new(),
            total_missions_completed: 0,
            daily_missions: DailyMissions::default(),
            streak: Streak::default(),
            ledger_seq: 0,
            version: 0,
            created_at: now,
        }
    }

    pub fn balance(&self, currency: Currency) -> i64 {
        match currency {
            Currency::Coins => self.coins,
            Currency::Xp => self.xp,
        }
    }

    /// Whether `key` has already been paid.
    pub fn has_claimed(&self, key: &SourceKey) -> bool {
        match key {
            SourceKey::Mission(id) => self.completed_missions.contains(id),
            SourceKey::Achievement(id) => self.unlocked_achievements.contains(id),
            SourceKey::Redemption(id) => self.rewarded_redemptions.contains(id),
            other => self.claimed_rewards.contains(&other.to_string()),
        }
    }

    /// Insert `key` into its claim set. Returns `false` if it was present.
    pub(crate) fn insert_claim(&mut self, key: &SourceKey) -> bool {
        match key {
            SourceKey::Mission(id) => self.completed_missions.insert(id.clone()),
            SourceKey::Achievement(id) => self.unlocked_achievements.insert(id.clone()),
            SourceKey::Redemption(id) => self.rewarded_redemptions.insert(id.clone()),
            other => self.claimed_rewards.insert(other.to_string()),
        }
    }

    pub fn snapshot(&self) -> EconomySnapshot {
        EconomySnapshot {
            user_id: self.user_id.clone(),
            coins: self.coins,
            xp: self.xp,
            level: self.level,
            xp_to_next_level: self.xp_to_next_level,
            plan: self.plan,
        }
    }
}

/// Read model returned to callers after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomySnapshot {
    pub user_id: UserId,
    pub coins: i64,
    pub xp: i64,
    pub level: u32,
    pub xp_to_next_level: i64,
    pub plan: Plan,
}

// ---------------------------------------------------------------------------
// Health alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub user_id: Option<UserId>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_key_display_and_parse() {
        let key = SourceKey::Mission("m-42".into());
        assert_eq!(key.to_string(), "mission:m-42");
        let parsed: SourceKey = "mission:m-42".parse().expect("test: valid key");
        assert_eq!(parsed, key);

        // ids may themselves contain colons
        let nested: SourceKey = "reversal:abc:def".parse().expect("test: nested id");
        assert_eq!(nested, SourceKey::Reversal("abc:def".into()));
    }

    #[test]
    fn source_key_rejects_malformed() {
        assert!("mission".parse::<SourceKey>().is_err());
        assert!("mission:".parse::<SourceKey>().is_err());
        assert!("bounty:7".parse::<SourceKey>().is_err());
    }

    #[test]
    fn source_key_serializes_as_string() {
        let json = serde_json::to_string(&SourceKey::Event("fanmeet".into()))
            .expect("test: serialize");
        assert_eq!(json, "\"event:fanmeet\"");
    }

    #[test]
    fn claims_route_to_their_sets() {
        let mut state = UserEconomyState::new(
            UserId::from("u1"),
            Plan::Free,
            LevelProgress { level: 1, xp_to_next_level: 1000 },
            Utc::now(),
        );
        assert!(state.insert_claim(&SourceKey::Mission("m1".into())));
        assert!(!state.insert_claim(&SourceKey::Mission("m1".into())));
        assert!(state.insert_claim(&SourceKey::Event("e1".into())));

        assert!(state.completed_missions.contains("m1"));
        assert!(state.claimed_rewards.contains("event:e1"));
        assert!(state.has_claimed(&SourceKey::Event("e1".into())));
        assert!(!state.has_claimed(&SourceKey::Achievement("m1".into())));
    }

    #[test]
    fn ledger_entry_signed_amount() {
        let entry = LedgerEntry {
            id: "x".into(),
            user_id: UserId::from("u1"),
            seq: 1,
            direction: Direction::Spend,
            currency: Currency::Coins,
            amount: 30,
            source: LedgerSource::StorePurchase,
            description: String::new(),
            timestamp: Utc::now(),
        };
        assert_eq!(entry.signed_amount(), -30);
    }
}

// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Reward Flows

//! Mission, achievement, event, redemption and subscription rewards.
//!
//! Every flow is one ledger transaction:
//!
//! ```text
//! claim(key) -> [daily mission cap] -> multiplier -> gain xp -> gain capped coins
//! ```
//!
//! The claim comes first; any later rejection discards it together with the
//! rest of the working copy.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::config::EconomyConfig;
use crate::error::{EconomyError, EconomyResult, Outcome, Rejection};
use crate::guard::claim_first;
use crate::ledger::{LedgerMutator, UserTxn};
use crate::plan::{MultiplierResolver, Plan};
use crate::ports::NotificationSink;
use crate::types::{Currency, EconomySnapshot, LedgerSource, SourceKey, UserId};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Mission payout as supplied by the submission service after it validated
/// proof of completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionReward {
    pub mission_id: String,
    pub base_xp: i64,
    pub base_coins: i64,
}

/// Any keyed reward, before the plan multiplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardGrant {
    pub key: SourceKey,
    pub base_xp: i64,
    pub base_coins: i64,
    pub description: String,
}

impl RewardGrant {
    pub fn new(key: SourceKey, base_xp: i64, base_coins: i64) -> Self {
        let description = default_description(&key);
        Self { key, base_xp, base_coins, description }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn validate(&self) -> EconomyResult<LedgerSource> {
        if self.key.id().trim().is_empty() {
            return Err(EconomyError::InvalidInput(format!("empty id in {}", self.key)));
        }
        if self.base_xp < 0 || self.base_coins < 0 {
            return Err(EconomyError::InvalidInput(format!(
                "negative base reward for {} (xp {}, coins {})",
                self.key, self.base_xp, self.base_coins
            )));
        }
        source_for(&self.key).ok_or_else(|| {
            EconomyError::InvalidInput(format!("{} is not a reward key", self.key))
        })
    }
}

impl From<&MissionReward> for RewardGrant {
    fn from(reward: &MissionReward) -> Self {
        RewardGrant::new(
            SourceKey::Mission(reward.mission_id.clone()),
            reward.base_xp,
            reward.base_coins,
        )
    }
}

fn source_for(key: &SourceKey) -> Option<LedgerSource> {
    match key {
        SourceKey::Mission(_) => Some(LedgerSource::MissionCompletion),
        SourceKey::Achievement(_) => Some(LedgerSource::AchievementUnlock),
        SourceKey::Event(_) => Some(LedgerSource::EventParticipation),
        SourceKey::Redemption(_) => Some(LedgerSource::Redemption),
        SourceKey::Subscription(_) => Some(LedgerSource::SubscriptionBonus),
        SourceKey::Reversal(_) => None,
    }
}

fn default_description(key: &SourceKey) -> String {
    match key {
        SourceKey::Mission(id) => format!("Mission {id} completed"),
        SourceKey::Achievement(id) => format!("Achievement {id} unlocked"),
        SourceKey::Event(id) => format!("Participated in event {id}"),
        SourceKey::Redemption(id) => format!("Redeemed {id}"),
        SourceKey::Subscription(id) => format!("Subscription bonus for {id}"),
        SourceKey::Reversal(id) => format!("Reversal of {id}"),
    }
}

fn notification_title(key: &SourceKey) -> &'static str {
    match key {
        SourceKey::Mission(_) => "Mission complete",
        SourceKey::Achievement(_) => "Achievement unlocked",
        SourceKey::Event(_) => "Event reward",
        SourceKey::Redemption(_) => "Code redeemed",
        SourceKey::Subscription(_) => "Subscription bonus",
        SourceKey::Reversal(_) => "Balance adjusted",
    }
}

// ---------------------------------------------------------------------------
// Receipt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewardReceipt {
    pub key: SourceKey,
    pub xp_awarded: i64,
    pub coins_awarded: i64,
    /// Coins not credited because the plan's balance cap was reached.
    pub coins_withheld: i64,
    pub level_before: u32,
    pub level_after: u32,
    pub snapshot: EconomySnapshot,
}

impl RewardReceipt {
    pub fn leveled_up(&self) -> bool {
        self.level_after > self.level_before
    }
}

/// What a reward would pay on `plan`, ignoring caps and claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RewardPreview {
    pub plan: Plan,
    pub xp: i64,
    pub coins: i64,
}

pub fn preview(resolver: &MultiplierResolver, plan: Plan, base_xp: i64, base_coins: i64) -> RewardPreview {
    RewardPreview {
        plan,
        xp: resolver.apply_multiplier(base_xp, plan),
        coins: resolver.apply_multiplier(base_coins, plan),
    }
}

/// "+15 coins, +150 XP" style summary; empty parts are skipped.
pub(crate) fn summarize(coins: i64, xp: i64) -> String {
    let mut parts = Vec::new();
    if coins > 0 {
        parts.push(format!("+{coins} coins"));
    }
    if xp > 0 {
        parts.push(format!("+{xp} XP"));
    }
    parts.join(", ")
}

/// Credit coins up to the balance cap. Returns the amount actually credited.
pub(crate) fn credit_capped(
    txn: &mut UserTxn,
    amount: i64,
    cap: i64,
    source: LedgerSource,
    description: &str,
) -> Result<i64, Rejection> {
    let headroom = cap.saturating_sub(txn.state().coins).max(0);
    let credited = amount.min(headroom).max(0);
    txn.gain(Currency::Coins, credited, source, description)?;
    Ok(credited)
}

// ---------------------------------------------------------------------------
// RewardEngine
// ---------------------------------------------------------------------------

pub struct RewardEngine {
    ledger: Arc<LedgerMutator>,
    resolver: MultiplierResolver,
    config: Arc<EconomyConfig>,
    notifier: Arc<dyn NotificationSink>,
}

impl RewardEngine {
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

    pub async fn reward_mission(
        &self,
        user_id: &UserId,
        reward: &MissionReward,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        self.grant(user_id, RewardGrant::from(reward)).await
    }

    pub async fn reward_achievement(
        &self,
        user_id: &UserId,
        achievement_id: &str,
        base_xp: i64,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        let key = SourceKey::Achievement(achievement_id.to_string());
        self.grant(user_id, RewardGrant::new(key, base_xp, base_coins)).await
    }

    pub async fn reward_event(
        &self,
        user_id: &UserId,
        event_id: &str,
        base_xp: i64,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        let key = SourceKey::Event(event_id.to_string());
        self.grant(user_id, RewardGrant::new(key, base_xp, base_coins)).await
    }

    pub async fn reward_redemption(
        &self,
        user_id: &UserId,
        code: &str,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        let key = SourceKey::Redemption(code.to_string());
        self.grant(user_id, RewardGrant::new(key, 0, base_coins)).await
    }

    /// Bonus for a paid subscription period, once per `period_id`.
    pub async fn reward_subscription(
        &self,
        user_id: &UserId,
        period_id: &str,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        let key = SourceKey::Subscription(period_id.to_string());
        self.grant(user_id, RewardGrant::new(key, 0, base_coins)).await
    }

    /// Pay a keyed reward at most once.
    pub async fn grant(
        &self,
        user_id: &UserId,
        grant: RewardGrant,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        let source = grant.validate()?;
        let resolver = self.resolver.clone();
        let config = self.config.clone();

        let outcome = self
            .ledger
            .transact(user_id, move |txn| {
                claim_first(txn, &grant.key)?;

                let plan = txn.plan();
                let limits = resolver.limits_for(plan);
                if matches!(grant.key, SourceKey::Mission(_)) {
                    let today = config.local_date(txn.now());
                    if txn.state().daily_missions.count_on(today) >= limits.daily_mission_cap {
                        return Err(Rejection::DailyMissionCapReached {
                            cap: limits.daily_mission_cap,
                        });
                    }
                    txn.record_mission(today);
                }

                let xp = resolver.apply_multiplier(grant.base_xp, plan);
                let coins = resolver.apply_multiplier(grant.base_coins, plan);
                let level_before = txn.state().level;

                txn.gain(Currency::Xp, xp, source, grant.description.as_str())?;
                let credited =
                    credit_capped(txn, coins, limits.max_balance_cap, source, &grant.description)?;

                Ok(RewardReceipt {
                    key: grant.key,
                    xp_awarded: xp,
                    coins_awarded: credited,
                    coins_withheld: coins - credited,
                    level_before,
                    level_after: txn.state().level,
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

    fn announce(&self, user_id: &UserId, receipt: &RewardReceipt) {
        info!(
            user_id = %user_id,
            key = %receipt.key,
            xp = receipt.xp_awarded,
            coins = receipt.coins_awarded,
            withheld = receipt.coins_withheld,
            "reward paid"
        );
        let summary = summarize(receipt.coins_awarded, receipt.xp_awarded);
        if !summary.is_empty() {
            self.notifier.notify(user_id, notification_title(&receipt.key), &summary);
        }
        if receipt.leveled_up() {
            self.notifier.notify(
                user_id,
                "Level up!",
                &format!("You reached level {}", receipt.level_after),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ports::{FixedClock, MemorySink};
    use crate::store::{EconomyStore, LedgerQuery};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        sink: Arc<MemorySink>,
        ledger: Arc<LedgerMutator>,
        rewards: RewardEngine,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).single().expect("test: valid date"),
        ));
        let sink = Arc::new(MemorySink::new());
        let config = Arc::new(EconomyConfig::default());
        let ledger = Arc::new(LedgerMutator::new(
            store.clone(),
            clock.clone(),
            sink.clone(),
            config.level_curve,
        ));
        let rewards = RewardEngine::new(ledger.clone(), config, sink.clone());
        Fixture { store, clock, sink, ledger, rewards }
    }

    fn mission(id: &str, xp: i64, coins: i64) -> MissionReward {
        MissionReward { mission_id: id.into(), base_xp: xp, base_coins: coins }
    }

    #[tokio::test]
    async fn pro_plan_multiplies_mission_reward() {
        let f = fixture();
        let user = UserId::from("pro-fan");
        f.ledger.open_account(&user, Plan::Pro).await.expect("test: open");

        let receipt = f
            .rewards
            .reward_mission(&user, &mission("m1", 100, 10))
            .await
            .expect("test: reward")
            .applied()
            .expect("test: applied");
        assert_eq!(receipt.xp_awarded, 150);
        assert_eq!(receipt.coins_awarded, 15);
        assert_eq!(receipt.snapshot.xp, 150);
        assert_eq!(receipt.snapshot.coins, 15);

        let state = f.ledger.load(&user).await.expect("test: load");
        assert_eq!(state.total_missions_completed, 1);
        assert!(state.completed_missions.contains("m1"));
    }

    #[tokio::test]
    async fn duplicate_mission_pays_once() {
        let f = fixture();
        let user = UserId::from("fan");
        f.ledger.open_account(&user, Plan::Free).await.expect("test: open");

        let first = f.rewards.reward_mission(&user, &mission("m1", 100, 10)).await.expect("test: first");
        assert!(first.is_applied());
        let second = f.rewards.reward_mission(&user, &mission("m1", 100, 10)).await.expect("test: second");
        assert_eq!(second.code(), Some("ALREADY_REWARDED"));

        let state = f.ledger.load(&user).await.expect("test: load");
        assert_eq!(state.coins, 10);
        assert_eq!(state.xp, 100);
        assert_eq!(state.total_missions_completed, 1);

        let entries = f
            .store
            .query_ledger(&LedgerQuery::for_user(&user).currency(Currency::Coins))
            .await
            .expect("test: ledger");
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn daily_mission_cap_resets_next_day() {
        let f = fixture();
        let user = UserId::from("busy-fan");
        f.ledger.open_account(&user, Plan::Free).await.expect("test: open");

        for id in ["a", "b", "c"] {
            let outcome = f.rewards.reward_mission(&user, &mission(id, 10, 1)).await.expect("test: reward");
            assert!(outcome.is_applied(), "mission {id} should pay");
        }
        let capped = f.rewards.reward_mission(&user, &mission("d", 10, 1)).await.expect("test: capped");
        assert_eq!(capped.code(), Some("DAILY_MISSION_CAP_REACHED"));
        // the capped mission was not claimed
        let state = f.ledger.load(&user).await.expect("test: load");
        assert!(!state.completed_missions.contains("d"));

        f.clock.advance_days(1);
        let next_day = f.rewards.reward_mission(&user, &mission("d", 10, 1)).await.expect("test: next day");
        assert!(next_day.is_applied());
    }

    #[tokio::test]
    async fn coins_stop_at_balance_cap() {
        let f = fixture();
        let user = UserId::from("rich-fan");
        f.ledger.open_account(&user, Plan::Free).await.expect("test: open");
        f.ledger
            .apply_gain(&user, Currency::Coins, 9_990, LedgerSource::AdminGrant, "seed")
            .await
            .expect("test: seed");

        let receipt = f
            .rewards
            .reward_achievement(&user, "collector", 50, 25)
            .await
            .expect("test: reward")
            .applied()
            .expect("test: applied");
        assert_eq!(receipt.coins_awarded, 10);
        assert_eq!(receipt.coins_withheld, 15);
        assert_eq!(receipt.xp_awarded, 50);
        assert_eq!(receipt.snapshot.coins, 10_000);
    }

    #[tokio::test]
    async fn level_up_notifies() {
        let f = fixture();
        let user = UserId::from("climber");
        f.ledger.open_account(&user, Plan::Free).await.expect("test: open");

        let receipt = f
            .rewards
            .reward_event(&user, "tour-kickoff", 1_200, 0)
            .await
            .expect("test: reward")
            .applied()
            .expect("test: applied");
        assert!(receipt.leveled_up());
        assert_eq!(receipt.level_after, 2);

        let notes = f.sink.notifications();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].body, "+1200 XP");
        assert_eq!(notes[1].title, "Level up!");
    }

    #[tokio::test]
    async fn negative_base_is_invalid_input() {
        let f = fixture();
        let user = UserId::from("fan");
        f.ledger.open_account(&user, Plan::Free).await.expect("test: open");

        let err = f
            .rewards
            .reward_mission(&user, &mission("m1", -5, 10))
            .await
            .expect_err("test: invalid");
        assert_eq!(err.code(), "INVALID_INPUT");

        let err = f
            .rewards
            .grant(&user, RewardGrant::new(SourceKey::Reversal("e1".into()), 0, 10))
            .await
            .expect_err("test: reversal is not a reward");
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn failed_write_keeps_reward_claimable() {
        let f = fixture();
        let user = UserId::from("fan");
        f.ledger.open_account(&user, Plan::Free).await.expect("test: open");

        f.store.fail_next_commits(1);
        let err = f
            .rewards
            .reward_redemption(&user, "PROMO-2026", 100)
            .await
            .expect_err("test: store failure");
        assert_eq!(err.code(), "STORE_UNAVAILABLE");

        let retry = f.rewards.reward_redemption(&user, "PROMO-2026", 100).await.expect("test: retry");
        assert!(retry.is_applied());
        let state = f.store.load_user(&user).await.expect("test: load").expect("test: user");
        assert_eq!(state.coins, 100);
        assert!(state.rewarded_redemptions.contains("PROMO-2026"));
    }

    #[test]
    fn preview_matches_paid_amounts() {
        let resolver = MultiplierResolver::default();
        let p = preview(&resolver, Plan::Plus, 100, 7);
        assert_eq!((p.xp, p.coins), (125, 8));
    }

    #[test]
    fn summary_formatting() {
        assert_eq!(summarize(15, 150), "+15 coins, +150 XP");
        assert_eq!(summarize(0, 0), "");
        assert_eq!(summarize(50, 0), "+50 coins");
    }
}

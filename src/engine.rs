// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Engine Facade

//! [`EconomyEngine`] wires every component around one injected store handle.
//!
//! ```ignore
//! let engine = EconomyEngine::builder(Arc::new(MemoryStore::new()))
//!     .config(EconomyConfig::load("economy.json")?)
//!     .notifier(push_service)
//!     .build()?;
//! engine.open_account(&user, Plan::Plus).await?;
//! engine.perform_checkin(&user).await?;
//! ```

use std::sync::Arc;

use crate::admin::{AdminTools, RefundReceipt};
use crate::checkin::{CheckinEngine, CheckinReceipt};
use crate::config::{ConfigError, EconomyConfig};
use crate::error::{EconomyResult, Outcome};
use crate::guard::RewardGuard;
use crate::leaderboard::{self, LeaderboardEntry};
use crate::ledger::{LedgerMutator, LedgerReceipt};
use crate::plan::{MultiplierResolver, Plan};
use crate::ports::{
    Clock, NoSubmissions, NoopSink, NotificationSink, SubmissionSource, SystemClock, TelemetrySink,
};
use crate::purchase::{PurchaseReceipt, PurchaseRequest, StoreCheckout};
use crate::rewards::{MissionReward, RewardEngine, RewardGrant, RewardReceipt};
use crate::sentinel::EconomySentinel;
use crate::store::{EconomyStore, LedgerQuery};
use crate::sync::{ConsistencySync, SyncReport};
use crate::types::{
    AuditEvent, Currency, EconomySnapshot, HealthAlert, LedgerEntry, LedgerSource, SourceKey,
    UserId,
};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct EngineBuilder {
    store: Arc<dyn EconomyStore>,
    config: EconomyConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationSink>,
    telemetry: Arc<dyn TelemetrySink>,
    submissions: Arc<dyn SubmissionSource>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EconomyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn submissions(mut self, submissions: Arc<dyn SubmissionSource>) -> Self {
        self.submissions = submissions;
        self
    }

    /// Validate the configuration and assemble the engine.
    pub fn build(self) -> Result<EconomyEngine, ConfigError> {
        self.config.validate()?;
        let config = Arc::new(self.config);
        let ledger = Arc::new(LedgerMutator::new(
            self.store.clone(),
            self.clock.clone(),
            self.telemetry.clone(),
            config.level_curve,
        ));
        let resolver = MultiplierResolver::new(config.plans.clone());

        Ok(EconomyEngine {
            guard: RewardGuard::new(ledger.clone()),
            rewards: RewardEngine::new(ledger.clone(), config.clone(), self.notifier.clone()),
            checkin: CheckinEngine::new(ledger.clone(), config.clone(), self.notifier),
            checkout: StoreCheckout::new(ledger.clone(), resolver.clone()),
            admin: AdminTools::new(ledger.clone()),
            sync: ConsistencySync::new(ledger.clone(), self.submissions, self.telemetry),
            sentinel: EconomySentinel::new(self.store.clone(), self.clock, config.sentinel.clone()),
            store: self.store,
            resolver,
            config,
            ledger,
        })
    }
}

// ---------------------------------------------------------------------------
// EconomyEngine
// ---------------------------------------------------------------------------

pub struct EconomyEngine {
    store: Arc<dyn EconomyStore>,
    config: Arc<EconomyConfig>,
    resolver: MultiplierResolver,
    ledger: Arc<LedgerMutator>,
    guard: RewardGuard,
    rewards: RewardEngine,
    checkin: CheckinEngine,
    checkout: StoreCheckout,
    admin: AdminTools,
    sync: ConsistencySync,
    sentinel: EconomySentinel,
}

impl EconomyEngine {
    /// Builder with default config, system clock, no-op sinks and no
    /// submission source.
    pub fn builder(store: Arc<dyn EconomyStore>) -> EngineBuilder {
        EngineBuilder {
            store,
            config: EconomyConfig::default(),
            clock: Arc::new(SystemClock),
            notifier: Arc::new(NoopSink),
            telemetry: Arc::new(NoopSink),
            submissions: Arc::new(NoSubmissions),
        }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn resolver(&self) -> &MultiplierResolver {
        &self.resolver
    }

    // -- accounts --------------------------------------------------------------

    pub async fn open_account(&self, user_id: &UserId, plan: Plan) -> EconomyResult<EconomySnapshot> {
        Ok(self.ledger.open_account(user_id, plan).await?.snapshot())
    }

    pub async fn get_economy_snapshot(&self, user_id: &UserId) -> EconomyResult<EconomySnapshot> {
        Ok(self.ledger.load(user_id).await?.snapshot())
    }

    /// Ledger entries of `user_id` in sequence order, optionally only the
    /// most recent `limit`.
    pub async fn ledger_history(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> EconomyResult<Vec<LedgerEntry>> {
        let mut query = LedgerQuery::for_user(user_id);
        query.limit = limit;
        Ok(self.store.query_ledger(&query).await?)
    }

    pub async fn audit_log(&self, user_id: Option<&UserId>) -> EconomyResult<Vec<AuditEvent>> {
        Ok(self.store.audit_log(user_id).await?)
    }

    // -- ledger ----------------------------------------------------------------

    pub async fn apply_gain(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        self.ledger.apply_gain(user_id, currency, amount, source, description).await
    }

    pub async fn apply_spend(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        source: LedgerSource,
        description: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        self.ledger.apply_spend(user_id, currency, amount, source, description).await
    }

    // -- check-in --------------------------------------------------------------

    pub async fn can_checkin(&self, user_id: &UserId) -> EconomyResult<bool> {
        self.checkin.can_checkin(user_id).await
    }

    pub async fn perform_checkin(&self, user_id: &UserId) -> EconomyResult<Outcome<CheckinReceipt>> {
        self.checkin.perform_checkin(user_id).await
    }

    // -- rewards ---------------------------------------------------------------

    pub async fn try_claim(&self, user_id: &UserId, key: &SourceKey) -> EconomyResult<bool> {
        self.guard.try_claim(user_id, key).await
    }

    pub async fn reward_mission(
        &self,
        user_id: &UserId,
        reward: &MissionReward,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        self.rewards.reward_mission(user_id, reward).await
    }

    pub async fn reward_achievement(
        &self,
        user_id: &UserId,
        achievement_id: &str,
        base_xp: i64,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        self.rewards.reward_achievement(user_id, achievement_id, base_xp, base_coins).await
    }

    pub async fn reward_event(
        &self,
        user_id: &UserId,
        event_id: &str,
        base_xp: i64,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        self.rewards.reward_event(user_id, event_id, base_xp, base_coins).await
    }

    pub async fn reward_redemption(
        &self,
        user_id: &UserId,
        code: &str,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        self.rewards.reward_redemption(user_id, code, base_coins).await
    }

    pub async fn reward_subscription(
        &self,
        user_id: &UserId,
        period_id: &str,
        base_coins: i64,
    ) -> EconomyResult<Outcome<RewardReceipt>> {
        self.rewards.reward_subscription(user_id, period_id, base_coins).await
    }

    pub async fn grant(&self, user_id: &UserId, grant: RewardGrant) -> EconomyResult<Outcome<RewardReceipt>> {
        self.rewards.grant(user_id, grant).await
    }

    // -- store -----------------------------------------------------------------

    pub async fn purchase(
        &self,
        user_id: &UserId,
        request: &PurchaseRequest,
    ) -> EconomyResult<Outcome<PurchaseReceipt>> {
        self.checkout.purchase(user_id, request).await
    }

    // -- admin -----------------------------------------------------------------

    pub async fn admin_grant(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        reason: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        self.admin.admin_grant(user_id, currency, amount, reason).await
    }

    pub async fn admin_deduct(
        &self,
        user_id: &UserId,
        currency: Currency,
        amount: i64,
        reason: &str,
    ) -> EconomyResult<Outcome<LedgerReceipt>> {
        self.admin.admin_deduct(user_id, currency, amount, reason).await
    }

    pub async fn admin_refund(
        &self,
        user_id: &UserId,
        entry_id: &str,
        reason: &str,
    ) -> EconomyResult<Outcome<RefundReceipt>> {
        self.admin.admin_refund(user_id, entry_id, reason).await
    }

    pub async fn set_plan(&self, user_id: &UserId, plan: Plan) -> EconomyResult<EconomySnapshot> {
        self.admin.set_plan(user_id, plan).await
    }

    // -- maintenance -----------------------------------------------------------

    pub async fn run_consistency_sync(&self, user_id: Option<&UserId>) -> EconomyResult<SyncReport> {
        self.sync.run(user_id).await
    }

    pub async fn get_economy_alerts(&self) -> EconomyResult<Vec<HealthAlert>> {
        self.sentinel.alerts().await
    }

    pub async fn leaderboard(&self, limit: usize) -> EconomyResult<Vec<LeaderboardEntry>> {
        leaderboard::leaderboard(self.store.as_ref(), limit).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn invalid_config_fails_build() {
        let mut config = EconomyConfig::default();
        config.checkin.milestone_days = 0;
        let result = EconomyEngine::builder(Arc::new(MemoryStore::new())).config(config).build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn snapshot_of_new_account() {
        let engine = EconomyEngine::builder(Arc::new(MemoryStore::new()))
            .build()
            .expect("test: build");
        let user = UserId::from("newcomer");
        engine.open_account(&user, Plan::Plus).await.expect("test: open");

        let snapshot = engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        assert_eq!((snapshot.coins, snapshot.xp, snapshot.level), (0, 0, 1));
        assert_eq!(snapshot.xp_to_next_level, 1000);
        assert_eq!(snapshot.plan, Plan::Plus);

        let err = engine.open_account(&user, Plan::Free).await.expect_err("test: duplicate");
        assert_eq!(err.code(), "USER_EXISTS");
    }

    #[tokio::test]
    async fn history_limit_keeps_latest() {
        let engine = EconomyEngine::builder(Arc::new(MemoryStore::new()))
            .build()
            .expect("test: build");
        let user = UserId::from("historian");
        engine.open_account(&user, Plan::Free).await.expect("test: open");
        for amount in [5, 10, 15] {
            engine
                .admin_grant(&user, Currency::Coins, amount, "seed")
                .await
                .expect("test: grant");
        }
        let last_two = engine.ledger_history(&user, Some(2)).await.expect("test: history");
        assert_eq!(last_two.iter().map(|e| e.amount).collect::<Vec<_>>(), vec![10, 15]);
    }
}

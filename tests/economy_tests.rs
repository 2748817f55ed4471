#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    use economy_ledger::ports::{FixedClock, MemorySink, SubmissionTable};
    use economy_ledger::purchase::PurchaseRequest;
    use economy_ledger::rewards::MissionReward;
    use economy_ledger::{
        level_for_xp, AuditKind, Currency, Direction, EconomyConfig, EconomyEngine, EconomyStore,
        LedgerEntry, LedgerSource, MemoryStore, Plan, Severity, SourceKey, UserEconomyState, UserId,
    };

    struct Harness {
        store: Arc<MemoryStore>,
        clock: Arc<FixedClock>,
        sink: Arc<MemorySink>,
        submissions: Arc<SubmissionTable>,
        engine: Arc<EconomyEngine>,
    }

    fn harness_with(config: EconomyConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 4, 6, 10, 0, 0).single().expect("test: valid date"),
        ));
        let sink = Arc::new(MemorySink::new());
        let submissions = Arc::new(SubmissionTable::new());
        let engine = EconomyEngine::builder(store.clone())
            .config(config)
            .clock(clock.clone())
            .notifier(sink.clone())
            .telemetry(sink.clone())
            .submissions(submissions.clone())
            .build()
            .expect("test: build engine");
        Harness { store, clock, sink, submissions, engine: Arc::new(engine) }
    }

    fn harness() -> Harness {
        harness_with(EconomyConfig::default())
    }

    async fn account(h: &Harness, id: &str, plan: Plan) -> UserId {
        let user = UserId::from(id);
        h.engine.open_account(&user, plan).await.expect("test: open account");
        user
    }

    fn mission(id: &str, xp: i64, coins: i64) -> MissionReward {
        MissionReward { mission_id: id.into(), base_xp: xp, base_coins: coins }
    }

    // ========== Ledger ==========

    #[tokio::test]
    async fn test_scenario_a_spend_and_overspend() {
        let h = harness();
        let user = account(&h, "scenario-a", Plan::Free).await;
        h.engine
            .apply_gain(&user, Currency::Coins, 100, LedgerSource::AdminGrant, "opening balance")
            .await
            .expect("test: gain");

        let spend = h
            .engine
            .apply_spend(&user, Currency::Coins, 50, LedgerSource::StorePurchase, "poster")
            .await
            .expect("test: spend")
            .applied()
            .expect("test: spend applied");
        assert_eq!(spend.state.coins, 50);

        let spends: Vec<LedgerEntry> = h
            .engine
            .ledger_history(&user, None)
            .await
            .expect("test: history")
            .into_iter()
            .filter(|e| e.direction == Direction::Spend)
            .collect();
        assert_eq!(spends.len(), 1);
        assert_eq!(spends[0].amount, 50);

        let over = h
            .engine
            .apply_spend(&user, Currency::Coins, 200, LedgerSource::StorePurchase, "hoodie")
            .await
            .expect("test: overspend call");
        assert_eq!(over.code(), Some("INSUFFICIENT_FUNDS"));
        assert_eq!(h.engine.get_economy_snapshot(&user).await.expect("test: snapshot").coins, 50);
    }

    #[tokio::test]
    async fn test_gain_spend_round_trip_nets_zero() {
        let h = harness();
        let user = account(&h, "round-trip", Plan::Free).await;
        h.engine
            .apply_gain(&user, Currency::Coins, 40, LedgerSource::AdminGrant, "base")
            .await
            .expect("test: base");
        let before = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot").coins;

        h.engine
            .apply_gain(&user, Currency::Coins, 25, LedgerSource::AdminGrant, "in")
            .await
            .expect("test: gain");
        h.engine
            .apply_spend(&user, Currency::Coins, 25, LedgerSource::StorePurchase, "out")
            .await
            .expect("test: spend");

        let after = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot").coins;
        assert_eq!(before, after);
        let last_two = h.engine.ledger_history(&user, Some(2)).await.expect("test: history");
        assert_eq!(last_two.iter().map(LedgerEntry::signed_amount).sum::<i64>(), 0);
    }

    #[tokio::test]
    async fn test_store_outage_changes_nothing() {
        let h = harness();
        let user = account(&h, "outage", Plan::Free).await;
        h.engine
            .apply_gain(&user, Currency::Coins, 100, LedgerSource::AdminGrant, "seed")
            .await
            .expect("test: seed");

        h.store.fail_next_commits(1);
        let err = h
            .engine
            .reward_mission(&user, &mission("m-outage", 100, 10))
            .await
            .expect_err("test: outage");
        assert!(err.is_retryable());

        let snapshot = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        assert_eq!((snapshot.coins, snapshot.xp), (100, 0));
        assert_eq!(h.engine.ledger_history(&user, None).await.expect("test: history").len(), 1);

        // the mission was not claimed, so the retry pays
        let retry = h
            .engine
            .reward_mission(&user, &mission("m-outage", 100, 10))
            .await
            .expect("test: retry");
        assert!(retry.is_applied());
    }

    #[tokio::test]
    async fn test_concurrent_purchases_never_overdraw() {
        let h = harness();
        let user = account(&h, "flash-sale", Plan::Free).await;
        h.engine
            .apply_gain(&user, Currency::Coins, 1_000, LedgerSource::AdminGrant, "seed")
            .await
            .expect("test: seed");

        let mut handles = Vec::new();
        for i in 0..40 {
            let engine = h.engine.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                let request = PurchaseRequest { item_id: format!("drop-{i}"), base_price: 70 };
                engine.purchase(&user, &request).await.expect("test: purchase call").is_applied()
            }));
        }
        let mut bought = 0;
        for handle in handles {
            if handle.await.expect("test: join") {
                bought += 1;
            }
        }

        assert_eq!(bought, 14);
        let snapshot = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        assert_eq!(snapshot.coins, 1_000 - 14 * 70);
        assert!(snapshot.coins >= 0);
    }

    // ========== Rewards ==========

    #[tokio::test]
    async fn test_scenario_b_pro_multiplier() {
        let h = harness();
        let user = account(&h, "scenario-b", Plan::Pro).await;
        let receipt = h
            .engine
            .reward_mission(&user, &mission("m-b", 100, 10))
            .await
            .expect("test: reward")
            .applied()
            .expect("test: applied");
        assert_eq!((receipt.xp_awarded, receipt.coins_awarded), (150, 15));

        let snapshot = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        assert_eq!((snapshot.xp, snapshot.coins), (150, 15));
    }

    #[tokio::test]
    async fn test_mission_reward_is_idempotent() {
        let h = harness();
        let user = account(&h, "idempotent", Plan::Free).await;
        let first = h.engine.reward_mission(&user, &mission("m-1", 80, 8)).await.expect("test: first");
        assert!(first.is_applied());
        let entries_after_first = h.engine.ledger_history(&user, None).await.expect("test: history").len();

        let second = h.engine.reward_mission(&user, &mission("m-1", 80, 8)).await.expect("test: second");
        assert_eq!(second.code(), Some("ALREADY_REWARDED"));
        assert_eq!(
            h.engine.ledger_history(&user, None).await.expect("test: history").len(),
            entries_after_first
        );
        let snapshot = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        assert_eq!((snapshot.xp, snapshot.coins), (80, 8));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_missions_pay_once() {
        let h = harness();
        let user = account(&h, "replayed", Plan::Elite).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let engine = h.engine.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .reward_mission(&user, &mission("m-replay", 50, 5))
                    .await
                    .expect("test: reward call")
                    .is_applied()
            }));
        }
        let mut paid = 0;
        for handle in handles {
            if handle.await.expect("test: join") {
                paid += 1;
            }
        }
        assert_eq!(paid, 1);
        let snapshot = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        assert_eq!((snapshot.xp, snapshot.coins), (100, 10));
    }

    #[tokio::test]
    async fn test_try_claim_blocks_later_reward() {
        let h = harness();
        let user = account(&h, "pre-claimed", Plan::Free).await;
        let key: SourceKey = "achievement:first-listen".parse().expect("test: key");
        assert!(h.engine.try_claim(&user, &key).await.expect("test: claim"));

        let outcome = h
            .engine
            .reward_achievement(&user, "first-listen", 100, 10)
            .await
            .expect("test: reward");
        assert_eq!(outcome.code(), Some("ALREADY_REWARDED"));
    }

    #[tokio::test]
    async fn test_level_up_notification_and_telemetry() {
        let h = harness();
        let user = account(&h, "leveler", Plan::Free).await;
        h.engine
            .reward_event(&user, "album-launch", 1_000, 20)
            .await
            .expect("test: reward");

        let titles: Vec<String> = h.sink.notifications().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Event reward".to_string(), "Level up!".to_string()]);
        assert_eq!(h.sink.events_named("reward").len(), 2);
    }

    #[tokio::test]
    async fn test_subscription_bonus_once_per_period() {
        let h = harness();
        let user = account(&h, "subscriber", Plan::Plus).await;
        let first = h
            .engine
            .reward_subscription(&user, "2026-04", 200)
            .await
            .expect("test: first")
            .applied()
            .expect("test: applied");
        assert_eq!(first.coins_awarded, 250);
        let again = h.engine.reward_subscription(&user, "2026-04", 200).await.expect("test: again");
        assert_eq!(again.code(), Some("ALREADY_REWARDED"));
        let next = h.engine.reward_subscription(&user, "2026-05", 200).await.expect("test: next");
        assert!(next.is_applied());
    }

    // ========== Levels ==========

    #[test]
    fn test_level_is_monotonic() {
        let mut last = 0;
        for xp in (0..50_000).step_by(37) {
            let level = level_for_xp(xp).level;
            assert!(level >= last, "level dropped at xp {xp}");
            last = level;
        }
    }

    // ========== Check-ins ==========

    #[tokio::test]
    async fn test_streak_milestone_and_reset() {
        let h = harness();
        let user = account(&h, "streaker", Plan::Free).await;

        for day in 1..=7 {
            let receipt = h
                .engine
                .perform_checkin(&user)
                .await
                .expect("test: checkin")
                .applied()
                .expect("test: applied");
            assert_eq!(receipt.streak_day, day);
            assert_eq!(receipt.milestone_reached, day == 7);
            h.clock.advance_days(1);
        }
        let state = h.store.load_user(&user).await.expect("test: load").expect("test: user");
        assert_eq!(state.streak.count, 0);

        let bonus_entries = h
            .engine
            .ledger_history(&user, None)
            .await
            .expect("test: history")
            .into_iter()
            .filter(|e| e.source == LedgerSource::StreakBonus)
            .count();
        assert_eq!(bonus_entries, 1);
    }

    #[tokio::test]
    async fn test_skipped_day_resets_streak_to_one() {
        let h = harness();
        let user = account(&h, "skipper", Plan::Free).await;
        for _ in 1..=3 {
            h.engine.perform_checkin(&user).await.expect("test: checkin");
            h.clock.advance_days(1);
        }
        // day 4 skipped
        h.clock.advance_days(1);
        let day5 = h
            .engine
            .perform_checkin(&user)
            .await
            .expect("test: checkin")
            .applied()
            .expect("test: applied");
        assert_eq!(day5.streak, 1);
    }

    #[tokio::test]
    async fn test_local_day_follows_utc_offset() {
        // UTC-5: 2026-04-06 10:00 UTC is 05:00 local; 2026-04-07 03:00 UTC is still the 6th locally
        let config = EconomyConfig { utc_offset_minutes: -300, ..EconomyConfig::default() };
        let h = harness_with(config);
        let user = account(&h, "night-owl", Plan::Free).await;

        h.engine.perform_checkin(&user).await.expect("test: checkin");
        h.clock.advance(chrono::Duration::hours(17));
        assert!(!h.engine.can_checkin(&user).await.expect("test: eligibility"));
        h.clock.advance(chrono::Duration::hours(3));
        assert!(h.engine.can_checkin(&user).await.expect("test: eligibility"));
    }

    // ========== Store & admin ==========

    #[tokio::test]
    async fn test_purchase_then_refund() {
        let h = harness();
        let user = account(&h, "returner", Plan::Pro).await;
        h.engine
            .admin_grant(&user, Currency::Coins, 300, "welcome pack")
            .await
            .expect("test: grant");

        let receipt = h
            .engine
            .purchase(&user, &PurchaseRequest { item_id: "vinyl".into(), base_price: 250 })
            .await
            .expect("test: purchase")
            .applied()
            .expect("test: applied");
        assert_eq!(receipt.price_paid, 225);
        let entry = receipt.entry.expect("test: entry");

        let refund = h
            .engine
            .admin_refund(&user, &entry.id, "damaged in shipping")
            .await
            .expect("test: refund")
            .applied()
            .expect("test: refund applied");
        assert_eq!(refund.snapshot.coins, 300);

        let repeat = h.engine.admin_refund(&user, &entry.id, "again").await.expect("test: repeat");
        assert_eq!(repeat.code(), Some("ALREADY_REWARDED"));

        let refunds = h
            .engine
            .ledger_history(&user, None)
            .await
            .expect("test: history")
            .into_iter()
            .filter(|e| e.source == LedgerSource::AdminRefund)
            .count();
        assert_eq!(refunds, 1);
    }

    #[tokio::test]
    async fn test_plan_change_applies_to_next_reward() {
        let h = harness();
        let user = account(&h, "upgrader", Plan::Free).await;
        h.engine.set_plan(&user, Plan::Elite).await.expect("test: set plan");
        let receipt = h
            .engine
            .reward_achievement(&user, "superfan", 100, 10)
            .await
            .expect("test: reward")
            .applied()
            .expect("test: applied");
        assert_eq!((receipt.xp_awarded, receipt.coins_awarded), (200, 20));
    }

    // ========== Self-heal & sentinel ==========

    #[tokio::test]
    async fn test_scenario_c_self_heal() {
        let h = harness();
        let user = UserId::from("scenario-c");
        let mut corrupt = UserEconomyState::new(user.clone(), Plan::Free, level_for_xp(0), Utc::now());
        corrupt.coins = -20;
        corrupt.xp = 500;
        corrupt.level = 1;
        corrupt.xp_to_next_level = 1_000;
        h.store.import_user(corrupt).await;

        let alerts = h.engine.get_economy_alerts().await.expect("test: alerts");
        assert!(alerts.iter().any(|a| a.severity == Severity::Critical));

        let report = h.engine.run_consistency_sync(Some(&user)).await.expect("test: sync");
        assert!(report.corrections.iter().any(|a| a.kind == AuditKind::NegativeBalanceFix));

        let snapshot = h.engine.get_economy_snapshot(&user).await.expect("test: snapshot");
        let expected = level_for_xp(500);
        assert_eq!(snapshot.coins, 0);
        assert_eq!(snapshot.level, expected.level);
        assert_eq!(snapshot.xp_to_next_level, expected.xp_to_next_level);
        assert_eq!(
            h.engine.audit_log(Some(&user)).await.expect("test: audit").len(),
            report.corrections.len()
        );
        assert!(!h.engine
            .get_economy_alerts()
            .await
            .expect("test: alerts")
            .iter()
            .any(|a| a.severity == Severity::Critical));
    }

    #[tokio::test]
    async fn test_sync_repairs_mission_counter_from_submissions() {
        let h = harness();
        let user = account(&h, "counter", Plan::Free).await;
        h.engine.reward_mission(&user, &mission("m-1", 10, 1)).await.expect("test: reward");
        h.submissions.set(&user, 3);

        let report = h.engine.run_consistency_sync(None).await.expect("test: sync");
        assert_eq!(report.corrections.len(), 1);
        let state = h.store.load_user(&user).await.expect("test: load").expect("test: user");
        assert_eq!(state.total_missions_completed, 3);
        assert_eq!(h.sink.events_named("self_heal_correction").len(), 1);
    }

    #[tokio::test]
    async fn test_whale_alert() {
        let h = harness();
        let user = account(&h, "big-spender", Plan::Elite).await;
        h.engine
            .admin_grant(&user, Currency::Coins, 6_000, "contest prize")
            .await
            .expect("test: grant");
        let alerts = h.engine.get_economy_alerts().await.expect("test: alerts");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn test_leaderboard_ranks_by_xp() {
        let h = harness();
        let a = account(&h, "a", Plan::Free).await;
        let b = account(&h, "b", Plan::Free).await;
        h.engine.reward_mission(&a, &mission("m", 100, 0)).await.expect("test: a");
        h.engine.reward_mission(&b, &mission("m", 300, 0)).await.expect("test: b");

        let board = h.engine.leaderboard(10).await.expect("test: leaderboard");
        assert_eq!(board[0].user_id, b);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[1].user_id, a);
    }
}

// Monte Carlo Infrastructure: N seeded runs per scenario with statistical aggregation
// Each run drives concurrent tokio tasks against one engine, then audits the result

use chrono::{TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use economy_ledger::ports::FixedClock;
use economy_ledger::purchase::PurchaseRequest;
use economy_ledger::rewards::MissionReward;
use economy_ledger::{
    Currency, EconomyEngine, EconomyError, EconomyResult, EconomyStore, LedgerEntry, LedgerQuery,
    LedgerSource, MemoryStore, Outcome, Plan, Severity, UserId,
};

use crate::report::*;
use crate::scenarios::Scenario;

const MAX_ATTEMPTS: u32 = 3;

// ─── Operations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Checkin { user: usize },
    Mission { user: usize, reward: MissionReward },
    Achievement { user: usize, id: String, xp: i64, coins: i64 },
    Purchase { user: usize, request: PurchaseRequest },
    AdminGrant { user: usize, amount: i64 },
    Refund { user: usize },
}

enum OpResult {
    Applied,
    Rejected(&'static str),
    Failed(&'static str),
}

fn classify<T>(result: EconomyResult<Outcome<T>>) -> Result<OpResult, EconomyError> {
    match result? {
        Outcome::Applied(_) => Ok(OpResult::Applied),
        Outcome::Rejected(rejection) => Ok(OpResult::Rejected(rejection.code())),
    }
}

fn pick_plan(rng: &mut ChaCha8Rng, mix: [u32; 4]) -> Plan {
    let total: u32 = mix.iter().sum();
    if total == 0 {
        return Plan::Free;
    }
    let mut roll = rng.gen_range(0..total);
    for (plan, weight) in Plan::ALL.into_iter().zip(mix) {
        if roll < weight {
            return plan;
        }
        roll -= weight;
    }
    Plan::Free
}

fn pick_op(rng: &mut ChaCha8Rng, scenario: &Scenario, day: u32, n: usize) -> Op {
    let w = &scenario.weights;
    let user = rng.gen_range(0..scenario.users);
    let mut roll = rng.gen_range(0..w.total().max(1));

    if roll < w.checkin {
        return Op::Checkin { user };
    }
    roll -= w.checkin;
    if roll < w.mission {
        let reward = MissionReward {
            mission_id: format!("d{day}-m{n}"),
            base_xp: rng.gen_range(10..=200),
            base_coins: rng.gen_range(0..=50),
        };
        return Op::Mission { user, reward };
    }
    roll -= w.mission;
    if roll < w.achievement {
        // small id space so the same achievement is hit repeatedly
        let id = format!("ach-{}", rng.gen_range(0..8));
        return Op::Achievement { user, id, xp: 250, coins: 100 };
    }
    roll -= w.achievement;
    if roll < w.purchase {
        let request = PurchaseRequest {
            item_id: format!("item-{}", rng.gen_range(0..20)),
            base_price: rng.gen_range(5..=150),
        };
        return Op::Purchase { user, request };
    }
    roll -= w.purchase;
    if roll < w.admin_grant {
        return Op::AdminGrant { user, amount: rng.gen_range(10..=500) };
    }
    Op::Refund { user }
}

async fn execute(engine: &EconomyEngine, users: &[UserId], op: &Op) -> Result<OpResult, EconomyError> {
    match op {
        Op::Checkin { user } => classify(engine.perform_checkin(&users[*user]).await),
        Op::Mission { user, reward } => classify(engine.reward_mission(&users[*user], reward).await),
        Op::Achievement { user, id, xp, coins } => {
            classify(engine.reward_achievement(&users[*user], id, *xp, *coins).await)
        }
        Op::Purchase { user, request } => classify(engine.purchase(&users[*user], request).await),
        Op::AdminGrant { user, amount } => classify(
            engine
                .admin_grant(&users[*user], Currency::Coins, *amount, "bench top-up")
                .await,
        ),
        Op::Refund { user } => {
            let user_id = &users[*user];
            let history = engine.ledger_history(user_id, Some(10)).await?;
            match history.iter().rev().find(|e| e.source == LedgerSource::StorePurchase) {
                Some(entry) => classify(engine.admin_refund(user_id, &entry.id, "bench refund").await),
                None => Ok(OpResult::Rejected("NO_PURCHASE")),
            }
        }
    }
}

/// Run `op`, retrying retryable failures. Returns the result and retry count.
async fn execute_with_retry(engine: &EconomyEngine, users: &[UserId], op: &Op) -> (OpResult, u64) {
    let mut retries = 0;
    loop {
        match execute(engine, users, op).await {
            Ok(result) => return (result, retries),
            Err(err) if err.is_retryable() && retries + 1 < u64::from(MAX_ATTEMPTS) => {
                debug!(error = %err, attempt = retries + 1, "retrying");
                retries += 1;
            }
            Err(err) => return (OpResult::Failed(err.code()), retries),
        }
    }
}

// ─── Invariant Audit ────────────────────────────────────────────────────────

async fn audit_user(engine: &EconomyEngine, store: &MemoryStore, user_id: &UserId) -> Vec<String> {
    let mut violations = Vec::new();
    let state = match store.load_user(user_id).await {
        Ok(Some(state)) => state,
        Ok(None) => return vec![format!("{user_id}: record missing")],
        Err(err) => return vec![format!("{user_id}: load failed: {err}")],
    };
    let entries = match store.query_ledger(&LedgerQuery::for_user(user_id)).await {
        Ok(entries) => entries,
        Err(err) => return vec![format!("{user_id}: ledger read failed: {err}")],
    };

    if state.coins < 0 || state.xp < 0 {
        violations.push(format!("{user_id}: negative balance coins={} xp={}", state.coins, state.xp));
    }
    let expected = engine.config().level_curve.level_for_xp(state.xp);
    if (state.level, state.xp_to_next_level) != (expected.level, expected.xp_to_next_level) {
        violations.push(format!("{user_id}: level {} does not match xp {}", state.level, state.xp));
    }

    let net = |currency: Currency| -> i64 {
        entries
            .iter()
            .filter(|e| e.currency == currency)
            .map(LedgerEntry::signed_amount)
            .sum()
    };
    if net(Currency::Coins) != state.coins {
        violations.push(format!("{user_id}: coins {} vs ledger {}", state.coins, net(Currency::Coins)));
    }
    if net(Currency::Xp) != state.xp {
        violations.push(format!("{user_id}: xp {} vs ledger {}", state.xp, net(Currency::Xp)));
    }

    let seqs_ordered = entries.iter().enumerate().all(|(i, e)| e.seq == i as u64 + 1);
    if !seqs_ordered || state.ledger_seq != entries.len() as u64 {
        violations.push(format!("{user_id}: ledger sequence has gaps"));
    }

    let mission_payouts = entries
        .iter()
        .filter(|e| e.source == LedgerSource::MissionCompletion && e.currency == Currency::Xp)
        .count();
    if mission_payouts != state.completed_missions.len() {
        violations.push(format!(
            "{user_id}: {} mission payouts for {} completed missions",
            mission_payouts,
            state.completed_missions.len()
        ));
    }

    let refunds = entries.iter().filter(|e| e.source == LedgerSource::AdminRefund).count();
    let reversals = state.claimed_rewards.iter().filter(|k| k.starts_with("reversal:")).count();
    if refunds != reversals {
        violations.push(format!("{user_id}: {refunds} refunds for {reversals} reversal claims"));
    }

    violations
}

// ─── Single Run ─────────────────────────────────────────────────────────────

/// Run a single scenario iteration with a specific seed.
pub async fn run_single(scenario: &Scenario, seed: u64) -> BenchResult {
    let start = Instant::now();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut result = BenchResult {
        scenario: scenario.name.to_string(),
        seed,
        ..BenchResult::default()
    };

    let store = Arc::new(MemoryStore::new());
    let epoch = Utc
        .with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
        .single()
        .expect("fixed bench epoch is a valid date");
    let clock = Arc::new(FixedClock::new(epoch));
    let engine = Arc::new(
        EconomyEngine::builder(store.clone())
            .clock(clock.clone())
            .build()
            .expect("default config is valid"),
    );

    let users: Arc<Vec<UserId>> = Arc::new(
        (0..scenario.users)
            .map(|i| UserId::from(format!("bench-{i:04}")))
            .collect(),
    );
    for user_id in users.iter() {
        let plan = pick_plan(&mut rng, scenario.plan_mix);
        if let Err(err) = engine.open_account(user_id, plan).await {
            result.invariant_violations.push(format!("{user_id}: open failed: {err}"));
        }
    }

    for day in 0..scenario.days {
        if day > 0 {
            clock.advance_days(1);
        }
        if rng.gen_bool(scenario.fault_rate) {
            let burst = rng.gen_range(1..=5);
            debug!(day, burst, "injecting commit failures");
            store.fail_next_commits(burst);
        }

        let mut handles = Vec::new();
        for n in 0..scenario.ops_per_day {
            let op = pick_op(&mut rng, scenario, day, n);
            let copies = match op {
                Op::Mission { .. } if rng.gen_bool(scenario.duplicate_rate) => 2,
                _ => 1,
            };
            for _ in 0..copies {
                let engine = engine.clone();
                let users = users.clone();
                let op = op.clone();
                handles.push(tokio::spawn(async move {
                    execute_with_retry(&engine, &users, &op).await
                }));
            }
        }

        for handle in handles {
            result.operations += 1;
            let (outcome, retries) = match handle.await {
                Ok(done) => done,
                Err(err) => {
                    warn!(error = %err, "bench task panicked");
                    (OpResult::Failed("PANIC"), 0)
                }
            };
            result.retries += retries;
            match outcome {
                OpResult::Applied => result.applied += 1,
                OpResult::Rejected(code) => {
                    result.rejected += 1;
                    *result.outcomes.entry(code.to_string()).or_default() += 1;
                }
                OpResult::Failed(code) => {
                    result.errors += 1;
                    *result.outcomes.entry(code.to_string()).or_default() += 1;
                }
            }
        }
    }
    store.fail_next_commits(0);

    // ─── Post-run audit ─────────────────────────────────────────────────

    for user_id in users.iter() {
        result.invariant_violations.extend(audit_user(&engine, &store, user_id).await);
        if let Ok(snapshot) = engine.get_economy_snapshot(user_id).await {
            result.coins_in_circulation += snapshot.coins;
            result.xp_total += snapshot.xp;
        }
    }
    result.ledger_entries = store.ledger_len().await;

    match engine.run_consistency_sync(None).await {
        Ok(report) if !report.corrections.is_empty() => result
            .invariant_violations
            .push(format!("consistency sync made {} corrections", report.corrections.len())),
        Ok(_) => {}
        Err(err) => result.invariant_violations.push(format!("consistency sync failed: {err}")),
    }

    match engine.get_economy_alerts().await {
        Ok(alerts) => {
            result.alerts = alerts.len();
            result.critical_alerts = alerts.iter().filter(|a| a.severity > Severity::Warning).count();
        }
        Err(err) => result.invariant_violations.push(format!("sentinel failed: {err}")),
    }

    let elapsed = start.elapsed();
    result.elapsed_ms = elapsed.as_millis();
    result.ops_per_sec = result.operations as f64 / elapsed.as_secs_f64().max(1e-9);

    result.pass = result.invariant_violations.is_empty()
        && result.error_rate() <= scenario.criteria.max_error_rate
        && (!scenario.criteria.require_clean_sentinel || result.critical_alerts == 0);
    result
}

// ─── Aggregation ────────────────────────────────────────────────────────────

/// Run `n_runs` seeds starting at `base_seed` and aggregate.
pub async fn run_monte_carlo(scenario: &Scenario, n_runs: usize, base_seed: u64) -> MonteCarloReport {
    let mut runs = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        runs.push(run_single(scenario, base_seed + i as u64).await);
    }

    let sample = |f: fn(&BenchResult) -> f64| -> Stats {
        Stats::from_samples(&runs.iter().map(f).collect::<Vec<_>>())
    };
    let passed = runs.iter().filter(|r| r.pass).count();

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        category: scenario.category.to_string(),
        n_runs,
        pass_rate: if n_runs == 0 { 0.0 } else { passed as f64 / n_runs as f64 },
        applied_rate: sample(|r| r.applied as f64 / (r.operations.max(1)) as f64),
        error_rate: sample(BenchResult::error_rate),
        retries: sample(|r| r.retries as f64),
        ops_per_sec: sample(|r| r.ops_per_sec),
        elapsed_ms: sample(|r| r.elapsed_ms as f64),
        invariant_violations: runs.iter().map(|r| r.invariant_violations.len()).sum(),
        individual_runs: runs,
    }
}

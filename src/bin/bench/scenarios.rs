// Scenario Definitions: concurrent load profiles for the economy engine
// All scenario logic is data: op weights, fault rates and plan mix

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub category: &'static str,
    pub users: usize,
    pub days: u32,
    pub ops_per_day: usize,
    pub weights: OpWeights,
    /// Probability that a mission submission is replayed concurrently.
    pub duplicate_rate: f64,
    /// Probability per day of injecting a burst of failed commits.
    pub fault_rate: f64,
    /// Relative share of free / plus / pro / elite accounts.
    pub plan_mix: [u32; 4],
    pub criteria: PassCriteria,
}

/// Relative frequency of each operation kind.
pub struct OpWeights {
    pub checkin: u32,
    pub mission: u32,
    pub achievement: u32,
    pub purchase: u32,
    pub admin_grant: u32,
    pub refund: u32,
}

impl OpWeights {
    pub fn total(&self) -> u32 {
        self.checkin + self.mission + self.achievement + self.purchase + self.admin_grant + self.refund
    }
}

impl Default for OpWeights {
    fn default() -> Self {
        Self { checkin: 30, mission: 35, achievement: 5, purchase: 20, admin_grant: 5, refund: 5 }
    }
}

pub struct PassCriteria {
    /// Invariant violations are never tolerated; this bounds retries.
    pub max_error_rate: f64,
    pub require_clean_sentinel: bool,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self { max_error_rate: 0.0, require_clean_sentinel: true }
    }
}

// ─── Scenario Catalogue ─────────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        // ─── Baseline ───────────────────────────────────────────────────
        Scenario { name: "STEADY_STATE", label: "Steady State", category: "baseline",
            users: 50, days: 14, ops_per_day: 200,
            weights: OpWeights::default(),
            duplicate_rate: 0.0, fault_rate: 0.0, plan_mix: [60, 20, 15, 5],
            criteria: PassCriteria::default() },
        Scenario { name: "ELITE_HEAVY", label: "Elite Heavy", category: "baseline",
            users: 50, days: 14, ops_per_day: 200,
            weights: OpWeights::default(),
            duplicate_rate: 0.0, fault_rate: 0.0, plan_mix: [5, 10, 25, 60],
            criteria: PassCriteria::default() },

        // ─── Contention ─────────────────────────────────────────────────
        Scenario { name: "CHECKIN_RUSH", label: "Check-in Rush", category: "contention",
            users: 10, days: 21, ops_per_day: 300,
            weights: OpWeights { checkin: 80, mission: 10, achievement: 0, purchase: 10, admin_grant: 0, refund: 0 },
            duplicate_rate: 0.0, fault_rate: 0.0, plan_mix: [1, 1, 1, 1],
            criteria: PassCriteria::default() },
        Scenario { name: "DUPLICATE_STORM", label: "Duplicate Storm", category: "contention",
            users: 20, days: 7, ops_per_day: 300,
            weights: OpWeights { checkin: 5, mission: 70, achievement: 20, purchase: 5, admin_grant: 0, refund: 0 },
            duplicate_rate: 0.6, fault_rate: 0.0, plan_mix: [1, 1, 1, 1],
            criteria: PassCriteria::default() },
        Scenario { name: "SPEND_PRESSURE", label: "Spend Pressure", category: "contention",
            users: 5, days: 10, ops_per_day: 250,
            weights: OpWeights { checkin: 10, mission: 10, achievement: 0, purchase: 60, admin_grant: 10, refund: 10 },
            duplicate_rate: 0.0, fault_rate: 0.0, plan_mix: [1, 0, 0, 0],
            criteria: PassCriteria::default() },

        // ─── Faults ─────────────────────────────────────────────────────
        Scenario { name: "STORE_OUTAGE", label: "Store Outage", category: "faults",
            users: 30, days: 14, ops_per_day: 200,
            weights: OpWeights::default(),
            duplicate_rate: 0.2, fault_rate: 0.5, plan_mix: [60, 20, 15, 5],
            criteria: PassCriteria { max_error_rate: 0.05, require_clean_sentinel: true } },
        Scenario { name: "REFUND_WAVE", label: "Refund Wave", category: "faults",
            users: 20, days: 10, ops_per_day: 200,
            weights: OpWeights { checkin: 20, mission: 20, achievement: 0, purchase: 30, admin_grant: 5, refund: 25 },
            duplicate_rate: 0.0, fault_rate: 0.2, plan_mix: [50, 30, 15, 5],
            criteria: PassCriteria { max_error_rate: 0.05, require_clean_sentinel: true } },
    ]
}

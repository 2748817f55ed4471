// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Multiplier Resolver

//! Subscription plans and the reward multiplier / limits each one grants.
//!
//! Reward amounts are multiplied by the caller before reaching the ledger:
//!
//! ```text
//! final_amount = floor(base_amount * multiplier_for(plan))
//! ```

use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// Canonical subscription tier.
///
/// Parsing is lenient: unknown or legacy identifiers resolve to [`Plan::Free`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Plan {
    #[default]
    Free,
    Plus,
    Pro,
    Elite,
}

impl Plan {
    pub const ALL: [Plan; 4] = [Plan::Free, Plan::Plus, Plan::Pro, Plan::Elite];

    /// Canonical identifier used in storage and telemetry.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Plus => "plus",
            Self::Pro => "pro",
            Self::Elite => "elite",
        }
    }

    /// Human-readable name. Display only, never parsed back.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Plus => "Plus",
            Self::Pro => "Pro",
            Self::Elite => "Elite",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Self::Free,
            "plus" => Self::Plus,
            "pro" => Self::Pro,
            "elite" => Self::Elite,
            other => {
                tracing::debug!(plan = other, "unknown plan identifier, using free tier");
                Self::Free
            }
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Plan {
    fn from(s: String) -> Self {
        Plan::parse(&s)
    }
}

impl From<&str> for Plan {
    fn from(s: &str) -> Self {
        Plan::parse(s)
    }
}

impl From<Plan> for String {
    fn from(plan: Plan) -> Self {
        plan.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// PlanTerms / PlanTable
// ---------------------------------------------------------------------------

/// Plan-derived limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Missions that may be rewarded per local day.
    pub daily_mission_cap: u32,
    /// Store discount in percent (0-100).
    pub price_discount_pct: Decimal,
    /// Coin balance above which rewards stop crediting.
    pub max_balance_cap: i64,
}

/// Multiplier and limits for one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTerms {
    pub multiplier: Decimal,
    #[serde(flatten)]
    pub limits: PlanLimits,
}

impl PlanTerms {
    fn new(multiplier: Decimal, daily_mission_cap: u32, discount: Decimal, cap: i64) -> Self {
        Self {
            multiplier,
            limits: PlanLimits {
                daily_mission_cap,
                price_discount_pct: discount,
                max_balance_cap: cap,
            },
        }
    }
}

/// Terms per plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTable {
    pub free: PlanTerms,
    pub plus: PlanTerms,
    pub pro: PlanTerms,
    pub elite: PlanTerms,
}

impl Default for PlanTable {
    fn default() -> Self {
        Self {
            free: PlanTerms::new(dec!(1.0), 3, dec!(0), 10_000),
            plus: PlanTerms::new(dec!(1.25), 5, dec!(5), 25_000),
            pro: PlanTerms::new(dec!(1.5), 10, dec!(10), 50_000),
            elite: PlanTerms::new(dec!(2.0), 20, dec!(20), 100_000),
        }
    }
}

impl PlanTable {
    pub fn terms_for(&self, plan: Plan) -> &PlanTerms {
        match plan {
            Plan::Free => &self.free,
            Plan::Plus => &self.plus,
            Plan::Pro => &self.pro,
            Plan::Elite => &self.elite,
        }
    }

    /// First plan whose terms are out of range, with the reason.
    pub fn find_invalid(&self) -> Option<(Plan, &'static str)> {
        Plan::ALL.into_iter().find_map(|plan| {
            let terms = self.terms_for(plan);
            if terms.multiplier < Decimal::ONE {
                Some((plan, "multiplier must be >= 1.0"))
            } else if terms.limits.price_discount_pct < Decimal::ZERO
                || terms.limits.price_discount_pct > dec!(100)
            {
                Some((plan, "price discount must be within 0..=100"))
            } else if terms.limits.max_balance_cap <= 0 {
                Some((plan, "max balance cap must be positive"))
            } else {
                None
            }
        })
    }
}

// ---------------------------------------------------------------------------
// MultiplierResolver
// ---------------------------------------------------------------------------

/// Resolves plan multipliers and limits from a [`PlanTable`].
#[derive(Debug, Clone, Default)]
pub struct MultiplierResolver {
    table: PlanTable,
}

impl MultiplierResolver {
    pub fn new(table: PlanTable) -> Self {
        Self { table }
    }

    /// Reward multiplier for `plan`, never below 1.0.
    pub fn multiplier_for(&self, plan: Plan) -> Decimal {
        self.table.terms_for(plan).multiplier.max(Decimal::ONE)
    }

    pub fn limits_for(&self, plan: Plan) -> PlanLimits {
        self.table.terms_for(plan).limits
    }

    /// `floor(base * multiplier)`. Non-positive bases map to zero.
    pub fn apply_multiplier(&self, base: i64, plan: Plan) -> i64 {
        if base <= 0 {
            return 0;
        }
        let scaled = (Decimal::from(base) * self.multiplier_for(plan)).floor();
        scaled.to_i64().unwrap_or(i64::MAX)
    }

    /// Store price after the plan discount; the discount is rounded down.
    pub fn discounted_price(&self, base_price: i64, plan: Plan) -> i64 {
        if base_price <= 0 {
            return 0;
        }
        let pct = self
            .limits_for(plan)
            .price_discount_pct
            .clamp(Decimal::ZERO, dec!(100));
        let discount = (Decimal::from(base_price) * pct / dec!(100)).floor();
        base_price - discount.to_i64().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

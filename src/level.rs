// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Level Calculator

//! Maps cumulative XP to a level and the XP still needed for the next one.
//!
//! The curve is configuration, never derived from user state, so the ledger
//! mutator and the consistency sync always agree on the result.

use serde::{Deserialize, Serialize};

/// Levels are `u32`; past the last one the curve saturates.
const MAX_COMPLETED_LEVELS: i128 = u32::MAX as i128 - 1;

/// Level reached for a given XP total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Always >= 1.
    pub level: u32,
    /// XP remaining until `level + 1`; always > 0.
    pub xp_to_next_level: i64,
}

/// Leveling curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelCurve {
    /// Every level costs the same amount of XP.
    Linear { xp_per_level: i64 },
    /// Level `L -> L + 1` costs `base_xp + step_xp * (L - 1)`.
    Progressive { base_xp: i64, step_xp: i64 },
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::Linear { xp_per_level: 1000 }
    }
}

impl LevelCurve {
    /// Whether every level costs a positive amount of XP.
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Linear { xp_per_level } => xp_per_level > 0,
            Self::Progressive { base_xp, step_xp } => base_xp > 0 && step_xp >= 0,
        }
    }

    /// XP required to go from `level` to `level + 1`.
    pub fn cost_of(&self, level: u32) -> i64 {
        match *self {
            Self::Linear { xp_per_level } => xp_per_level.max(1),
            Self::Progressive { base_xp, step_xp } => base_xp
                .max(1)
                .saturating_add(step_xp.max(0).saturating_mul(i64::from(level.saturating_sub(1)))),
        }
    }

    /// Level and remaining XP for a cumulative XP total.
    ///
    /// Negative input is treated as zero so corrupt records still map to a
    /// valid level.
    pub fn level_for_xp(&self, xp: i64) -> LevelProgress {
        let xp = xp.max(0);
        match *self {
            Self::Linear { xp_per_level } => {
                let per = xp_per_level.max(1);
                let completed = xp / per;
                LevelProgress {
                    level: u32::try_from(completed.saturating_add(1)).unwrap_or(u32::MAX),
                    xp_to_next_level: per - xp % per,
                }
            }
            Self::Progressive { base_xp, step_xp } if step_xp <= 0 => {
                Self::Linear { xp_per_level: base_xp }.level_for_xp(xp)
            }
            Self::Progressive { base_xp, step_xp } => {
                let (base, step, xp) = (i128::from(base_xp.max(1)), i128::from(step_xp), i128::from(xp));
                // XP needed to complete the first `n` levels
                let spent = |n: i128| {
                    n.saturating_mul(base)
                        .saturating_add(step.saturating_mul(n).saturating_mul(n - 1) / 2)
                };
                // positive root of step/2 n^2 + (base - step/2) n - xp, corrected below
                let linear = base as f64 - step as f64 / 2.0;
                let estimate =
                    ((linear * linear + 2.0 * step as f64 * xp as f64).sqrt() - linear) / step as f64;
                let mut completed = (estimate as i128).clamp(0, MAX_COMPLETED_LEVELS);
                while completed > 0 && spent(completed) > xp {
                    completed -= 1;
                }
                while completed < MAX_COMPLETED_LEVELS && spent(completed + 1) <= xp {
                    completed += 1;
                }
                LevelProgress {
                    level: u32::try_from(completed + 1).unwrap_or(u32::MAX),
                    xp_to_next_level: i64::try_from(spent(completed + 1) - xp)
                        .unwrap_or(i64::MAX)
                        .max(1),
                }
            }
        }
    }
}

/// Level for `xp` under the default curve.
pub fn level_for_xp(xp: i64) -> LevelProgress {
    LevelCurve::default().level_for_xp(xp)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

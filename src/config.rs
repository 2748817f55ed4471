// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Configuration

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::level::LevelCurve;
use crate::plan::PlanTable;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Daily check-in rewards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckinConfig {
    /// Coins for every check-in, before the plan multiplier.
    pub base_coins: i64,
    /// Consecutive days that trigger the milestone bonus and reset the streak.
    pub milestone_days: u32,
    /// Extra coins on the milestone day, before the plan multiplier.
    pub milestone_bonus_coins: i64,
}

impl Default for CheckinConfig {
    fn default() -> Self {
        Self {
            base_coins: 10,
            milestone_days: 7,
            milestone_bonus_coins: 50,
        }
    }
}

/// Longest accepted sentinel earnings window (one year).
pub const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Anomaly thresholds for the economy sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    /// Coins earned within the window above which a user is flagged.
    pub whale_threshold: i64,
    pub window_hours: i64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            whale_threshold: 5000,
            window_hours: 24,
        }
    }
}

/// Top-level economy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub level_curve: LevelCurve,
    pub plans: PlanTable,
    pub checkin: CheckinConfig,
    pub sentinel: SentinelConfig,
    /// Offset of the platform's local day from UTC, in minutes.
    pub utc_offset_minutes: i32,
}

impl EconomyConfig {
    /// Parse and validate a JSON document; missing sections take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.level_curve.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "level curve {:?} must cost a positive amount per level",
                self.level_curve
            )));
        }
        if let Some((plan, reason)) = self.plans.find_invalid() {
            return Err(ConfigError::Invalid(format!("plan {plan}: {reason}")));
        }
        if self.checkin.milestone_days == 0 {
            return Err(ConfigError::Invalid("checkin.milestone_days must be >= 1".into()));
        }
        if self.checkin.base_coins < 0 || self.checkin.milestone_bonus_coins < 0 {
            return Err(ConfigError::Invalid("check-in rewards must be >= 0".into()));
        }
        if !(1..=MAX_WINDOW_HOURS).contains(&self.sentinel.window_hours) {
            return Err(ConfigError::Invalid(format!(
                "sentinel.window_hours must be within 1..={MAX_WINDOW_HOURS}, got {}",
                self.sentinel.window_hours
            )));
        }
        if self.offset().is_none() {
            return Err(ConfigError::Invalid(format!(
                "utc_offset_minutes {} out of range",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }

    fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    /// Local calendar day of `at`.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        match self.offset() {
            Some(offset) => at.with_timezone(&offset).date_naive(),
            None => at.date_naive(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

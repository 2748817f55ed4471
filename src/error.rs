// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Errors and Outcomes

//! Two layers of failure:
//!
//! - [`Rejection`]: an expected business outcome (insufficient funds, duplicate
//!   reward, ...). Returned inside [`Outcome::Rejected`]; nothing was written.
//! - [`EconomyError`]: an infrastructure or input failure that aborts the whole
//!   operation. Nothing was written either.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::types::{Currency, SourceKey, UserId};

// ---------------------------------------------------------------------------
// Rejection
// ---------------------------------------------------------------------------

/// Expected, non-exceptional refusal of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Rejection {
    #[error("insufficient {currency}: requested {requested}, available {available}")]
    InsufficientFunds {
        currency: Currency,
        requested: i64,
        available: i64,
    },

    #[error("reward {key} was already paid")]
    AlreadyRewarded { key: SourceKey },

    #[error("already checked in on {date}")]
    AlreadyCheckedIn { date: NaiveDate },

    #[error("daily mission cap of {cap} reached")]
    DailyMissionCapReached { cap: u32 },

    #[error("{currency} balance would overflow")]
    BalanceOverflow { currency: Currency },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AlreadyRewarded { .. } => "ALREADY_REWARDED",
            Self::AlreadyCheckedIn { .. } => "ALREADY_CHECKED_IN",
            Self::DailyMissionCapReached { .. } => "DAILY_MISSION_CAP_REACHED",
            Self::BalanceOverflow { .. } => "BALANCE_OVERFLOW",
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of an operation that completed without infrastructure failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Applied(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    /// Rejection code, `None` when applied.
    pub fn code(&self) -> Option<&'static str> {
        self.rejection().map(Rejection::code)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Applied(value) => Outcome::Applied(f(value)),
            Self::Rejected(rejection) => Outcome::Rejected(rejection),
        }
    }

    pub fn into_result(self) -> Result<T, Rejection> {
        match self {
            Self::Applied(value) => Ok(value),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

impl<T> From<Result<T, Rejection>> for Outcome<T> {
    fn from(result: Result<T, Rejection>) -> Self {
        match result {
            Ok(value) => Self::Applied(value),
            Err(rejection) => Self::Rejected(rejection),
        }
    }
}

// ---------------------------------------------------------------------------
// EconomyError
// ---------------------------------------------------------------------------

/// Failures that abort an operation with no state change.
#[derive(Debug, thiserror::Error)]
pub enum EconomyError {
    #[error("user {0} not found")]
    UserNotFound(UserId),

    #[error("user {0} already exists")]
    UserExists(UserId),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("concurrent write to user {0}, retry the operation")]
    WriteConflict(UserId),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl EconomyError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::UserExists(_) => "USER_EXISTS",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::WriteConflict(_) => "WRITE_CONFLICT",
            Self::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// Whether the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::WriteConflict(_))
    }
}

impl From<StoreError> for EconomyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
            StoreError::NotFound(user_id) => Self::UserNotFound(user_id),
            StoreError::AlreadyExists(user_id) => Self::UserExists(user_id),
            StoreError::VersionConflict { user_id, .. } => Self::WriteConflict(user_id),
        }
    }
}

pub type EconomyResult<T> = Result<T, EconomyError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_serializes_with_code_tag() {
        let rejection = Rejection::InsufficientFunds {
            currency: Currency::Coins,
            requested: 200,
            available: 50,
        };
        let json = serde_json::to_value(&rejection).expect("test: serialize");
        assert_eq!(json["code"], "INSUFFICIENT_FUNDS");
        assert_eq!(json["requested"], 200);
        assert_eq!(rejection.code(), "INSUFFICIENT_FUNDS");
    }

    #[test]
    fn outcome_helpers() {
        let applied: Outcome<u32> = Outcome::Applied(3);
        assert!(applied.is_applied());
        assert_eq!(applied.code(), None);
        assert_eq!(applied.map(|v| v * 2).applied(), Some(6));

        let rejected: Outcome<u32> = Outcome::Rejected(Rejection::AlreadyRewarded {
            key: SourceKey::Mission("m1".into()),
        });
        assert_eq!(rejected.code(), Some("ALREADY_REWARDED"));
        assert!(rejected.into_result().is_err());
    }

    #[test]
    fn store_errors_map_to_codes() {
        let err: EconomyError = StoreError::Unavailable("disk".into()).into();
        assert_eq!(err.code(), "STORE_UNAVAILABLE");
        assert!(err.is_retryable());

        let err: EconomyError = StoreError::NotFound(UserId::from("ghost")).into();
        assert_eq!(err.code(), "USER_NOT_FOUND");
        assert!(!err.is_retryable());

        let err: EconomyError = StoreError::VersionConflict {
            user_id: UserId::from("u1"),
            expected: 3,
            found: 4,
        }
        .into();
        assert!(matches!(err, EconomyError::WriteConflict(_)));
    }
}

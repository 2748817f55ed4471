// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Collaborator Ports

//! Narrow contracts to the services around the economy core: wall clock,
//! notification and telemetry sinks, and the mission submission service.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::StoreError;
use crate::types::UserId;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// User-facing notifications. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, user_id: &UserId, title: &str, body: &str);
}

/// Telemetry events consumed by downstream anomaly detection. Fire-and-forget.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &str, payload: serde_json::Value);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _user_id: &UserId, _title: &str, _body: &str) {}
}

impl TelemetrySink for NoopSink {
    fn emit(&self, _event: &str, _payload: serde_json::Value) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub user_id: UserId,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Collects notifications and telemetry in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    notifications: Mutex<Vec<Notification>>,
    events: Mutex<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn events_named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events().into_iter().filter(|e| e.name == name).collect()
    }
}

impl NotificationSink for MemorySink {
    fn notify(&self, user_id: &UserId, title: &str, body: &str) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notification {
                user_id: user_id.clone(),
                title: title.to_string(),
                body: body.to_string(),
            });
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, event: &str, payload: serde_json::Value) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TelemetryEvent { name: event.to_string(), payload });
    }
}

// ---------------------------------------------------------------------------
// Submission service
// ---------------------------------------------------------------------------

/// Mission submission service, the authority on approved completions.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    /// Approved submissions for `user_id`, `None` when the service has no
    /// record of the user.
    async fn approved_submission_count(&self, user_id: &UserId) -> Result<Option<u32>, StoreError>;
}

/// Submission source that knows nothing; mission counters are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSubmissions;

#[async_trait]
impl SubmissionSource for NoSubmissions {
    async fn approved_submission_count(&self, _user_id: &UserId) -> Result<Option<u32>, StoreError> {
        Ok(None)
    }
}

/// Fixed table of approved counts.
#[derive(Debug, Default)]
pub struct SubmissionTable {
    counts: Mutex<HashMap<UserId, u32>>,
}

impl SubmissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: &UserId, approved: u32) {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.clone(), approved);
    }
}

#[async_trait]
impl SubmissionSource for SubmissionTable {
    async fn approved_submission_count(&self, user_id: &UserId) -> Result<Option<u32>, StoreError> {
        Ok(self
            .counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .copied())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

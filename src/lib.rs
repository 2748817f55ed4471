// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine

pub mod types;
pub mod error;
pub mod level;
pub mod plan;
pub mod config;
pub mod store;
pub mod memory;
pub mod ports;

// Write path and flows built on it
pub mod ledger;
pub mod guard;
pub mod rewards;
pub mod checkin;
pub mod purchase;
pub mod admin;

// Maintenance and read models
pub mod sync;
pub mod sentinel;
pub mod leaderboard;
pub mod engine;

pub use config::{ConfigError, EconomyConfig};
pub use engine::{EconomyEngine, EngineBuilder};
pub use error::{EconomyError, EconomyResult, Outcome, Rejection};
pub use level::{level_for_xp, LevelCurve, LevelProgress};
pub use memory::MemoryStore;
pub use plan::{MultiplierResolver, Plan, PlanLimits, PlanTerms};
pub use store::{EconomyStore, LedgerQuery, StoreError};
pub use types::*;

use wasm_bindgen::prelude::*;

// ─── WASM Interface ──────────────────────────────────────────────────────────
//
// Pure helpers for the UI bundle, evaluated against the default config.

#[wasm_bindgen(js_name = initEconomy)]
pub fn init_economy() {
    #[cfg(target_arch = "wasm32")]
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
}

#[wasm_bindgen(js_name = levelForXp)]
pub fn level_for_xp_js(xp: u32) -> JsValue {
    serde_wasm_bindgen::to_value(&level_for_xp(i64::from(xp))).unwrap_or(JsValue::NULL)
}

/// Multiplier and limits for a plan string; unknown plans resolve to free.
#[wasm_bindgen(js_name = planTerms)]
pub fn plan_terms_js(plan: &str) -> JsValue {
    let table = plan::PlanTable::default();
    serde_wasm_bindgen::to_value(table.terms_for(Plan::parse(plan))).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen(js_name = rewardPreview)]
pub fn reward_preview_js(plan: &str, base_xp: u32, base_coins: u32) -> JsValue {
    let preview = rewards::preview(
        &MultiplierResolver::default(),
        Plan::parse(plan),
        i64::from(base_xp),
        i64::from(base_coins),
    );
    serde_wasm_bindgen::to_value(&preview).unwrap_or(JsValue::NULL)
}

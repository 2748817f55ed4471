// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Leaderboard

use serde::{Deserialize, Serialize};

use crate::error::EconomyResult;
use crate::store::EconomyStore;
use crate::types::{UserEconomyState, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// 1-based.
    pub rank: usize,
    pub user_id: UserId,
    pub xp: i64,
    pub level: u32,
    pub missions_completed: u32,
}

/// Top `limit` users by xp, then missions completed, then user id.
pub async fn leaderboard(store: &dyn EconomyStore, limit: usize) -> EconomyResult<Vec<LeaderboardEntry>> {
    let mut states: Vec<UserEconomyState> = Vec::new();
    for user_id in store.list_users().await? {
        if let Some(state) = store.load_user(&user_id).await? {
            states.push(state);
        }
    }
    Ok(rank(states, limit))
}

pub fn rank(mut states: Vec<UserEconomyState>, limit: usize) -> Vec<LeaderboardEntry> {
    states.sort_by(|a, b| {
        b.xp.cmp(&a.xp)
            .then_with(|| b.total_missions_completed.cmp(&a.total_missions_completed))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    states
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, state)| LeaderboardEntry {
            rank: i + 1,
            user_id: state.user_id,
            xp: state.xp,
            level: state.level,
            missions_completed: state.total_missions_completed,
        })
        .collect()
}

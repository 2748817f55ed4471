// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Economy Ledger & Rewards Engine - Store Purchases

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::error::{EconomyError, EconomyResult, Outcome};
use crate::ledger::LedgerMutator;
use crate::plan::MultiplierResolver;
use crate::types::{Currency, EconomySnapshot, LedgerEntry, LedgerSource, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub item_id: String,
    /// List price in coins, before the plan discount.
    pub base_price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseReceipt {
    pub item_id: String,
    pub base_price: i64,
    pub price_paid: i64,
    /// `None` when the discount made the item free.
    pub entry: Option<LedgerEntry>,
    pub snapshot: EconomySnapshot,
}

impl PurchaseReceipt {
    pub fn discount(&self) -> i64 {
        self.base_price - self.price_paid
    }
}

pub struct StoreCheckout {
    ledger: Arc<LedgerMutator>,
    resolver: MultiplierResolver,
}

impl StoreCheckout {
    pub fn new(ledger: Arc<LedgerMutator>, resolver: MultiplierResolver) -> Self {
        Self { ledger, resolver }
    }

    /// Charge the discounted price; `INSUFFICIENT_FUNDS` leaves the balance untouched.
    pub async fn purchase(
        &self,
        user_id: &UserId,
        request: &PurchaseRequest,
    ) -> EconomyResult<Outcome<PurchaseReceipt>> {
        if request.item_id.trim().is_empty() {
            return Err(EconomyError::InvalidInput("purchase without item id".into()));
        }
        if request.base_price <= 0 {
            return Err(EconomyError::InvalidInput(format!(
                "item {} has non-positive price {}",
                request.item_id, request.base_price
            )));
        }

        let resolver = self.resolver.clone();
        let item_id = request.item_id.clone();
        let base_price = request.base_price;

        let outcome = self
            .ledger
            .transact(user_id, move |txn| {
                let price_paid = resolver.discounted_price(base_price, txn.plan());
                let entry = txn.spend(
                    Currency::Coins,
                    price_paid,
                    LedgerSource::StorePurchase,
                    format!("Purchased {item_id}"),
                )?;
                Ok((item_id, price_paid, entry, txn.state().snapshot()))
            })
            .await?;

        Ok(outcome.map(|applied| {
            let (item_id, price_paid, entry, snapshot) = applied.value;
            info!(user_id = %user_id, item = %item_id, price = price_paid, "purchase");
            PurchaseReceipt { item_id, base_price, price_paid, entry, snapshot }
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

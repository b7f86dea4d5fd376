//! Super offer ("price drop") takeover set

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Products flagged for the full-screen price-drop takeover
///
/// `is_active` mirrors `!product_ids.is_empty()`; every mutator below keeps
/// it in sync, nothing else re-validates it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperOffer {
    /// Ordered set of product ids (insertion order is the cycling order)
    #[serde(default)]
    pub product_ids: Vec<String>,
    /// product id → discount price. Entries survive removal from the set.
    #[serde(default)]
    pub prices: BTreeMap<String, Decimal>,
    #[serde(default)]
    pub is_active: bool,
}

impl SuperOffer {
    pub fn contains(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|id| id == product_id)
    }

    /// Add a product to the set. A price already in the map wins over `price`.
    pub fn add(&mut self, product_id: &str, price: Decimal) {
        if !self.contains(product_id) {
            self.product_ids.push(product_id.to_string());
        }
        self.prices
            .entry(product_id.to_string())
            .or_insert_with(|| price.round_dp(2));
        self.sync_active();
    }

    /// Remove a product from the set, keeping its price for reactivation
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|id| id != product_id);
        self.sync_active();
        self.product_ids.len() != before
    }

    /// Add when absent, remove when present. Returns whether it is now in the set.
    pub fn toggle(&mut self, product_id: &str, price: Decimal) -> bool {
        if self.remove(product_id) {
            false
        } else {
            self.add(product_id, price);
            true
        }
    }

    pub fn set_price(&mut self, product_id: &str, price: Decimal) {
        self.prices.insert(product_id.to_string(), price.round_dp(2));
    }

    pub fn price_of(&self, product_id: &str) -> Option<Decimal> {
        self.prices.get(product_id).copied()
    }

    /// Drop the product from both the set and the price map
    pub fn purge(&mut self, product_id: &str) {
        self.product_ids.retain(|id| id != product_id);
        self.prices.remove(product_id);
        self.sync_active();
    }

    pub fn clear(&mut self) {
        self.product_ids.clear();
        self.sync_active();
    }

    fn sync_active(&mut self) {
        self.is_active = !self.product_ids.is_empty();
    }
}

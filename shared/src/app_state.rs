//! 应用状态类型定义
//!
//! The single document every surface shares: store settings, catalog,
//! promotions and the super-offer set. It is synchronized and persisted as a
//! whole; there are no partial or delta updates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ErrorCode};
use crate::models::{Product, Promotion, SaleUnit, SuperOffer};

/// Default promotion rotation interval (seconds)
pub const DEFAULT_PROMO_INTERVAL_SECS: u32 = 8;
/// Default product-page rotation interval (seconds)
pub const DEFAULT_PAGE_INTERVAL_SECS: u32 = 12;
/// Default accent colour (butcher red)
pub const DEFAULT_ACCENT_COLOR: &str = "#B91C1C";

// =============================================================================
// Orientation
// =============================================================================

/// Display rotation in degrees; only portrait-on-landscape is supported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Orientation {
    #[default]
    Landscape,
    /// Rotated 90 degrees
    Portrait,
}

impl Orientation {
    pub fn degrees(&self) -> u16 {
        match self {
            Self::Landscape => 0,
            Self::Portrait => 90,
        }
    }
}

impl TryFrom<u16> for Orientation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Landscape),
            90 => Ok(Self::Portrait),
            other => Err(format!("unsupported orientation: {other}")),
        }
    }
}

impl From<Orientation> for u16 {
    fn from(value: Orientation) -> Self {
        value.degrees()
    }
}

// =============================================================================
// AppState
// =============================================================================

/// Shared signage document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub store_name: String,
    pub accent_color: String,
    pub promo_interval_secs: u32,
    pub page_interval_secs: u32,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
    #[serde(default)]
    pub super_offer: SuperOffer,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            store_name: String::new(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            promo_interval_secs: DEFAULT_PROMO_INTERVAL_SECS,
            page_interval_secs: DEFAULT_PAGE_INTERVAL_SECS,
            orientation: Orientation::Landscape,
            products: Vec::new(),
            promotions: Vec::new(),
            super_offer: SuperOffer::default(),
        }
    }
}

impl AppState {
    /// Built-in sample catalog, used when nothing usable is persisted
    pub fn sample() -> Self {
        let kg = |id: &str, name: &str, cents: i64, category: &str| {
            Product::new(id, name, Decimal::new(cents, 2), SaleUnit::Kg).with_category(category)
        };

        let products = vec![
            kg("1", "Picanha", 8990, "Bovinos"),
            kg("2", "Alcatra", 4990, "Bovinos"),
            kg("3", "Fraldinha", 4490, "Bovinos"),
            kg("4", "Costela Minga", 2990, "Bovinos"),
            kg("5", "Contra Filé", 5490, "Bovinos"),
            kg("6", "Coxa e Sobrecoxa", 1490, "Aves"),
            kg("7", "Linguiça Toscana", 2790, "Suínos"),
            Product::new("8", "Carvão 3kg", Decimal::new(2200, 2), SaleUnit::Un)
                .with_category("Churrasco"),
        ];

        let promotions = vec![
            Promotion::new("p1", "1", Decimal::new(7990, 2))
                .with_description("Picanha selecionada para o seu churrasco de domingo"),
            Promotion::new("p2", "7", Decimal::new(2290, 2))
                .with_description("Linguiça toscana artesanal, feita aqui na casa"),
        ];

        Self {
            store_name: "FABIO FCELL".to_string(),
            products,
            promotions,
            ..Self::default()
        }
    }

    // ==================== Lookups ====================

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn promotion(&self, id: &str) -> Option<&Promotion> {
        self.promotions.iter().find(|p| p.id == id)
    }

    /// Promotions the display rotates through: active and whose product exists
    pub fn active_promotions(&self) -> Vec<&Promotion> {
        self.promotions
            .iter()
            .filter(|p| p.active && self.product(&p.product_id).is_some())
            .collect()
    }

    /// Next free numeric product id
    pub fn next_product_id(&self) -> String {
        next_numeric_id(self.products.iter().map(|p| p.id.as_str()))
    }

    /// Next free promotion id (`p<N>`)
    pub fn next_promotion_id(&self) -> String {
        let n = next_numeric_id(
            self.promotions
                .iter()
                .map(|p| p.id.trim_start_matches('p')),
        );
        format!("p{n}")
    }

    // ==================== Catalog ====================

    /// Insert or replace a product by id
    pub fn upsert_product(&mut self, product: Product) {
        match self.products.iter_mut().find(|p| p.id == product.id) {
            Some(existing) => *existing = product,
            None => self.products.push(product),
        }
    }

    /// Remove a product; its super-offer membership and price go with it.
    /// Promotions pointing at it are left dangling.
    pub fn remove_product(&mut self, id: &str) -> Option<Product> {
        let idx = self.products.iter().position(|p| p.id == id)?;
        self.super_offer.purge(id);
        Some(self.products.remove(idx))
    }

    pub fn set_product_price(&mut self, id: &str, price: Decimal) -> AppResult<()> {
        let product = self
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::product_not_found(id))?;
        product.price = price.round_dp(2);
        Ok(())
    }

    // ==================== Promotions ====================

    pub fn upsert_promotion(&mut self, promotion: Promotion) {
        match self.promotions.iter_mut().find(|p| p.id == promotion.id) {
            Some(existing) => *existing = promotion,
            None => self.promotions.push(promotion),
        }
    }

    pub fn remove_promotion(&mut self, id: &str) -> Option<Promotion> {
        let idx = self.promotions.iter().position(|p| p.id == id)?;
        Some(self.promotions.remove(idx))
    }

    pub fn set_promotion_active(&mut self, id: &str, active: bool) -> AppResult<()> {
        self.promotion_mut(id)?.active = active;
        Ok(())
    }

    pub fn set_promotion_image(&mut self, id: &str, image: Option<String>) -> AppResult<()> {
        self.promotion_mut(id)?.image = image;
        Ok(())
    }

    pub fn set_promotion_description(&mut self, id: &str, text: impl Into<String>) -> AppResult<()> {
        self.promotion_mut(id)?.description = text.into();
        Ok(())
    }

    /// Move a promotion's offer price by `delta`, never below zero.
    /// Returns the new price.
    pub fn nudge_promotion_price(&mut self, id: &str, delta: Decimal) -> AppResult<Decimal> {
        let promo = self.promotion_mut(id)?;
        let next = (promo.offer_price + delta).max(Decimal::ZERO).round_dp(2);
        promo.offer_price = next;
        Ok(next)
    }

    fn promotion_mut(&mut self, id: &str) -> AppResult<&mut Promotion> {
        self.promotions
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::promotion_not_found(id))
    }

    // ==================== Super offer ====================

    /// Toggle a product in the super-offer set.
    ///
    /// A previously stored discount price is reused; otherwise `price` or,
    /// failing that, the product's regular price seeds the entry.
    pub fn toggle_super_offer(&mut self, product_id: &str, price: Option<Decimal>) -> AppResult<bool> {
        let regular = self
            .product(product_id)
            .map(|p| p.price)
            .ok_or_else(|| AppError::product_not_found(product_id))?;
        Ok(self.super_offer.toggle(product_id, price.unwrap_or(regular)))
    }

    pub fn set_super_offer_price(&mut self, product_id: &str, price: Decimal) -> AppResult<()> {
        if self.product(product_id).is_none() {
            return Err(AppError::product_not_found(product_id));
        }
        self.super_offer.set_price(product_id, price);
        Ok(())
    }

    pub fn clear_super_offer(&mut self) {
        self.super_offer.clear();
    }

    // ==================== Settings ====================

    pub fn set_store_name(&mut self, name: impl Into<String>) {
        self.store_name = name.into();
    }

    pub fn set_accent_color(&mut self, color: impl Into<String>) {
        self.accent_color = color.into();
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn set_intervals(&mut self, promo_secs: u32, page_secs: u32) -> AppResult<()> {
        if promo_secs == 0 || page_secs == 0 {
            return Err(AppError::validation("Rotation intervals must be positive"));
        }
        self.promo_interval_secs = promo_secs;
        self.page_interval_secs = page_secs;
        Ok(())
    }

    // ==================== Validation ====================

    /// Structural checks applied before a document is accepted as canonical
    pub fn validate(&self) -> AppResult<()> {
        if self.promo_interval_secs == 0 || self.page_interval_secs == 0 {
            return Err(AppError::validation("Rotation intervals must be positive"));
        }
        for product in &self.products {
            if product.name.trim().is_empty() {
                return Err(AppError::validation("Product name must not be empty")
                    .with_detail("product_id", product.id.clone()));
            }
            if product.price.is_sign_negative() {
                return Err(AppError::with_message(ErrorCode::InvalidPrice, "Product price must not be negative")
                    .with_detail("product_id", product.id.clone()));
            }
        }
        for promo in &self.promotions {
            if promo.offer_price.is_sign_negative() {
                return Err(AppError::with_message(ErrorCode::InvalidPrice, "Offer price must not be negative")
                    .with_detail("promotion_id", promo.id.clone()));
            }
        }
        if self.super_offer.is_active == self.super_offer.product_ids.is_empty() {
            return Err(AppError::validation("Super offer active flag out of sync"));
        }
        Ok(())
    }
}

fn next_numeric_id<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let max = ids.filter_map(|id| id.parse::<u64>().ok()).max().unwrap_or(0);
    (max + 1).to_string()
}

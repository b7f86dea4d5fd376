//! Admin surface: catalog, promotions, settings and remote control

use shared::error::AppError;
use shared::models::{DeviceId, DeviceRecord, Product, Promotion, Role, SaleUnit};
use shared::{Decimal, Orientation, RemoteCommand};
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::genai::{AspectRatio, ContentGenerator, phrase_or_fallback, photo_or_none};
use crate::sync::SyncHandle;

/// Editor surface over a sync handle
#[derive(Clone)]
pub struct Editor {
    sync: SyncHandle,
    generator: Option<Arc<dyn ContentGenerator>>,
}

impl Editor {
    pub fn new(sync: SyncHandle) -> Self {
        Self {
            sync,
            generator: None,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ContentGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    // ==================== Catalog ====================

    /// Add a product under the next free id; returns the id
    pub async fn add_product(
        &self,
        name: &str,
        price: Decimal,
        unit: SaleUnit,
        category: Option<&str>,
    ) -> ClientResult<String> {
        let name = name.trim().to_string();
        let category = category.map(str::to_string);
        self.sync
            .update(move |state| {
                let id = state.next_product_id();
                let mut product = Product::new(id.clone(), name, price, unit);
                product.category = category;
                state.upsert_product(product);
                Ok(id)
            })
            .await
    }

    pub async fn save_product(&self, product: Product) -> ClientResult<()> {
        self.sync
            .update(move |state| {
                state.upsert_product(product);
                Ok(())
            })
            .await
    }

    /// Delete a product; its super-offer entry goes with it
    pub async fn remove_product(&self, id: &str) -> ClientResult<()> {
        self.sync
            .update(|state| {
                state
                    .remove_product(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::product_not_found(id))
            })
            .await
    }

    pub async fn set_price(&self, id: &str, price: Decimal) -> ClientResult<()> {
        self.sync
            .update(|state| state.set_product_price(id, price))
            .await
    }

    // ==================== Promotions ====================

    /// Create a promotion for `product_id`; returns the new id
    pub async fn add_promotion(
        &self,
        product_id: &str,
        offer_price: Decimal,
        description: &str,
    ) -> ClientResult<String> {
        self.sync
            .update(|state| {
                if state.product(product_id).is_none() {
                    return Err(AppError::product_not_found(product_id));
                }
                let id = state.next_promotion_id();
                state.upsert_promotion(
                    Promotion::new(id.clone(), product_id, offer_price)
                        .with_description(description),
                );
                Ok(id)
            })
            .await
    }

    pub async fn remove_promotion(&self, id: &str) -> ClientResult<()> {
        self.sync
            .update(|state| {
                state
                    .remove_promotion(id)
                    .map(|_| ())
                    .ok_or_else(|| AppError::promotion_not_found(id))
            })
            .await
    }

    pub async fn set_promotion_active(&self, id: &str, active: bool) -> ClientResult<()> {
        self.sync
            .update(|state| state.set_promotion_active(id, active))
            .await
    }

    /// Fill the promotion's description with generated copy.
    /// Generation failures fall back to a stock phrase.
    pub async fn generate_description(&self, promotion_id: &str) -> ClientResult<String> {
        let generator = self.generator()?;
        let product_name = self.promotion_product_name(promotion_id)?;
        let phrase = phrase_or_fallback(generator.as_ref(), &product_name).await;
        let text = phrase.clone();
        self.sync
            .update(|state| state.set_promotion_description(promotion_id, text))
            .await?;
        Ok(phrase)
    }

    /// Generate a photo for the promotion. Returns false when generation
    /// failed and the old image was kept.
    pub async fn generate_photo(&self, promotion_id: &str, aspect: AspectRatio) -> ClientResult<bool> {
        let generator = self.generator()?;
        let product_name = self.promotion_product_name(promotion_id)?;
        let Some(image) = photo_or_none(generator.as_ref(), &product_name, aspect).await else {
            return Ok(false);
        };
        self.sync
            .update(|state| state.set_promotion_image(promotion_id, Some(image)))
            .await?;
        Ok(true)
    }

    // ==================== Super offer ====================

    /// Add or remove a product from the takeover set. `price` defaults to
    /// the last price used, then to the regular price.
    pub async fn toggle_super_offer(
        &self,
        product_id: &str,
        price: Option<Decimal>,
    ) -> ClientResult<bool> {
        self.sync
            .update(|state| state.toggle_super_offer(product_id, price))
            .await
    }

    pub async fn set_super_offer_price(&self, product_id: &str, price: Decimal) -> ClientResult<()> {
        self.sync
            .update(|state| state.set_super_offer_price(product_id, price))
            .await
    }

    pub async fn clear_super_offer(&self) -> ClientResult<()> {
        self.sync
            .update(|state| {
                state.clear_super_offer();
                Ok(())
            })
            .await
    }

    // ==================== Settings ====================

    pub async fn rename_store(&self, name: &str) -> ClientResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::validation("Store name must not be empty").into());
        }
        self.sync
            .update(|state| {
                state.set_store_name(name);
                Ok(())
            })
            .await
    }

    pub async fn set_accent_color(&self, color: &str) -> ClientResult<()> {
        self.sync
            .update(|state| {
                state.set_accent_color(color);
                Ok(())
            })
            .await
    }

    pub async fn set_orientation(&self, orientation: Orientation) -> ClientResult<()> {
        self.sync
            .update(|state| {
                state.set_orientation(orientation);
                Ok(())
            })
            .await
    }

    pub async fn set_intervals(&self, promo_secs: u32, page_secs: u32) -> ClientResult<()> {
        self.sync
            .update(|state| state.set_intervals(promo_secs, page_secs))
            .await
    }

    // ==================== Remote control ====================

    /// Show a promotion full-screen on every display; `None` dismisses
    pub async fn highlight(&self, promotion_id: Option<&str>) -> ClientResult<()> {
        if let Some(id) = promotion_id
            && self.sync.state().promotion(id).is_none()
        {
            return Err(AppError::promotion_not_found(id).into());
        }
        self.sync.highlight(promotion_id.map(str::to_string)).await
    }

    /// Switch one device (or every device) to another surface
    pub async fn switch_mode(&self, target: Option<DeviceId>, role: Role) -> ClientResult<()> {
        self.sync.switch_mode(target, role).await
    }

    /// Ask every device to announce itself now
    pub async fn refresh_roster(&self) -> ClientResult<()> {
        self.sync.send_command(RemoteCommand::RequestPresence).await
    }

    pub fn roster(&self) -> Vec<DeviceRecord> {
        self.sync.roster()
    }

    fn generator(&self) -> ClientResult<Arc<dyn ContentGenerator>> {
        self.generator
            .clone()
            .ok_or_else(|| ClientError::Generation("content generation is not configured".into()))
    }

    fn promotion_product_name(&self, promotion_id: &str) -> ClientResult<String> {
        let state = self.sync.state();
        let promotion = state
            .promotion(promotion_id)
            .ok_or_else(|| AppError::promotion_not_found(promotion_id))?;
        let product = state
            .product(&promotion.product_id)
            .ok_or_else(|| AppError::product_not_found(promotion.product_id.clone()))?;
        Ok(product.name.clone())
    }
}

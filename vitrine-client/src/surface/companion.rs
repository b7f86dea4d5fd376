//! Phone surface: quick price changes and pushing the local document

use shared::{Decimal, Orientation};
use shared::error::AppError;
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::genai::{AspectRatio, ContentGenerator, photo_or_none};
use crate::sync::SyncHandle;

/// Price step used by the +/- buttons
pub const PRICE_STEP: Decimal = Decimal::from_parts(50, 0, 0, false, 2);

/// Companion surface over a sync handle
#[derive(Clone)]
pub struct Companion {
    sync: SyncHandle,
    generator: Option<Arc<dyn ContentGenerator>>,
}

impl Companion {
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

    /// Move a promotion's offer price by `delta` (never below zero);
    /// returns the new price
    pub async fn nudge_price(&self, promotion_id: &str, delta: Decimal) -> ClientResult<Decimal> {
        self.sync
            .update(|state| state.nudge_promotion_price(promotion_id, delta))
            .await
    }

    pub async fn raise_price(&self, promotion_id: &str) -> ClientResult<Decimal> {
        self.nudge_price(promotion_id, PRICE_STEP).await
    }

    pub async fn lower_price(&self, promotion_id: &str) -> ClientResult<Decimal> {
        self.nudge_price(promotion_id, -PRICE_STEP).await
    }

    /// Replace a promotion's photo. Returns false when generation failed
    /// and the old image was kept.
    pub async fn regenerate_photo(&self, promotion_id: &str) -> ClientResult<bool> {
        let generator = self
            .generator
            .clone()
            .ok_or_else(|| ClientError::Generation("content generation is not configured".into()))?;

        let state = self.sync.state();
        let promotion = state
            .promotion(promotion_id)
            .ok_or_else(|| AppError::promotion_not_found(promotion_id))?;
        let name = state
            .product(&promotion.product_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| AppError::product_not_found(promotion.product_id.clone()))?;
        let aspect = match state.orientation {
            Orientation::Landscape => AspectRatio::Landscape,
            Orientation::Portrait => AspectRatio::Portrait,
        };

        let Some(image) = photo_or_none(generator.as_ref(), &name, aspect).await else {
            return Ok(false);
        };
        self.sync
            .update(|state| state.set_promotion_image(promotion_id, Some(image)))
            .await?;
        Ok(true)
    }

    /// Make this phone's document canonical for the whole room
    pub async fn force_push(&self) -> ClientResult<()> {
        tracing::info!(room = %self.sync.room(), "Force push requested");
        self.sync.force_push().await
    }

    /// Show a promotion on the TV right now
    pub async fn highlight(&self, promotion_id: Option<String>) -> ClientResult<()> {
        self.sync.highlight(promotion_id).await
    }
}

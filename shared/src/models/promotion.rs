//! Promotion Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rotating promotion shown on the display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub id: String,
    /// Product reference (String ID). May dangle; the display skips it then.
    pub product_id: String,
    pub offer_price: Decimal,
    /// Image URL or inline `data:` URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Promotion {
    pub fn new(id: impl Into<String>, product_id: impl Into<String>, offer_price: Decimal) -> Self {
        Self {
            id: id.into(),
            product_id: product_id.into(),
            offer_price: offer_price.round_dp(2),
            image: None,
            description: String::new(),
            active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Whether the image is carried inline rather than referenced by URL
    pub fn has_inline_image(&self) -> bool {
        self.image
            .as_deref()
            .is_some_and(|img| img.starts_with("data:"))
    }
}

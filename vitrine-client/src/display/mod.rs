//! Display state machine
//!
//! Decides what the TV shows: the normal rotation (active promotions, or
//! catalog pages when there are none), the super-offer takeover while the
//! offer set is non-empty, or a remote highlight which preempts both.
//! The machine has no clock of its own; the display surface calls the
//! `advance_*` methods from its timers.

pub mod carousel;
pub mod scroll;

pub use carousel::Carousel;
pub use scroll::ScrollAnimator;

use shared::models::{Product, Promotion, format_brl};
use shared::{AppState, Decimal};
use std::time::Duration;

/// Fixed super-offer cycling period
pub const SUPER_OFFER_INTERVAL: Duration = Duration::from_secs(15);

/// Catalog rows per page in the fallback menu
pub const PRODUCTS_PER_PAGE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    NormalRotation,
    SuperOfferTakeover,
    RemoteHighlight,
}

/// What the display renders right now
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Nothing to show
    Empty,
    Promotion {
        promotion: Promotion,
        product: Product,
    },
    /// Catalog page (1-based `page` of `pages`)
    ProductPage {
        page: usize,
        pages: usize,
        products: Vec<Product>,
    },
    SuperOffer {
        product: Product,
        price: Decimal,
        /// 1-based position in the offer set
        position: usize,
        total: usize,
    },
    Highlight {
        promotion: Promotion,
        product: Product,
    },
}

impl Screen {
    /// One-line description for logs and headless output
    pub fn summary(&self) -> String {
        match self {
            Self::Empty => "empty".to_string(),
            Self::Promotion { promotion, product } => {
                format!("promotion {} {} {}", promotion.id, product.name, format_brl(promotion.offer_price))
            }
            Self::ProductPage { page, pages, products } => {
                format!("price list {page}/{pages} ({} items)", products.len())
            }
            Self::SuperOffer { product, price, position, total } => {
                format!("super offer {position}/{total} {} {}", product.name, format_brl(*price))
            }
            Self::Highlight { promotion, product } => {
                format!("highlight {} {}", promotion.id, product.name)
            }
        }
    }
}

/// Display takeover state machine
#[derive(Debug, Clone)]
pub struct DisplayMachine {
    state: AppState,
    /// Highlighted promotion id
    highlight: Option<String>,
    rotation: Carousel,
    super_offer: Carousel,
}

impl DisplayMachine {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            highlight: None,
            rotation: Carousel::new(),
            super_offer: Carousel::new(),
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn highlighted(&self) -> Option<&str> {
        self.highlight.as_deref()
    }

    pub fn mode(&self) -> DisplayMode {
        if self.highlight.is_some() {
            DisplayMode::RemoteHighlight
        } else if !self.super_offer_items().is_empty() {
            DisplayMode::SuperOfferTakeover
        } else {
            DisplayMode::NormalRotation
        }
    }

    /// Period of the normal rotation for the current document
    pub fn rotation_interval(&self) -> Duration {
        let secs = if self.state.active_promotions().is_empty() {
            self.state.page_interval_secs
        } else {
            self.state.promo_interval_secs
        };
        Duration::from_secs(u64::from(secs.max(1)))
    }

    /// Replace the document. A highlight whose promotion is gone ends here.
    pub fn apply_state(&mut self, state: AppState) {
        self.state = state;
        if let Some(id) = &self.highlight
            && self.highlight_target(id).is_none()
        {
            tracing::debug!(promotion_id = %id, "Highlighted promotion removed");
            self.highlight = None;
        }
    }

    /// Show one promotion full-screen. Unknown ids and `None` dismiss.
    /// Returns whether a highlight is now showing.
    pub fn highlight(&mut self, promotion_id: Option<String>) -> bool {
        self.highlight = promotion_id.filter(|id| self.highlight_target(id).is_some());
        self.highlight.is_some()
    }

    /// Normal rotation timer fired. Suspended during takeovers.
    pub fn advance_rotation(&mut self) {
        if self.mode() != DisplayMode::NormalRotation {
            return;
        }
        let len = self.rotation_len();
        self.rotation.advance(len);
    }

    /// Super-offer timer fired. Suspended during a highlight.
    pub fn advance_super_offer(&mut self) {
        if self.mode() != DisplayMode::SuperOfferTakeover {
            return;
        }
        let len = self.super_offer_items().len();
        self.super_offer.advance(len);
    }

    pub fn screen(&self) -> Screen {
        match self.mode() {
            DisplayMode::RemoteHighlight => self.highlight_screen(),
            DisplayMode::SuperOfferTakeover => self.super_offer_screen(),
            DisplayMode::NormalRotation => self.rotation_screen(),
        }
    }

    fn highlight_target(&self, id: &str) -> Option<(&Promotion, &Product)> {
        let promotion = self.state.promotion(id)?;
        let product = self.state.product(&promotion.product_id)?;
        Some((promotion, product))
    }

    fn highlight_screen(&self) -> Screen {
        match self
            .highlight
            .as_deref()
            .and_then(|id| self.highlight_target(id))
        {
            Some((promotion, product)) => Screen::Highlight {
                promotion: promotion.clone(),
                product: product.clone(),
            },
            None => self.rotation_screen(),
        }
    }

    /// Offer entries whose product still exists, in set order
    fn super_offer_items(&self) -> Vec<(&Product, Decimal)> {
        let offer = &self.state.super_offer;
        offer
            .product_ids
            .iter()
            .filter_map(|id| {
                let product = self.state.product(id)?;
                Some((product, offer.price_of(id).unwrap_or(product.price)))
            })
            .collect()
    }

    fn super_offer_screen(&self) -> Screen {
        let items = self.super_offer_items();
        match self.super_offer.current(items.len()) {
            Some(idx) => {
                let (product, price) = items[idx];
                Screen::SuperOffer {
                    product: product.clone(),
                    price,
                    position: idx + 1,
                    total: items.len(),
                }
            }
            None => Screen::Empty,
        }
    }

    fn rotation_len(&self) -> usize {
        let promotions = self.state.active_promotions().len();
        if promotions > 0 {
            promotions
        } else {
            carousel::page_count(self.state.products.len(), PRODUCTS_PER_PAGE)
        }
    }

    fn rotation_screen(&self) -> Screen {
        let promotions = self.state.active_promotions();
        if !promotions.is_empty() {
            let Some(idx) = self.rotation.current(promotions.len()) else {
                return Screen::Empty;
            };
            let promotion = promotions[idx];
            return match self.state.product(&promotion.product_id) {
                Some(product) => Screen::Promotion {
                    promotion: promotion.clone(),
                    product: product.clone(),
                },
                None => Screen::Empty,
            };
        }

        let pages = carousel::page_count(self.state.products.len(), PRODUCTS_PER_PAGE);
        match self.rotation.current(pages) {
            Some(page) => Screen::ProductPage {
                page: page + 1,
                pages,
                products: self
                    .state
                    .products
                    .chunks(PRODUCTS_PER_PAGE)
                    .nth(page)
                    .map(<[Product]>::to_vec)
                    .unwrap_or_default(),
            },
            None => Screen::Empty,
        }
    }
}

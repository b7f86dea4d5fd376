//! Product Model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit of sale shown next to the price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SaleUnit {
    /// Priced per kilogram
    #[default]
    Kg,
    /// Priced per unit
    Un,
    /// Priced per piece (whole cut, tray)
    Pc,
}

impl SaleUnit {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Kg => "KG",
            Self::Un => "UN",
            Self::Pc => "PC",
        }
    }
}

impl fmt::Display for SaleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Product entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Unit price, two decimal places
    pub price: Decimal,
    #[serde(default)]
    pub unit: SaleUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        unit: SaleUnit,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price: price.round_dp(2),
            unit,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Price label as shown on the TV, e.g. `R$ 69,90/KG`
    pub fn price_label(&self) -> String {
        format!("{}/{}", format_brl(self.price), self.unit)
    }
}

/// Format a price with the Brazilian decimal comma
pub fn format_brl(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let text = format!("{:.2}", rounded);
    format!("R$ {}", text.replace('.', ","))
}

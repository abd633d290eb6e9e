use serde::{Deserialize, Serialize};

/// A catalog line: one product as the warehouse knows it.
///
/// `stock_quantity` is only ever mutated through the [`crate::StockLedger`]
/// entry points; client code holds copies, never live references into the
/// catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Product {
    /// Stable catalog key, e.g. "0001".
    pub id: String,
    pub description: String,
    /// Image file name, resolved by the (external) view layer.
    pub image: String,
    /// Price in minor currency units (pence).
    pub unit_price: i64,
    pub stock_quantity: u32,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        image: impl Into<String>,
        unit_price: i64,
        stock_quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            image: image.into(),
            unit_price,
            stock_quantity,
        }
    }

    /// Snapshot this product into a requested line item.
    pub fn line_item(&self, quantity: u32) -> LineItem {
        LineItem {
            product_id: self.id.clone(),
            description: self.description.clone(),
            image: self.image.clone(),
            unit_price: self.unit_price,
            quantity,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

/// A product snapshot plus a requested quantity.
///
/// Line items are copies of catalog data taken at the moment the customer
/// picked the product, so a later catalog update cannot corrupt a trolley or
/// a placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: String,
    pub description: String,
    pub image: String,
    pub unit_price: i64,
    pub quantity: u32,
}

impl LineItem {
    pub fn line_total(&self) -> i64 {
        self.unit_price * self.quantity as i64
    }
}

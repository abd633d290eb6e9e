use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::product::{LineItem, Product};

/// How `purchase_stocks` treats a trolley with short lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationMode {
    /// Two-phase check-then-commit: either every line is reserved or none is.
    Atomic,
    /// Compatibility behavior of the legacy system: lines are reserved one by
    /// one, and reservations made before a short line is hit are kept.
    /// Callers must surface this to users as a known limitation.
    LegacyPartial,
}

impl Default for ReservationMode {
    fn default() -> Self {
        ReservationMode::Atomic
    }
}

/// A requested line the ledger could not cover, with the quantity that was
/// actually on hand at the moment of the attempt.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Shortage {
    pub line: LineItem,
    pub available: u32,
}

impl Shortage {
    pub fn requested(&self) -> u32 {
        self.line.quantity
    }

    /// Nothing on hand at all: the line can only be removed, not reduced.
    pub fn is_unfulfillable(&self) -> bool {
        self.available == 0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Unknown product: {0}")]
    UnknownProduct(String),
    #[error("Invalid price {unit_price} for product {product_id}")]
    InvalidPrice { product_id: String, unit_price: i64 },
}

/// Thread-safe ledger of per-product available stock.
///
/// All stock mutation in the system goes through this type. The internal
/// lock is the per-product atomicity guarantee: no two concurrent
/// reservations can both observe sufficient stock and jointly over-reserve.
#[derive(Debug, Default)]
pub struct StockLedger {
    products: Mutex<HashMap<String, Product>>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or replace catalog entries. Prices are in minor units and must
    /// be non-negative; a bad entry rejects the whole batch, so a failed
    /// load leaves the ledger exactly as it was.
    pub fn load(&self, products: Vec<Product>) -> Result<(), LedgerError> {
        for product in &products {
            if product.unit_price < 0 {
                return Err(LedgerError::InvalidPrice {
                    product_id: product.id.clone(),
                    unit_price: product.unit_price,
                });
            }
        }
        let mut map = self.products.lock().expect("ledger lock poisoned");
        for product in products {
            map.insert(product.id.clone(), product);
        }
        Ok(())
    }

    /// Copy of the current catalog record, if the product exists.
    pub fn get(&self, product_id: &str) -> Option<Product> {
        let map = self.products.lock().expect("ledger lock poisoned");
        map.get(product_id).cloned()
    }

    /// Warehouse top-up. Returns the new stock level.
    pub fn restock(&self, product_id: &str, quantity: u32) -> Result<u32, LedgerError> {
        let mut map = self.products.lock().expect("ledger lock poisoned");
        let product = map
            .get_mut(product_id)
            .ok_or_else(|| LedgerError::UnknownProduct(product_id.to_string()))?;
        product.stock_quantity = product.stock_quantity.saturating_add(quantity);
        info!(product_id, new_level = product.stock_quantity, "restocked");
        Ok(product.stock_quantity)
    }

    /// Reserve stock for a trolley's line items at checkout.
    ///
    /// Every returned [`Shortage`] carries the quantity that was actually
    /// available; short lines are never partially decremented. A line for a
    /// product the catalog does not know is reported as a shortage with
    /// `available == 0` rather than an error, so the caller can offer the
    /// same remediation path.
    pub fn purchase_stocks(&self, items: &[LineItem], mode: ReservationMode) -> Vec<Shortage> {
        let mut map = self.products.lock().expect("ledger lock poisoned");
        match mode {
            ReservationMode::Atomic => Self::reserve_all_or_nothing(&mut map, items),
            ReservationMode::LegacyPartial => Self::reserve_line_by_line(&mut map, items),
        }
    }

    fn reserve_all_or_nothing(
        map: &mut HashMap<String, Product>,
        items: &[LineItem],
    ) -> Vec<Shortage> {
        // Demand is aggregated per product first, so several lines for the
        // same product are checked (and later committed) as one total.
        let mut demand: HashMap<&str, u32> = HashMap::new();
        for item in items {
            let total = demand.entry(item.product_id.as_str()).or_insert(0);
            *total = total.saturating_add(item.quantity);
        }

        let mut shortages = Vec::new();
        for item in items {
            let available = map.get(&item.product_id).map_or(0, |p| p.stock_quantity);
            if demand[item.product_id.as_str()] > available {
                shortages.push(Shortage {
                    line: item.clone(),
                    available,
                });
            }
        }

        if !shortages.is_empty() {
            debug!(count = shortages.len(), "reservation refused, stock untouched");
            return shortages;
        }

        for (product_id, total) in demand {
            if let Some(product) = map.get_mut(product_id) {
                product.stock_quantity -= total;
            }
        }
        shortages
    }

    fn reserve_line_by_line(
        map: &mut HashMap<String, Product>,
        items: &[LineItem],
    ) -> Vec<Shortage> {
        let mut shortages = Vec::new();
        for item in items {
            match map.get_mut(&item.product_id) {
                Some(product) if product.stock_quantity >= item.quantity => {
                    product.stock_quantity -= item.quantity;
                }
                Some(product) => {
                    shortages.push(Shortage {
                        line: item.clone(),
                        available: product.stock_quantity,
                    });
                }
                None => {
                    shortages.push(Shortage {
                        line: item.clone(),
                        available: 0,
                    });
                }
            }
        }
        if !shortages.is_empty() {
            debug!(count = shortages.len(), "partial reservation, earlier lines kept");
        }
        shortages
    }

    /// Return previously reserved quantities to stock.
    ///
    /// The legacy system had no way back once stock was decremented; this is
    /// the explicit release half of the two-phase protocol.
    pub fn release(&self, items: &[LineItem]) -> Result<(), LedgerError> {
        let mut map = self.products.lock().expect("ledger lock poisoned");
        for item in items {
            let product = map
                .get_mut(&item.product_id)
                .ok_or_else(|| LedgerError::UnknownProduct(item.product_id.clone()))?;
            product.stock_quantity = product.stock_quantity.saturating_add(item.quantity);
        }
        Ok(())
    }

    /// Products at or below a stock threshold, for warehouse monitoring.
    pub fn low_stock(&self, threshold: u32) -> Vec<Product> {
        let map = self.products.lock().expect("ledger lock poisoned");
        let mut low: Vec<Product> = map
            .values()
            .filter(|p| p.stock_quantity <= threshold)
            .cloned()
            .collect();
        low.sort_by(|a, b| a.id.cmp(&b.id));
        low
    }

    pub(crate) fn snapshot(&self) -> Vec<Product> {
        let map = self.products.lock().expect("ledger lock poisoned");
        map.values().cloned().collect()
    }
}

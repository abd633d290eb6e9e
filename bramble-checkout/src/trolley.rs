use std::collections::BTreeMap;

use bramble_catalog::{LineItem, Product};

/// Render minor currency units as a pounds-and-pence string.
pub fn format_price(minor_units: i64) -> String {
    format!("£{}.{:02}", minor_units / 100, minor_units % 100)
}

/// A customer's in-progress, unsubmitted collection of line items.
///
/// Private to its owning client; the hub and ledger only ever see the
/// snapshots produced by [`Trolley::line_items`]. Repeated adds of the same
/// product merge into one line, and listings come out sorted by product id.
#[derive(Debug, Default)]
pub struct Trolley {
    items: BTreeMap<String, LineItem>,
}

impl Trolley {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of a product, merging with any existing line.
    pub fn add(&mut self, product: &Product, quantity: u32) {
        self.items
            .entry(product.id.clone())
            .and_modify(|line| line.quantity += quantity)
            .or_insert_with(|| product.line_item(quantity));
    }

    /// Remove a line entirely. Returns false when the product was not there.
    pub fn remove(&mut self, product_id: &str) -> bool {
        self.items.remove(product_id).is_some()
    }

    /// Overwrite a line's quantity. Rejects zero and unknown products.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        match self.items.get_mut(product_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> u32 {
        self.items.values().map(|line| line.quantity).sum()
    }

    pub fn total_price(&self) -> i64 {
        self.items.values().map(LineItem::line_total).sum()
    }

    /// Snapshot of the current lines, sorted by product id.
    pub fn line_items(&self) -> Vec<LineItem> {
        self.items.values().cloned().collect()
    }

    /// The formatted listing the customer view displays.
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "Your trolley is empty".to_string();
        }

        let mut out = String::from("TROLLEY SUMMARY:\n");
        out.push_str(&"=".repeat(40));
        out.push('\n');

        for line in self.items.values() {
            out.push_str(&format!("{} - {}\n", line.product_id, line.description));
            out.push_str(&format!(
                "   Quantity: {} @ {} each\n",
                line.quantity,
                format_price(line.unit_price)
            ));
            out.push_str(&format!(
                "   Subtotal: {}\n\n",
                format_price(line.line_total())
            ));
        }

        out.push_str(&"-".repeat(40));
        out.push('\n');
        out.push_str(&format!("TOTAL ITEMS: {}\n", self.total_items()));
        out.push_str(&format!("TOTAL PRICE: {}\n", format_price(self.total_price())));
        out
    }
}

use crate::ledger::StockLedger;
use crate::product::Product;

/// Multi-criteria product query. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SearchCriteria {
    pub product_id: Option<String>,
    pub name_contains: Option<String>,
    /// Minor currency units, inclusive.
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub in_stock_only: bool,
}

/// The lookup surface every product source offers.
///
/// Sources that can also run multi-criteria queries advertise that through
/// [`BasicSearch::advanced`]; callers probe the capability instead of
/// assuming a concrete type.
pub trait BasicSearch: Send + Sync {
    fn search_by_product_id(&self, product_id: &str) -> Option<Product>;

    /// Case-insensitive substring match on the description.
    fn search_by_name(&self, fragment: &str) -> Vec<Product>;

    fn advanced(&self) -> Option<&dyn AdvancedSearch> {
        None
    }
}

pub trait AdvancedSearch: BasicSearch {
    fn search(&self, criteria: &SearchCriteria) -> Vec<Product>;
}

impl BasicSearch for StockLedger {
    fn search_by_product_id(&self, product_id: &str) -> Option<Product> {
        self.get(product_id)
    }

    fn search_by_name(&self, fragment: &str) -> Vec<Product> {
        let needle = fragment.to_lowercase();
        let mut results: Vec<Product> = self
            .snapshot()
            .into_iter()
            .filter(|p| p.description.to_lowercase().contains(&needle))
            .collect();
        results.sort_by(|a, b| a.id.cmp(&b.id));
        results
    }

    fn advanced(&self) -> Option<&dyn AdvancedSearch> {
        Some(self)
    }
}

impl AdvancedSearch for StockLedger {
    fn search(&self, criteria: &SearchCriteria) -> Vec<Product> {
        let needle = criteria.name_contains.as_ref().map(|n| n.to_lowercase());
        let mut results: Vec<Product> = self
            .snapshot()
            .into_iter()
            .filter(|p| criteria.product_id.as_ref().map_or(true, |id| &p.id == id))
            .filter(|p| {
                needle
                    .as_ref()
                    .map_or(true, |n| p.description.to_lowercase().contains(n))
            })
            .filter(|p| criteria.min_price.map_or(true, |min| p.unit_price >= min))
            .filter(|p| criteria.max_price.map_or(true, |max| p.unit_price <= max))
            .filter(|p| !criteria.in_stock_only || p.in_stock())
            .collect();
        results.sort_by(|a, b| a.id.cmp(&b.id));
        results
    }
}

pub mod ledger;
pub mod product;
pub mod search;

pub use ledger::{ReservationMode, Shortage, StockLedger};
pub use product::{LineItem, Product};
pub use search::{AdvancedSearch, BasicSearch, SearchCriteria};

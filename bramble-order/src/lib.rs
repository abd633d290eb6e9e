pub mod error;
pub mod hub;
pub mod models;
pub mod registry;

pub use error::HubError;
pub use hub::{FulfillmentHub, OrderFeed, Role};
pub use models::{Order, OrderEvent, OrderState, StateChange};
pub use registry::OrderRegistry;

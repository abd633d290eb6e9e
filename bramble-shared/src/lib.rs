pub mod ids;

pub use ids::OrderId;

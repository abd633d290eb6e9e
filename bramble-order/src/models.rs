use bramble_catalog::LineItem;
use bramble_shared::OrderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order lifecycle state.
///
/// Transitions are one-directional and follow the single forward chain
/// returned by [`OrderState::successor`]; `Cancelled` is reachable from any
/// non-terminal state. No state is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    New,
    VisibleToPickers,
    Claimed,
    Picked,
    Ready,
    Completed,
    Cancelled,
}

impl OrderState {
    /// The unique forward step from this state, if one exists.
    pub fn successor(&self) -> Option<OrderState> {
        match self {
            OrderState::New => Some(OrderState::VisibleToPickers),
            OrderState::VisibleToPickers => Some(OrderState::Claimed),
            OrderState::Claimed => Some(OrderState::Picked),
            OrderState::Picked => Some(OrderState::Ready),
            OrderState::Ready => Some(OrderState::Completed),
            OrderState::Completed | OrderState::Cancelled => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Completed | OrderState::Cancelled)
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderState::New => "NEW",
            OrderState::VisibleToPickers => "VISIBLE_TO_PICKERS",
            OrderState::Claimed => "CLAIMED",
            OrderState::Picked => "PICKED",
            OrderState::Ready => "READY",
            OrderState::Completed => "COMPLETED",
            OrderState::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// One entry in an order's lifecycle log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChange {
    pub state: OrderState,
    pub actor: String,
    pub at: DateTime<Utc>,
}

/// The single source of truth for a customer's purchase.
///
/// Owned by the hub once submitted; everything handed back to callers and
/// subscribers is a clone, so a receipt view can never mutate hub state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    /// Snapshot copies taken at checkout, never aliases of catalog records.
    pub items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub state: OrderState,
    /// The picker currently holding the claim, once one exists.
    pub claimed_by: Option<String>,
    pub history: Vec<StateChange>,
}

impl Order {
    pub fn total_price(&self) -> i64 {
        self.items.iter().map(LineItem::line_total).sum()
    }

    pub fn total_items(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// What the hub pushes to every interested subscriber on a committed
/// transition: the order id, the state it just entered, and a full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: OrderId,
    pub state: OrderState,
    pub order: Order,
}

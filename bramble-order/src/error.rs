use crate::models::OrderState;
use bramble_shared::OrderId;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The stored state no longer matched the expected state when the
    /// transition was attempted. Under concurrent claims this is the normal
    /// "another picker got there first" outcome, not a fault.
    #[error("Stale state: expected {expected}, order is now {actual}")]
    StaleState {
        expected: OrderState,
        actual: OrderState,
    },

    /// Actor/role mismatch or a target that is not the unique successor of
    /// the current state. Surfaced to callers as a permission problem.
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl HubError {
    /// Losing a race is expected under contention; everything else is a
    /// caller mistake worth surfacing loudly.
    pub fn is_lost_race(&self) -> bool {
        matches!(self, HubError::StaleState { .. })
    }
}

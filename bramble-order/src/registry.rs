use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use bramble_catalog::LineItem;
use bramble_shared::OrderId;
use chrono::Utc;

use crate::error::HubError;
use crate::models::{Order, OrderState, StateChange};

/// In-memory, thread-safe map of every order the hub has ever accepted.
///
/// Identifier allocation is atomic: no two concurrent `create` calls can
/// observe the same id. Every mutation appends to the order's history log
/// before the updated snapshot is returned.
#[derive(Debug)]
pub struct OrderRegistry {
    orders: Mutex<HashMap<OrderId, Order>>,
    next_seq: AtomicU64,
}

impl Default for OrderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
        }
    }

    /// Store a new order in state `NEW` and return its snapshot.
    pub fn create(&self, customer_id: &str, items: Vec<LineItem>) -> Order {
        let id = OrderId::new(self.next_seq.fetch_add(1, Ordering::Relaxed));
        let now = Utc::now();
        let order = Order {
            id,
            customer_id: customer_id.to_string(),
            items,
            created_at: now,
            state: OrderState::New,
            claimed_by: None,
            history: vec![StateChange {
                state: OrderState::New,
                actor: customer_id.to_string(),
                at: now,
            }],
        };

        let mut orders = self.orders.lock().expect("registry lock poisoned");
        orders.insert(id, order.clone());
        order
    }

    pub fn get(&self, id: OrderId) -> Result<Order, HubError> {
        let orders = self.orders.lock().expect("registry lock poisoned");
        orders.get(&id).cloned().ok_or(HubError::NotFound(id))
    }

    /// Optimistically move an order from `from` to `to`.
    ///
    /// Fails with `StaleState` when the stored state differs from `from` at
    /// the moment of the attempt, so exactly one of any set of concurrent
    /// actors wins a given step.
    pub fn transition(
        &self,
        id: OrderId,
        from: OrderState,
        to: OrderState,
        actor: &str,
    ) -> Result<Order, HubError> {
        let mut orders = self.orders.lock().expect("registry lock poisoned");
        let order = orders.get_mut(&id).ok_or(HubError::NotFound(id))?;

        if order.state != from {
            return Err(HubError::StaleState {
                expected: from,
                actual: order.state,
            });
        }

        order.history.push(StateChange {
            state: to,
            actor: actor.to_string(),
            at: Utc::now(),
        });
        order.state = to;
        if to == OrderState::Claimed {
            order.claimed_by = Some(actor.to_string());
        }
        Ok(order.clone())
    }

    /// Orders currently open for claiming, oldest first.
    pub fn open_orders(&self) -> Vec<Order> {
        let orders = self.orders.lock().expect("registry lock poisoned");
        let mut open: Vec<Order> = orders
            .values()
            .filter(|o| o.state == OrderState::VisibleToPickers)
            .cloned()
            .collect();
        open.sort_by_key(|o| o.id);
        open
    }

    /// Empty the map. Called once at process start, before any client
    /// registers with the hub.
    pub fn reset(&self) {
        let mut orders = self.orders.lock().expect("registry lock poisoned");
        orders.clear();
    }

    pub fn len(&self) -> usize {
        self.orders.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn item() -> LineItem {
        LineItem {
            product_id: "0001".to_string(),
            description: "Kettle".to_string(),
            image: "kettle.jpg".to_string(),
            unit_price: 2500,
            quantity: 1,
        }
    }

    #[test]
    fn test_create_assigns_unique_ids_under_contention() {
        let registry = Arc::new(OrderRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| registry.create("cust-1", vec![item()]).id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate order id {id}");
            }
        }
        assert_eq!(seen.len(), 200);
    }

    #[test]
    fn test_transition_appends_history() {
        let registry = OrderRegistry::new();
        let order = registry.create("cust-1", vec![item()]);

        let updated = registry
            .transition(order.id, OrderState::New, OrderState::VisibleToPickers, "hub")
            .unwrap();
        assert_eq!(updated.state, OrderState::VisibleToPickers);
        assert_eq!(updated.history.len(), 2);
        assert_eq!(updated.history[1].actor, "hub");
    }

    #[test]
    fn test_stale_transition_rejected() {
        let registry = OrderRegistry::new();
        let order = registry.create("cust-1", vec![item()]);
        registry
            .transition(order.id, OrderState::New, OrderState::VisibleToPickers, "hub")
            .unwrap();

        let err = registry
            .transition(order.id, OrderState::New, OrderState::VisibleToPickers, "hub")
            .unwrap_err();
        assert!(matches!(
            err,
            HubError::StaleState {
                expected: OrderState::New,
                actual: OrderState::VisibleToPickers,
            }
        ));
    }

    #[test]
    fn test_claim_records_actor() {
        let registry = OrderRegistry::new();
        let order = registry.create("cust-1", vec![item()]);
        registry
            .transition(order.id, OrderState::New, OrderState::VisibleToPickers, "hub")
            .unwrap();
        let claimed = registry
            .transition(
                order.id,
                OrderState::VisibleToPickers,
                OrderState::Claimed,
                "picker-1",
            )
            .unwrap();
        assert_eq!(claimed.claimed_by.as_deref(), Some("picker-1"));
    }

    #[test]
    fn test_unknown_order_is_not_found() {
        let registry = OrderRegistry::new();
        let err = registry.get(OrderId::new(99)).unwrap_err();
        assert!(matches!(err, HubError::NotFound(_)));
    }

    #[test]
    fn test_reset_empties_the_map() {
        let registry = OrderRegistry::new();
        registry.create("cust-1", vec![item()]);
        assert_eq!(registry.len(), 1);
        registry.reset();
        assert!(registry.is_empty());
    }
}

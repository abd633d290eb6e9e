use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bramble_catalog::LineItem;
use bramble_shared::OrderId;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::HubError;
use crate::models::{Order, OrderEvent, OrderState};
use crate::registry::OrderRegistry;

/// Subscriber role. Pickers see every open order; trackers see the orders
/// their filter admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Picker,
    Tracker,
}

/// The receiving half of a subscription: the hub pushes [`OrderEvent`]s in
/// registry commit order, and a slow consumer only ever delays itself.
#[derive(Debug)]
pub struct OrderFeed {
    rx: mpsc::UnboundedReceiver<OrderEvent>,
}

impl OrderFeed {
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        self.rx.recv().await
    }

    /// Non-blocking poll, for synchronous callers and tests.
    pub fn try_recv(&mut self) -> Option<OrderEvent> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug)]
struct Subscription {
    subscriber_id: String,
    role: Role,
    /// Trackers may restrict themselves to one customer's orders.
    filter: Option<String>,
    sender: mpsc::UnboundedSender<OrderEvent>,
}

impl Subscription {
    fn wants(&self, order: &Order) -> bool {
        match self.role {
            Role::Picker => true,
            Role::Tracker => self
                .filter
                .as_ref()
                .map_or(true, |customer| customer == &order.customer_id),
        }
    }
}

/// The order coordination hub.
///
/// One instance per process, constructed at startup and handed to every
/// client as an `Arc` — there is deliberately no global accessor. The hub
/// owns the [`OrderRegistry`] and the subscriber table; clients interact
/// only through submissions, transition requests, and their own feeds.
///
/// Locking: a per-order mutex serializes all transitions of one order while
/// different orders progress in parallel. The registry commit and the
/// enqueue of notifications happen under the subscriber-table lock, so each
/// feed observes events in exactly the order the transitions committed, and
/// a registration backfill can never miss or double-deliver an event.
/// Enqueues are unbounded-channel sends and never block.
#[derive(Debug)]
pub struct FulfillmentHub {
    registry: OrderRegistry,
    subscribers: Mutex<Vec<Subscription>>,
    order_locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl Default for FulfillmentHub {
    fn default() -> Self {
        Self::new()
    }
}

impl FulfillmentHub {
    pub fn new() -> Self {
        Self {
            registry: OrderRegistry::new(),
            subscribers: Mutex::new(Vec::new()),
            order_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Reset the registry. Called once at process start, before any client
    /// registers or submits.
    pub fn initialize_order_map(&self) {
        self.registry.reset();
        self.order_locks
            .lock()
            .expect("order lock table poisoned")
            .clear();
    }

    /// Register a picker. Idempotent: a second registration under the same
    /// id is a no-op and returns `None`, so a subscriber can never receive
    /// duplicate notifications. The returned feed is pre-loaded with every
    /// currently open order.
    pub fn register_picker(&self, subscriber_id: &str) -> Option<OrderFeed> {
        self.register(subscriber_id, Role::Picker, None)
    }

    /// Register a tracker, optionally filtered to a single customer's
    /// orders. Same idempotence and backfill rules as pickers.
    pub fn register_tracker(
        &self,
        subscriber_id: &str,
        customer_filter: Option<String>,
    ) -> Option<OrderFeed> {
        self.register(subscriber_id, Role::Tracker, customer_filter)
    }

    fn register(&self, subscriber_id: &str, role: Role, filter: Option<String>) -> Option<OrderFeed> {
        let mut subs = self.subscribers.lock().expect("subscriber table poisoned");
        if subs
            .iter()
            .any(|s| s.subscriber_id == subscriber_id && s.role == role)
        {
            debug!(subscriber_id, ?role, "already registered, ignoring");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Subscription {
            subscriber_id: subscriber_id.to_string(),
            role,
            filter,
            sender: tx,
        };

        // Backfill open orders while holding the table lock: no commit can
        // interleave, so the feed starts complete and stays gap-free.
        for order in self.registry.open_orders() {
            if subscription.wants(&order) {
                let _ = subscription.sender.send(OrderEvent {
                    order_id: order.id,
                    state: order.state,
                    order,
                });
            }
        }

        info!(subscriber_id, ?role, "subscriber registered");
        subs.push(subscription);
        Some(OrderFeed { rx })
    }

    /// Remove a subscriber from every role it holds. Idempotent.
    pub fn unregister(&self, subscriber_id: &str) {
        let mut subs = self.subscribers.lock().expect("subscriber table poisoned");
        subs.retain(|s| s.subscriber_id != subscriber_id);
    }

    /// Accept a new order: store it, make it visible to pickers, and fan the
    /// event out to every picker and every interested tracker.
    pub fn submit_order(
        &self,
        customer_id: &str,
        items: Vec<LineItem>,
    ) -> Result<OrderId, HubError> {
        let order = self.registry.create(customer_id, items);
        let lock = self.order_lock(order.id);
        let _guard = lock.lock().expect("order lock poisoned");

        let mut subs = self.subscribers.lock().expect("subscriber table poisoned");
        let visible = self.registry.transition(
            order.id,
            OrderState::New,
            OrderState::VisibleToPickers,
            customer_id,
        )?;
        info!(order_id = %visible.id, customer_id, items = visible.items.len(), "order submitted");
        Self::fan_out(&mut subs, visible);
        Ok(order.id)
    }

    /// One picker takes exclusive ownership of an open order.
    ///
    /// Exactly one of any set of concurrent claims wins; the others get
    /// `StaleState`, which is the expected "too late" outcome and is not
    /// treated as an error by the hub.
    pub fn claim_order(&self, order_id: OrderId, picker_id: &str) -> Result<Order, HubError> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().expect("order lock poisoned");

        let mut subs = self.subscribers.lock().expect("subscriber table poisoned");
        match self.registry.transition(
            order_id,
            OrderState::VisibleToPickers,
            OrderState::Claimed,
            picker_id,
        ) {
            Ok(claimed) => {
                info!(order_id = %order_id, picker_id, "order claimed");
                Self::fan_out(&mut subs, claimed.clone());
                Ok(claimed)
            }
            Err(err) if err.is_lost_race() => {
                debug!(order_id = %order_id, picker_id, "claim lost the race");
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Move a claimed order one step forward (`PICKED` → `READY` →
    /// `COMPLETED`). Only the picker holding the claim may advance it, and
    /// only to the unique successor of the current state.
    pub fn advance(
        &self,
        order_id: OrderId,
        picker_id: &str,
        target: OrderState,
    ) -> Result<Order, HubError> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().expect("order lock poisoned");

        let order = self.registry.get(order_id)?;
        match order.claimed_by.as_deref() {
            None => {
                return Err(HubError::Rejected(format!(
                    "order {order_id} has not been claimed"
                )))
            }
            Some(holder) if holder != picker_id => {
                return Err(HubError::Rejected(format!(
                    "order {order_id} is claimed by {holder}, not {picker_id}"
                )))
            }
            Some(_) => {}
        }
        if order.state.successor() != Some(target) {
            return Err(HubError::Rejected(format!(
                "cannot advance {} from {} to {target}",
                order_id, order.state
            )));
        }

        let mut subs = self.subscribers.lock().expect("subscriber table poisoned");
        let advanced = self
            .registry
            .transition(order_id, order.state, target, picker_id)?;
        info!(order_id = %order_id, picker_id, state = %target, "order advanced");
        Self::fan_out(&mut subs, advanced.clone());
        Ok(advanced)
    }

    /// Cancel an order from any non-terminal state.
    pub fn cancel(&self, order_id: OrderId, actor: &str) -> Result<Order, HubError> {
        let lock = self.order_lock(order_id);
        let _guard = lock.lock().expect("order lock poisoned");

        let order = self.registry.get(order_id)?;
        if order.state.is_terminal() {
            return Err(HubError::Rejected(format!(
                "order {order_id} is already {}",
                order.state
            )));
        }

        let mut subs = self.subscribers.lock().expect("subscriber table poisoned");
        let cancelled =
            self.registry
                .transition(order_id, order.state, OrderState::Cancelled, actor)?;
        info!(order_id = %order_id, actor, "order cancelled");
        Self::fan_out(&mut subs, cancelled.clone());
        Ok(cancelled)
    }

    /// Read-only snapshot of an order.
    pub fn order(&self, order_id: OrderId) -> Result<Order, HubError> {
        self.registry.get(order_id)
    }

    /// Orders currently open for claiming.
    pub fn open_orders(&self) -> Vec<Order> {
        self.registry.open_orders()
    }

    fn order_lock(&self, order_id: OrderId) -> Arc<Mutex<()>> {
        let mut locks = self.order_locks.lock().expect("order lock table poisoned");
        Arc::clone(locks.entry(order_id).or_default())
    }

    fn fan_out(subs: &mut Vec<Subscription>, order: Order) {
        let event = OrderEvent {
            order_id: order.id,
            state: order.state,
            order,
        };
        // Dead subscribers (dropped feeds) are pruned as we go.
        subs.retain(|sub| !sub.wants(&event.order) || sub.sender.send(event.clone()).is_ok());
    }
}

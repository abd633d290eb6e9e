use std::sync::Arc;

use bramble_catalog::{ReservationMode, Shortage, StockLedger};
use bramble_order::{FulfillmentHub, HubError, Order};
use bramble_shared::OrderId;
use tracing::{info, warn};

use crate::payment::{PaymentGateway, PaymentMethod, PaymentOutcome};
use crate::trolley::{format_price, Trolley};

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Trolley is empty")]
    EmptyTrolley,

    /// The gateway itself failed (transport, provider outage). A clean
    /// decline is not an error; it comes back as an outcome.
    #[error("Payment gateway failure: {0}")]
    Payment(String),

    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Shortages split the way the remediation dialog presents them: lines with
/// nothing on hand can only be removed, lines with some stock can be reduced.
#[derive(Debug, Clone)]
pub struct ShortageReport {
    pub to_remove: Vec<Shortage>,
    pub to_reduce: Vec<Shortage>,
}

impl ShortageReport {
    pub fn classify(shortages: Vec<Shortage>) -> Self {
        let (to_remove, to_reduce): (Vec<Shortage>, Vec<Shortage>) = shortages
            .into_iter()
            .partition(|s| s.is_unfulfillable());
        Self {
            to_remove,
            to_reduce,
        }
    }

    pub fn summary(&self) -> String {
        let mut out = String::from("STOCK SHORTAGE DETECTED\n\n");
        for shortage in self.to_remove.iter().chain(self.to_reduce.iter()) {
            out.push_str(&format!(
                "{} - {}\n  Available: {}, Requested: {}\n",
                shortage.line.product_id,
                shortage.line.description,
                shortage.available,
                shortage.requested()
            ));
        }
        out
    }
}

/// What the external remediation step decided to do with a shortage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationDecision {
    /// Reduce reducible lines to their available quantity and drop the rest.
    AdjustQuantities,
    /// Drop only the lines with nothing on hand.
    RemoveUnavailable,
    /// Leave the trolley untouched for the customer to review.
    Abort,
}

/// The customer's read-only record of a confirmed purchase.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub order: Order,
    pub payment: PaymentOutcome,
    pub total: i64,
}

impl Receipt {
    pub fn formatted(&self) -> String {
        let mut out = String::from("ORDER CONFIRMED\n");
        if let Some(txn) = &self.payment.transaction_id {
            out.push_str(&format!("Transaction ID: {txn}\n"));
        }
        out.push_str(&format!("Payment Method: {}\n", self.payment.method));
        out.push_str(&format!("Order ID: {}\n", self.order.id));
        out.push_str(&format!(
            "Ordered Date/Time: {}\n",
            self.order.created_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("Total Paid: {}\n\n", format_price(self.total)));
        out.push_str("Items Purchased:\n");
        for line in &self.order.items {
            out.push_str(&format!(
                "{} - {} x{} @ {}\n",
                line.product_id,
                line.description,
                line.quantity,
                format_price(line.unit_price)
            ));
        }
        out
    }
}

/// How one checkout attempt ended. All three arms are ordinary results the
/// caller presents to the customer; none of them is an error.
#[derive(Debug)]
pub enum CheckoutOutcome {
    Confirmed(Receipt),
    /// The order stands in the registry and stock stays reserved — the
    /// documented behavior of the system this replaces. No compensating
    /// release or cancel happens here.
    PaymentDeclined {
        order_id: OrderId,
        outcome: PaymentOutcome,
    },
    /// Reservation refused (or, in legacy mode, partially applied). The
    /// caller runs remediation and may try again.
    ShortStock(ShortageReport),
}

/// Orchestrates trolley → stock reservation → order submission → payment.
pub struct CheckoutWorkflow {
    ledger: Arc<StockLedger>,
    hub: Arc<FulfillmentHub>,
    gateway: Arc<dyn PaymentGateway>,
    mode: ReservationMode,
}

impl CheckoutWorkflow {
    pub fn new(
        ledger: Arc<StockLedger>,
        hub: Arc<FulfillmentHub>,
        gateway: Arc<dyn PaymentGateway>,
        mode: ReservationMode,
    ) -> Self {
        Self {
            ledger,
            hub,
            gateway,
            mode,
        }
    }

    /// Run one checkout attempt for the given trolley.
    ///
    /// On a confirmed payment the trolley is cleared. On a decline or a
    /// shortage the trolley is left exactly as it was, for the customer (or
    /// the remediation step) to act on.
    pub async fn checkout(
        &self,
        trolley: &mut Trolley,
        customer_id: &str,
        method: PaymentMethod,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        if trolley.is_empty() {
            return Err(CheckoutError::EmptyTrolley);
        }

        let items = trolley.line_items();
        let shortages = self.ledger.purchase_stocks(&items, self.mode);
        if !shortages.is_empty() {
            info!(customer_id, count = shortages.len(), "checkout hit stock shortages");
            return Ok(CheckoutOutcome::ShortStock(ShortageReport::classify(
                shortages,
            )));
        }

        let total = trolley.total_price();
        let order_id = self.hub.submit_order(customer_id, items)?;

        let outcome = self
            .gateway
            .charge(order_id, total, method)
            .await
            .map_err(|e| CheckoutError::Payment(e.to_string()))?;

        if !outcome.success {
            // Known limitation carried over from the source system: the
            // reservation and the order both stand after a decline.
            warn!(
                order_id = %order_id,
                customer_id,
                "payment declined; order and stock reservation left standing"
            );
            return Ok(CheckoutOutcome::PaymentDeclined { order_id, outcome });
        }

        trolley.clear();
        let order = self.hub.order(order_id)?;
        info!(order_id = %order_id, customer_id, total, "checkout confirmed");
        Ok(CheckoutOutcome::Confirmed(Receipt {
            order,
            payment: outcome,
            total,
        }))
    }

    /// Apply the external remediation step's decision to the trolley and
    /// return the refreshed summary. Checkout is never retried from here.
    pub fn apply_remediation(
        &self,
        trolley: &mut Trolley,
        report: &ShortageReport,
        decision: RemediationDecision,
    ) -> String {
        match decision {
            RemediationDecision::AdjustQuantities => {
                for shortage in &report.to_reduce {
                    trolley.set_quantity(&shortage.line.product_id, shortage.available);
                }
                for shortage in &report.to_remove {
                    trolley.remove(&shortage.line.product_id);
                }
            }
            RemediationDecision::RemoveUnavailable => {
                for shortage in &report.to_remove {
                    trolley.remove(&shortage.line.product_id);
                }
            }
            RemediationDecision::Abort => {}
        }
        trolley.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_catalog::Product;
    use bramble_order::OrderState;

    fn seeded_ledger() -> Arc<StockLedger> {
        let ledger = StockLedger::new();
        ledger
            .load(vec![
                Product::new("0001", "Electric Kettle", "kettle.jpg", 2500, 5),
                Product::new("0002", "Toaster", "toaster.jpg", 1999, 0),
            ])
            .unwrap();
        Arc::new(ledger)
    }

    fn workflow(ledger: &Arc<StockLedger>, decline_rate: f64) -> (CheckoutWorkflow, Arc<FulfillmentHub>) {
        let hub = Arc::new(FulfillmentHub::new());
        hub.initialize_order_map();
        let workflow = CheckoutWorkflow::new(
            Arc::clone(ledger),
            Arc::clone(&hub),
            Arc::new(crate::payment::MockPaymentGateway::new(decline_rate)),
            ReservationMode::Atomic,
        );
        (workflow, hub)
    }

    #[tokio::test]
    async fn test_successful_checkout_confirms_and_clears_trolley() {
        let ledger = seeded_ledger();
        let (workflow, hub) = workflow(&ledger, 0.0);

        let mut trolley = Trolley::new();
        trolley.add(&ledger.get("0001").unwrap(), 3);

        let outcome = workflow
            .checkout(&mut trolley, "cust-1", PaymentMethod::CreditCard)
            .await
            .unwrap();

        let receipt = match outcome {
            CheckoutOutcome::Confirmed(receipt) => receipt,
            other => panic!("expected confirmation, got {other:?}"),
        };
        assert_eq!(receipt.total, 7500);
        assert_eq!(receipt.order.state, OrderState::VisibleToPickers);
        assert!(trolley.is_empty());
        assert_eq!(ledger.get("0001").unwrap().stock_quantity, 2);
        assert_eq!(hub.open_orders().len(), 1);
        assert!(receipt.formatted().contains("ORDER CONFIRMED"));
    }

    #[tokio::test]
    async fn test_declined_payment_leaves_order_and_stock() {
        let ledger = seeded_ledger();
        let (workflow, hub) = workflow(&ledger, 1.0);

        let mut trolley = Trolley::new();
        trolley.add(&ledger.get("0001").unwrap(), 2);

        let outcome = workflow
            .checkout(&mut trolley, "cust-1", PaymentMethod::DebitCard)
            .await
            .unwrap();

        let order_id = match outcome {
            CheckoutOutcome::PaymentDeclined { order_id, outcome } => {
                assert!(!outcome.success);
                order_id
            }
            other => panic!("expected decline, got {other:?}"),
        };

        // The documented gap: reservation and order both stand.
        assert_eq!(ledger.get("0001").unwrap().stock_quantity, 3);
        assert_eq!(hub.order(order_id).unwrap().state, OrderState::VisibleToPickers);
        assert!(!trolley.is_empty());
    }

    #[tokio::test]
    async fn test_shortage_is_classified_for_remediation() {
        let ledger = seeded_ledger();
        let (workflow, _hub) = workflow(&ledger, 0.0);

        let mut trolley = Trolley::new();
        trolley.add(&ledger.get("0001").unwrap(), 9); // only 5 on hand
        trolley.add(&ledger.get("0002").unwrap(), 1); // none on hand

        let outcome = workflow
            .checkout(&mut trolley, "cust-1", PaymentMethod::CreditCard)
            .await
            .unwrap();

        let report = match outcome {
            CheckoutOutcome::ShortStock(report) => report,
            other => panic!("expected shortage, got {other:?}"),
        };
        assert_eq!(report.to_reduce.len(), 1);
        assert_eq!(report.to_reduce[0].available, 5);
        assert_eq!(report.to_remove.len(), 1);
        assert!(report.summary().contains("0002"));

        // Atomic mode: nothing was decremented.
        assert_eq!(ledger.get("0001").unwrap().stock_quantity, 5);
    }

    #[tokio::test]
    async fn test_remediation_adjusts_trolley_without_retrying() {
        let ledger = seeded_ledger();
        let (workflow, hub) = workflow(&ledger, 0.0);

        let mut trolley = Trolley::new();
        trolley.add(&ledger.get("0001").unwrap(), 9);
        trolley.add(&ledger.get("0002").unwrap(), 1);

        let outcome = workflow
            .checkout(&mut trolley, "cust-1", PaymentMethod::CreditCard)
            .await
            .unwrap();
        let report = match outcome {
            CheckoutOutcome::ShortStock(report) => report,
            other => panic!("expected shortage, got {other:?}"),
        };

        let summary =
            workflow.apply_remediation(&mut trolley, &report, RemediationDecision::AdjustQuantities);
        assert!(summary.contains("TOTAL ITEMS: 5"));
        assert_eq!(trolley.line_items().len(), 1);

        // No automatic retry happened.
        assert!(hub.open_orders().is_empty());
    }

    #[tokio::test]
    async fn test_abort_leaves_trolley_untouched() {
        let ledger = seeded_ledger();
        let (workflow, _hub) = workflow(&ledger, 0.0);

        let mut trolley = Trolley::new();
        trolley.add(&ledger.get("0001").unwrap(), 9);
        let before = trolley.line_items();

        let report = ShortageReport::classify(vec![]);
        workflow.apply_remediation(&mut trolley, &report, RemediationDecision::Abort);
        assert_eq!(trolley.line_items(), before);
    }

    #[tokio::test]
    async fn test_empty_trolley_is_an_error() {
        let ledger = seeded_ledger();
        let (workflow, _hub) = workflow(&ledger, 0.0);

        let mut trolley = Trolley::new();
        let err = workflow
            .checkout(&mut trolley, "cust-1", PaymentMethod::CreditCard)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyTrolley));
    }

    #[tokio::test]
    async fn test_submitted_order_ignores_later_trolley_edits() {
        let ledger = seeded_ledger();
        let (workflow, hub) = workflow(&ledger, 1.0);

        let mut trolley = Trolley::new();
        trolley.add(&ledger.get("0001").unwrap(), 2);

        let outcome = workflow
            .checkout(&mut trolley, "cust-1", PaymentMethod::CreditCard)
            .await
            .unwrap();
        let order_id = match outcome {
            CheckoutOutcome::PaymentDeclined { order_id, .. } => order_id,
            other => panic!("expected decline, got {other:?}"),
        };

        // The trolley survives the decline; editing it must not touch the
        // stored order's snapshot.
        trolley.set_quantity("0001", 99);
        let stored = hub.order(order_id).unwrap();
        assert_eq!(stored.items[0].quantity, 2);
    }
}

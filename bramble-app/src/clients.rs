//! Headless stand-ins for the four client roles. Each one holds only its
//! own feed and an `Arc` of the hub or ledger it talks to — never a
//! reference to another client.

use std::sync::Arc;

use bramble_catalog::StockLedger;
use bramble_checkout::{
    CheckoutOutcome, CheckoutWorkflow, PaymentMethod, RemediationDecision, Trolley,
};
use bramble_order::{FulfillmentHub, OrderFeed, OrderState};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Picker loop: watch the feed, try to claim anything that becomes visible,
/// and walk won orders through to completion.
pub async fn run_picker(hub: Arc<FulfillmentHub>, picker_id: String, mut feed: OrderFeed) {
    while let Some(event) = feed.recv().await {
        if event.state != OrderState::VisibleToPickers {
            continue;
        }

        match hub.claim_order(event.order_id, &picker_id) {
            Ok(order) => {
                info!(picker = %picker_id, order_id = %order.id, "claim won, picking");
                for target in [OrderState::Picked, OrderState::Ready, OrderState::Completed] {
                    sleep(Duration::from_millis(20)).await;
                    if let Err(err) = hub.advance(order.id, &picker_id, target) {
                        warn!(picker = %picker_id, order_id = %order.id, %err, "advance failed");
                        break;
                    }
                }
            }
            Err(err) if err.is_lost_race() => {
                debug!(picker = %picker_id, order_id = %event.order_id, "another picker was faster");
            }
            Err(err) => {
                warn!(picker = %picker_id, order_id = %event.order_id, %err, "claim failed");
            }
        }
    }
}

/// Tracker loop: a pure status display over the feed.
pub async fn run_tracker(tracker_id: String, mut feed: OrderFeed) {
    while let Some(event) = feed.recv().await {
        info!(
            tracker = %tracker_id,
            order_id = %event.order_id,
            state = %event.state,
            customer = %event.order.customer_id,
            "order update"
        );
    }
}

/// One warehouse monitoring pass: top up everything at or below the
/// threshold.
pub fn run_warehouse_pass(ledger: &StockLedger, threshold: u32, amount: u32) {
    for product in ledger.low_stock(threshold) {
        match ledger.restock(&product.id, amount) {
            Ok(level) => info!(product_id = %product.id, level, "warehouse topped up"),
            Err(err) => warn!(product_id = %product.id, %err, "restock failed"),
        }
    }
}

/// Scripted customer: fill a trolley, check out once, and apply the default
/// remediation if stock came up short. Mirrors the one-shot flow of the
/// desktop customer client.
pub async fn run_customer(
    workflow: &CheckoutWorkflow,
    ledger: &StockLedger,
    customer_id: &str,
    wanted: &[(&str, u32)],
) -> anyhow::Result<()> {
    let mut trolley = Trolley::new();
    for (product_id, quantity) in wanted {
        match ledger.get(product_id) {
            Some(product) => trolley.add(&product, *quantity),
            None => warn!(customer = customer_id, product_id, "product not in catalog"),
        }
    }
    info!(customer = customer_id, "\n{}", trolley.summary());

    match workflow
        .checkout(&mut trolley, customer_id, PaymentMethod::CreditCard)
        .await?
    {
        CheckoutOutcome::Confirmed(receipt) => {
            info!(customer = customer_id, "\n{}", receipt.formatted());
        }
        CheckoutOutcome::PaymentDeclined { order_id, outcome } => {
            warn!(customer = customer_id, order_id = %order_id, message = %outcome.message, "payment declined");
        }
        CheckoutOutcome::ShortStock(report) => {
            info!(customer = customer_id, "\n{}", report.summary());
            let summary = workflow.apply_remediation(
                &mut trolley,
                &report,
                RemediationDecision::AdjustQuantities,
            );
            info!(customer = customer_id, "trolley after adjustment:\n{summary}");
        }
    }
    Ok(())
}

//! End-to-end flow across the ledger, hub, and checkout workflow: a
//! customer checks out, pickers race for the order, the winner walks it to
//! completion, and trackers observe every step in commit order.

use std::sync::Arc;

use bramble_catalog::{Product, ReservationMode, StockLedger};
use bramble_checkout::{
    CheckoutOutcome, CheckoutWorkflow, MockPaymentGateway, PaymentMethod, Trolley,
};
use bramble_order::{FulfillmentHub, HubError, OrderState};

fn seeded_ledger() -> Arc<StockLedger> {
    let ledger = StockLedger::new();
    ledger
        .load(vec![
            Product::new("0001", "40 inch TV", "tv.jpg", 26999, 10),
            Product::new("0002", "DAB Radio", "radio.jpg", 2999, 2),
        ])
        .unwrap();
    Arc::new(ledger)
}

fn engine(ledger: &Arc<StockLedger>) -> (CheckoutWorkflow, Arc<FulfillmentHub>) {
    let hub = Arc::new(FulfillmentHub::new());
    hub.initialize_order_map();
    let workflow = CheckoutWorkflow::new(
        Arc::clone(ledger),
        Arc::clone(&hub),
        Arc::new(MockPaymentGateway::new(0.0)),
        ReservationMode::Atomic,
    );
    (workflow, hub)
}

#[tokio::test(flavor = "multi_thread")]
async fn full_order_lifecycle_with_racing_pickers() {
    let ledger = seeded_ledger();
    let (workflow, hub) = engine(&ledger);

    let mut tracker = hub.register_tracker("tracker-1", None).unwrap();

    let mut trolley = Trolley::new();
    trolley.add(&ledger.get("0001").unwrap(), 1);
    let outcome = workflow
        .checkout(&mut trolley, "cust-001", PaymentMethod::CreditCard)
        .await
        .unwrap();
    let order_id = match outcome {
        CheckoutOutcome::Confirmed(receipt) => receipt.order.id,
        other => panic!("expected confirmation, got {other:?}"),
    };
    assert_eq!(ledger.get("0001").unwrap().stock_quantity, 9);

    // Two pickers race for the claim; exactly one may win.
    let handles: Vec<_> = ["picker-a", "picker-b"]
        .into_iter()
        .map(|picker| {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || hub.claim_order(order_id, picker))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winner = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|order| order.claimed_by.clone().unwrap())
        .next()
        .expect("one claim must win");
    assert_eq!(
        results.iter().filter(|r| r.is_ok()).count(),
        1,
        "exactly one claim wins"
    );
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(HubError::StaleState { .. }))));

    // Only the winning picker may move the order forward.
    let loser = if winner == "picker-a" { "picker-b" } else { "picker-a" };
    let err = hub.advance(order_id, loser, OrderState::Picked).unwrap_err();
    assert!(matches!(err, HubError::Rejected(_)));

    hub.advance(order_id, &winner, OrderState::Picked).unwrap();
    hub.advance(order_id, &winner, OrderState::Ready).unwrap();
    hub.advance(order_id, &winner, OrderState::Completed).unwrap();

    // The tracker saw every committed transition, in commit order.
    let mut states = Vec::new();
    while let Some(event) = tracker.try_recv() {
        assert_eq!(event.order_id, order_id);
        states.push(event.state);
    }
    assert_eq!(
        states,
        vec![
            OrderState::VisibleToPickers,
            OrderState::Claimed,
            OrderState::Picked,
            OrderState::Ready,
            OrderState::Completed
        ]
    );

    // History mirrors the same single-winner story.
    let order = hub.order(order_id).unwrap();
    let history: Vec<_> = order.history.iter().map(|h| h.state).collect();
    assert_eq!(
        history,
        vec![
            OrderState::New,
            OrderState::VisibleToPickers,
            OrderState::Claimed,
            OrderState::Picked,
            OrderState::Ready,
            OrderState::Completed
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_checkouts_cannot_over_reserve() {
    let ledger = seeded_ledger();
    let (workflow, _hub) = engine(&ledger);
    let workflow = Arc::new(workflow);

    // Two customers each want 2 of a stock of 2.
    let mut handles = Vec::new();
    for customer in ["cust-001", "cust-002"] {
        let workflow = Arc::clone(&workflow);
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            let mut trolley = Trolley::new();
            trolley.add(&ledger.get("0002").unwrap(), 2);
            workflow
                .checkout(&mut trolley, customer, PaymentMethod::CreditCard)
                .await
                .unwrap()
        }));
    }

    let mut confirmed = 0;
    let mut short = 0;
    for handle in handles {
        match handle.await.unwrap() {
            CheckoutOutcome::Confirmed(_) => confirmed += 1,
            CheckoutOutcome::ShortStock(report) => {
                assert_eq!(report.to_remove.len(), 1);
                assert_eq!(report.to_remove[0].available, 0);
                short += 1;
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!((confirmed, short), (1, 1));
    assert_eq!(ledger.get("0002").unwrap().stock_quantity, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn late_picker_is_backfilled_with_open_orders() {
    let ledger = seeded_ledger();
    let (workflow, hub) = engine(&ledger);

    let mut trolley = Trolley::new();
    trolley.add(&ledger.get("0001").unwrap(), 1);
    workflow
        .checkout(&mut trolley, "cust-001", PaymentMethod::CreditCard)
        .await
        .unwrap();

    let mut feed = hub.register_picker("late-picker").unwrap();
    let event = feed.try_recv().expect("backfill delivers the open order");
    assert_eq!(event.state, OrderState::VisibleToPickers);
    assert_eq!(event.order.customer_id, "cust-001");
}

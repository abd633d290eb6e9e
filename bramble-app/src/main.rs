use std::sync::Arc;

use bramble_app::{clients, AppConfig};
use bramble_catalog::StockLedger;
use bramble_checkout::{CheckoutWorkflow, MockPaymentGateway};
use bramble_order::FulfillmentHub;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bramble_app=info,bramble_order=info,bramble_catalog=info,bramble_checkout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        products = config.catalog.len(),
        pickers = config.simulation.pickers,
        "starting bramble retail engine"
    );

    let ledger = Arc::new(StockLedger::new());
    ledger.load(config.catalog.clone())?;

    // One hub per process, wired in explicitly everywhere it is needed.
    let hub = Arc::new(FulfillmentHub::new());
    hub.initialize_order_map();

    let gateway = Arc::new(MockPaymentGateway::new(config.payment.decline_rate));
    let workflow = CheckoutWorkflow::new(
        Arc::clone(&ledger),
        Arc::clone(&hub),
        gateway,
        config.reservation.mode,
    );

    let mut tasks = Vec::new();
    for n in 0..config.simulation.pickers {
        let picker_id = format!("picker-{n}");
        let feed = hub
            .register_picker(&picker_id)
            .expect("picker ids are unique at startup");
        tasks.push(tokio::spawn(clients::run_picker(
            Arc::clone(&hub),
            picker_id,
            feed,
        )));
    }

    let tracker_feed = hub
        .register_tracker("tracker-main", None)
        .expect("tracker registered once");
    tasks.push(tokio::spawn(clients::run_tracker(
        "tracker-main".to_string(),
        tracker_feed,
    )));

    let customer_feed = hub
        .register_tracker(
            &format!("tracker-{}", config.simulation.customer_id),
            Some(config.simulation.customer_id.clone()),
        )
        .expect("customer tracker registered once");
    tasks.push(tokio::spawn(clients::run_tracker(
        format!("tracker-{}", config.simulation.customer_id),
        customer_feed,
    )));

    // A first checkout, then a deliberately oversized one to exercise the
    // shortage remediation branch.
    let customer_id = config.simulation.customer_id.clone();
    let first: Vec<(&str, u32)> = config
        .catalog
        .first()
        .map(|p| (p.id.as_str(), 2))
        .into_iter()
        .collect();
    clients::run_customer(&workflow, &ledger, &customer_id, &first).await?;

    let oversized: Vec<(&str, u32)> = config
        .catalog
        .first()
        .map(|p| (p.id.as_str(), p.stock_quantity + 100))
        .into_iter()
        .collect();
    clients::run_customer(&workflow, &ledger, &customer_id, &oversized).await?;

    // Give the pickers a moment to finish, then run the warehouse pass.
    tokio::time::sleep(tokio::time::Duration::from_millis(250)).await;
    clients::run_warehouse_pass(
        &ledger,
        config.simulation.restock_threshold,
        config.simulation.restock_amount,
    );

    // Dropping the hub's subscriber table would end the loops; here we just
    // detach so the process exits once the simulation is done.
    for task in tasks {
        task.abort();
    }
    tracing::info!("simulation complete");
    Ok(())
}

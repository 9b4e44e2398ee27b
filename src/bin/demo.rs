//! End-to-end walkthrough of the order → claim → confirm lifecycle

use canteen_ledger::{ClientId, Config, Menu, Reconciler, SingleManager, TracingSink};
use rust_decimal::Decimal;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting canteen ledger demo");

    let config = Config::from_env()?;
    let manager = ClientId::new(
        std::env::var("CANTEEN_MANAGER_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1),
    );

    let reconciler = Reconciler::open(
        config,
        Menu::builtin(),
        Arc::new(TracingSink),
        Arc::new(SingleManager::new(manager)),
    )?;

    let alice = ClientId::new(1001);

    // Client orders two coffees at 2.50 each
    let order = reconciler
        .place_order(alice, "@alice", "coffee", 2)
        .await?;
    tracing::info!(total = %order.line_total(), "Order placed");

    let balance = reconciler.balance(alice).await?;
    tracing::info!(%balance, "Balance after order");

    // Client reports the payment; it sits in the pending queue
    reconciler
        .report_payment(alice, "@alice", Decimal::new(500, 2))
        .await?;
    let pending = reconciler.list_pending(manager, None).await?;
    tracing::info!(pending = pending.len(), "Claims awaiting confirmation");

    // Manager confirms the first claim in the queue
    let payment = reconciler.confirm_payment(manager, 1).await?;
    tracing::info!(amount = %payment.amount, "Payment confirmed");

    let balance = reconciler.balance(alice).await?;
    tracing::info!(%balance, "Balance after confirmation");

    let summary = reconciler.fleet_summary(manager).await?;
    tracing::info!(
        total_ordered = %summary.total_ordered,
        total_paid = %summary.total_paid,
        total_pending = %summary.total_pending,
        "Fleet summary"
    );

    reconciler.shutdown().await?;
    tracing::info!("Demo complete");
    Ok(())
}

//! Reconciliation engine
//!
//! The only writer path that turns client actions into ledger state, and the
//! only path that resolves a pending claim into a permanent payment record.
//!
//! # Example
//!
//! ```no_run
//! use canteen_ledger::{ClientId, Config, Menu, Reconciler, SingleManager, TracingSink};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> canteen_ledger::Result<()> {
//!     let reconciler = Reconciler::open(
//!         Config::default(),
//!         Menu::builtin(),
//!         Arc::new(TracingSink),
//!         Arc::new(SingleManager::new(ClientId::new(1))),
//!     )?;
//!
//!     let order = reconciler
//!         .place_order(ClientId::new(42), "@alice", "coffee", 2)
//!         .await?;
//!     assert_eq!(order.quantity, 2);
//!
//!     reconciler.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    config::RetryConfig,
    menu::Menu,
    metrics::Metrics,
    notify::NotificationSink,
    types::{
        BalanceStatus, ClientBalance, ClientId, ClientSummary, FleetSummary, OrderEntry,
        PaymentEntry, PendingPayment,
    },
    Config, Error, Result, Storage,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use uuid::Uuid;

/// Manager-gating predicate plus the manager's notification address
///
/// The engine does not authenticate; the transport supplies identities and
/// this policy decides which of them may confirm payments and view
/// fleet-wide reports.
pub trait AccessPolicy: Send + Sync {
    /// Whether `id` may perform manager-only operations
    fn is_manager(&self, id: ClientId) -> bool;

    /// Notification target for new orders and claims, if any
    fn manager(&self) -> Option<ClientId>;
}

/// The common case: one privileged manager account
#[derive(Debug, Clone, Copy)]
pub struct SingleManager {
    id: ClientId,
}

impl SingleManager {
    /// Create a policy for one manager account
    pub fn new(id: ClientId) -> Self {
        Self { id }
    }
}

impl AccessPolicy for SingleManager {
    fn is_manager(&self, id: ClientId) -> bool {
        id == self.id
    }

    fn manager(&self) -> Option<ClientId> {
        Some(self.id)
    }
}

/// Reconciliation engine
///
/// Explicitly constructed with its collaborators; no global state. Open at
/// process start, [`shutdown`](Reconciler::shutdown) at process end.
pub struct Reconciler {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Immutable item catalog
    menu: Arc<Menu>,

    /// Best-effort notification delivery
    sink: Arc<dyn NotificationSink>,

    /// Manager gate
    policy: Arc<dyn AccessPolicy>,

    /// Retry policy
    retry: RetryConfig,

    /// Prometheus metrics
    metrics: Metrics,
}

impl Reconciler {
    /// Open storage, spawn the writer actor, and assemble the engine
    pub fn open(
        config: Config,
        menu: Menu,
        sink: Arc<dyn NotificationSink>,
        policy: Arc<dyn AccessPolicy>,
    ) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let handle = spawn_ledger_actor(storage.clone());

        Ok(Self {
            handle,
            storage,
            menu: Arc::new(menu),
            sink,
            policy,
            retry: config.retry,
            metrics: Metrics::default(),
        })
    }

    /// Prometheus metrics for this engine
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// The menu this engine resolves orders against
    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    // Client operations

    /// Place an order
    ///
    /// Validates quantity and item code before any write occurs, so an
    /// invalid command never pollutes the ledger. On success the manager is
    /// notified best-effort.
    pub async fn place_order(
        &self,
        client_id: ClientId,
        display_name: &str,
        item_code: &str,
        quantity: i64,
    ) -> Result<OrderEntry> {
        if quantity <= 0 {
            return Err(Error::InvalidQuantity(quantity));
        }
        let quantity = u32::try_from(quantity).map_err(|_| Error::InvalidQuantity(quantity))?;

        let item = self
            .menu
            .resolve(item_code)
            .ok_or_else(|| Error::InvalidItem(item_code.to_string()))?;

        let entry = OrderEntry {
            order_id: Uuid::now_v7(),
            client_id,
            item_code: item_code.to_lowercase(),
            item_name: item.name.clone(),
            quantity,
            unit_price: item.unit_price,
            created_at: Utc::now(),
        };

        self.handle
            .append_order(entry.clone(), display_name.to_string())
            .await?;
        self.metrics.record_order();

        tracing::info!(
            client_id = %client_id,
            item = %entry.item_code,
            quantity,
            total = %entry.line_total(),
            "Order placed"
        );

        self.notify_manager(&format!(
            "New order from {}: {} x {} (total {})",
            display_name,
            quantity,
            entry.item_name,
            entry.line_total()
        ));

        Ok(entry)
    }

    /// Report a payment, entering it into the pending queue
    ///
    /// The claim stays informational until the manager confirms it; balances
    /// derive from the ledger only.
    pub async fn report_payment(
        &self,
        client_id: ClientId,
        display_name: &str,
        amount: Decimal,
    ) -> Result<PendingPayment> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let claim = PendingPayment {
            id: Uuid::now_v7(),
            client_id,
            display_name: display_name.to_string(),
            amount,
            claimed_at: Utc::now(),
        };

        self.handle.enqueue_claim(claim.clone()).await?;
        self.metrics.record_claim();

        tracing::info!(
            client_id = %client_id,
            amount = %amount,
            claim_id = %claim.id,
            "Payment claim enqueued"
        );

        self.notify_manager(&format!(
            "Payment reported by {}: {} (awaiting confirmation)",
            display_name, amount
        ));

        Ok(claim)
    }

    /// Current balance for a client: `sum(orders) - sum(confirmed payments)`
    ///
    /// Always derived fresh from the ledger; the pending queue plays no part.
    pub async fn balance(&self, client_id: ClientId) -> Result<Decimal> {
        let start = Instant::now();
        let balance = self
            .with_read_retry(|storage| {
                Ok(storage.sum_orders(client_id)? - storage.sum_payments(client_id)?)
            })
            .await?;
        self.metrics
            .record_balance_query(start.elapsed().as_secs_f64());
        Ok(balance)
    }

    /// Per-client history summary: recent orders, recent payments, balance
    pub async fn client_summary(&self, client_id: ClientId) -> Result<ClientSummary> {
        self.with_read_retry(|storage| {
            let client = storage
                .get_client(client_id)?
                .ok_or(Error::UnknownClient(client_id))?;

            let recent_orders = storage.list_orders(client_id, Some(10))?;
            let recent_payments = storage.list_payments(client_id, Some(10))?;
            let total_ordered = storage.sum_orders(client_id)?;
            let total_paid = storage.sum_payments(client_id)?;
            let balance = total_ordered - total_paid;

            Ok(ClientSummary {
                client,
                recent_orders,
                recent_payments,
                total_ordered,
                total_paid,
                balance,
                status: BalanceStatus::from_balance(balance),
            })
        })
        .await
    }

    // Manager operations

    /// List pending claims, oldest first (manager only)
    pub async fn list_pending(
        &self,
        actor_id: ClientId,
        limit: Option<usize>,
    ) -> Result<Vec<PendingPayment>> {
        self.require_manager(actor_id)?;
        self.with_read_retry(|storage| storage.list_pending(limit))
            .await
    }

    /// Confirm the pending claim at the given 1-based queue position
    ///
    /// The position is resolved against the current oldest-first listing and
    /// translated to the claim's durable id; the check-and-delete then runs
    /// inside the single-writer actor, so a racing confirmation of the same
    /// claim fails with [`Error::StaleClaim`] instead of double-appending.
    ///
    /// Once the claim has left the queue, the ledger append is retried hard:
    /// giving up means a real payment would vanish from the permanent
    /// record, so exhaustion surfaces [`Error::ReconciliationFatal`].
    pub async fn confirm_payment(
        &self,
        actor_id: ClientId,
        position: usize,
    ) -> Result<PaymentEntry> {
        self.require_manager(actor_id)?;

        let pending = self
            .with_read_retry(|storage| storage.list_pending(None))
            .await?;

        if position == 0 || position > pending.len() {
            return Err(Error::IndexOutOfRange {
                position,
                pending: pending.len(),
            });
        }
        let claim = pending[position - 1].clone();

        if !self.handle.claim_pending(claim.clone()).await? {
            self.metrics.record_stale_confirmation();
            return Err(Error::StaleClaim(claim.id));
        }

        let entry = PaymentEntry {
            payment_id: Uuid::now_v7(),
            client_id: claim.client_id,
            amount: claim.amount,
            confirmed_at: Utc::now(),
            claimed_at: claim.claimed_at,
        };

        self.append_payment_or_escalate(&claim, || self.handle.append_payment(entry.clone()))
            .await?;
        self.metrics.record_confirmation();

        tracing::info!(
            client_id = %entry.client_id,
            amount = %entry.amount,
            payment_id = %entry.payment_id,
            "Payment confirmed"
        );

        self.sink.notify(
            claim.client_id,
            &format!("Your payment of {} has been confirmed", claim.amount),
        );

        Ok(entry)
    }

    /// Fleet-wide totals and per-item sales (manager only)
    pub async fn fleet_summary(&self, actor_id: ClientId) -> Result<FleetSummary> {
        self.require_manager(actor_id)?;

        self.with_read_retry(|storage| {
            let mut total_ordered = Decimal::ZERO;
            let mut total_paid = Decimal::ZERO;
            let mut per_item_quantities: HashMap<String, u64> = HashMap::new();

            for client in storage.list_clients()? {
                for order in storage.list_orders(client.id, None)? {
                    total_ordered += order.line_total();
                    *per_item_quantities.entry(order.item_name).or_insert(0) +=
                        order.quantity as u64;
                }
                total_paid += storage.sum_payments(client.id)?;
            }

            let total_pending = storage
                .list_pending(None)?
                .iter()
                .map(|claim| claim.amount)
                .sum();

            Ok(FleetSummary {
                total_ordered,
                total_paid,
                total_pending,
                amount_due: total_ordered - total_paid,
                per_item_quantities,
            })
        })
        .await
    }

    /// Every client with its derived balance (manager only)
    ///
    /// Unreadable client records are skipped by the underlying scan rather
    /// than aborting the report.
    pub async fn all_balances(&self, actor_id: ClientId) -> Result<Vec<ClientBalance>> {
        self.require_manager(actor_id)?;

        self.with_read_retry(|storage| {
            let clients = storage.list_clients()?;
            let mut balances = Vec::with_capacity(clients.len());
            for client in clients {
                let balance = storage.sum_orders(client.id)? - storage.sum_payments(client.id)?;
                balances.push(ClientBalance {
                    client,
                    balance,
                    status: BalanceStatus::from_balance(balance),
                });
            }
            Ok(balances)
        })
        .await
    }

    /// Latest orders fleet-wide, newest first (manager only)
    pub async fn recent_orders(&self, actor_id: ClientId, limit: usize) -> Result<Vec<OrderEntry>> {
        self.require_manager(actor_id)?;

        self.with_read_retry(|storage| {
            let mut orders = Vec::new();
            for client in storage.list_clients()? {
                orders.extend(storage.list_orders(client.id, Some(limit))?);
            }
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            orders.truncate(limit);
            Ok(orders)
        })
        .await
    }

    /// Drain the writer; storage closes when the last reference drops
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }

    // Internals

    fn require_manager(&self, actor_id: ClientId) -> Result<()> {
        if self.policy.is_manager(actor_id) {
            Ok(())
        } else {
            Err(Error::Unauthorized(actor_id))
        }
    }

    fn notify_manager(&self, text: &str) {
        if let Some(manager) = self.policy.manager() {
            self.sink.notify(manager, text);
        }
    }

    /// Retry a read a bounded number of times with linear backoff
    async fn with_read_retry<T, F>(&self, op: F) -> Result<T>
    where
        F: Fn(&Storage) -> Result<T>,
    {
        let mut attempt = 0u32;
        loop {
            match op(&self.storage) {
                Err(e) if e.is_transient() && attempt + 1 < self.retry.read_attempts => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "Transient read failure, retrying");
                    tokio::time::sleep(Duration::from_millis(
                        self.retry.read_backoff_ms * attempt as u64,
                    ))
                    .await;
                }
                other => return other,
            }
        }
    }

    /// Append the confirmed payment, retrying hard before escalating
    ///
    /// Called after the claim has already left the pending queue; a swallowed
    /// failure here would silently lose a real payment. Generic over the
    /// append operation so the retry-and-escalate contract is testable with
    /// an injected failing writer.
    async fn append_payment_or_escalate<F, Fut>(
        &self,
        claim: &PendingPayment,
        append: F,
    ) -> Result<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 0u32;
        loop {
            match append().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt + 1 < self.retry.confirm_append_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        claim_id = %claim.id,
                        error = %e,
                        "Ledger append failed after queue removal, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(
                        self.retry.confirm_append_backoff_ms * attempt as u64,
                    ))
                    .await;
                }
                Err(e) => {
                    self.metrics.record_reconcile_failure();
                    tracing::error!(
                        claim_id = %claim.id,
                        client_id = %claim.client_id,
                        amount = %claim.amount,
                        error = %e,
                        "Payment removed from queue but ledger append exhausted retries"
                    );
                    return Err(Error::ReconciliationFatal {
                        client_id: claim.client_id,
                        amount: claim.amount,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

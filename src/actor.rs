//! Single-writer concurrency for the ledger
//!
//! All mutations flow through one Tokio task:
//! - One logical writer eliminates race conditions on the pending queue
//! - `ClaimPending` performs its check-and-delete inside the writer, so two
//!   manager confirmations racing for the same claim are linearized: exactly
//!   one receives the entry, the other observes `None`
//! - Async message passing with backpressure (bounded mailbox)
//!
//! Reads (balances, listings, summaries) bypass the actor and go straight to
//! storage; they never block unrelated writes.

use crate::types::{OrderEntry, PaymentEntry, PendingPayment};
use crate::{Error, Result, Storage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Append an order and upsert its owning client
    AppendOrder {
        entry: OrderEntry,
        display_name: String,
        response: oneshot::Sender<Result<()>>,
    },

    /// Append a confirmed payment
    AppendPayment {
        entry: PaymentEntry,
        response: oneshot::Sender<Result<()>>,
    },

    /// Enqueue a payment claim
    EnqueueClaim {
        claim: PendingPayment,
        response: oneshot::Sender<Result<()>>,
    },

    /// Remove a claim if still present (linearizable check-and-delete)
    ClaimPending {
        claim: PendingPayment,
        response: oneshot::Sender<Result<bool>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger mutations
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(storage: Arc<Storage>, mailbox: mpsc::Receiver<LedgerMessage>) -> Self {
        Self { storage, mailbox }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                other => self.handle_message(other),
            }
        }
        tracing::debug!("Ledger actor stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::AppendOrder {
                entry,
                display_name,
                response,
            } => {
                let result = self.storage.append_order(&entry, &display_name);
                let _ = response.send(result);
            }

            LedgerMessage::AppendPayment { entry, response } => {
                let result = self.storage.append_payment(&entry);
                let _ = response.send(result);
            }

            LedgerMessage::EnqueueClaim { claim, response } => {
                let result = self.storage.enqueue_pending(&claim);
                let _ = response.send(result);
            }

            LedgerMessage::ClaimPending { claim, response } => {
                let result = self.storage.remove_pending(&claim);
                let _ = response.send(result);
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn send<T>(
        &self,
        msg: LedgerMessage,
        rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Append an order
    pub async fn append_order(&self, entry: OrderEntry, display_name: String) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(
            LedgerMessage::AppendOrder {
                entry,
                display_name,
                response: tx,
            },
            rx,
        )
        .await
    }

    /// Append a confirmed payment
    pub async fn append_payment(&self, entry: PaymentEntry) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::AppendPayment { entry, response: tx }, rx)
            .await
    }

    /// Enqueue a payment claim
    pub async fn enqueue_claim(&self, claim: PendingPayment) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::EnqueueClaim { claim, response: tx }, rx)
            .await
    }

    /// Claim-and-remove a pending payment
    ///
    /// Returns false when a concurrent confirmation already consumed it.
    pub async fn claim_pending(&self, claim: PendingPayment) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(LedgerMessage::ClaimPending { claim, response: tx }, rx)
            .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(storage: Arc<Storage>) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(1000); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientId;
    use crate::Config;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn test_storage() -> (Arc<Storage>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Arc::new(Storage::open(&config).unwrap()), temp_dir)
    }

    fn test_claim() -> PendingPayment {
        PendingPayment {
            id: Uuid::now_v7(),
            client_id: ClientId::new(1),
            display_name: "@alice".to_string(),
            amount: dec!(5.00),
            claimed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_actor_spawn_and_shutdown() {
        let (storage, _temp) = test_storage();
        let handle = spawn_ledger_actor(storage);
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_actor_append_order() {
        let (storage, _temp) = test_storage();
        let handle = spawn_ledger_actor(storage.clone());

        let entry = OrderEntry {
            order_id: Uuid::now_v7(),
            client_id: ClientId::new(1),
            item_code: "coffee".to_string(),
            item_name: "Coffee".to_string(),
            quantity: 2,
            unit_price: dec!(2.50),
            created_at: Utc::now(),
        };

        handle
            .append_order(entry.clone(), "@alice".to_string())
            .await
            .unwrap();

        let orders = storage.list_orders(ClientId::new(1), None).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, entry.order_id);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_pending_exactly_once() {
        let (storage, _temp) = test_storage();
        let handle = spawn_ledger_actor(storage.clone());

        let claim = test_claim();
        handle.enqueue_claim(claim.clone()).await.unwrap();

        // Race many claimants for the same entry through clones of the handle
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let handle = handle.clone();
            let claim = claim.clone();
            tasks.push(tokio::spawn(
                async move { handle.claim_pending(claim).await },
            ));
        }

        let mut won = 0;
        for task in tasks {
            if task.await.unwrap().unwrap() {
                won += 1;
            }
        }

        assert_eq!(won, 1);
        assert!(storage.list_pending(None).unwrap().is_empty());

        handle.shutdown().await.unwrap();
    }
}

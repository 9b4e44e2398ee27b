//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `clients` - Client records (key: client id, big-endian)
//! - `orders` - Append-only order log (key: client id || created_at nanos || order id)
//! - `payments` - Append-only confirmed-payment log (same layout)
//! - `pending` - Pending-payment FIFO (key: claimed_at nanos || claim id)
//!
//! Key composition keeps per-client history in chronological order under a
//! plain prefix scan, and makes the pending queue's key order its FIFO order.
//!
//! Scans tolerate individually unreadable rows: a row that fails to decode is
//! logged and skipped, never aborting a listing or a balance aggregate.

use crate::{
    error::{Error, Result},
    types::{Client, ClientId, OrderEntry, PaymentEntry, PendingPayment},
    Config,
};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, DB,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_CLIENTS: &str = "clients";
const CF_ORDERS: &str = "orders";
const CF_PAYMENTS: &str = "payments";
const CF_PENDING: &str = "pending";

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        // Append-heavy workload
        db_opts.set_compaction_style(DBCompactionStyle::Universal);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CLIENTS, Self::cf_options_point_lookup()),
            ColumnFamilyDescriptor::new(CF_ORDERS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Self::cf_options_log()),
            ColumnFamilyDescriptor::new(CF_PENDING, Self::cf_options_point_lookup()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(path = ?path, "Opened RocksDB with 4 column families");

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_log() -> Options {
        let mut opts = Options::default();
        // History grows forever; trade CPU for space
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_point_lookup() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Key helpers

    fn history_key(client_id: ClientId, timestamp_nanos: i64, id: Uuid) -> Vec<u8> {
        let mut key = Vec::with_capacity(8 + 8 + 16);
        key.extend_from_slice(&client_id.to_key_bytes());
        key.extend_from_slice(&timestamp_nanos.to_be_bytes());
        key.extend_from_slice(id.as_bytes());
        key
    }

    fn pending_key(claim: &PendingPayment) -> Vec<u8> {
        let mut key = Vec::with_capacity(8 + 16);
        key.extend_from_slice(&claim.timestamp_nanos().to_be_bytes());
        key.extend_from_slice(claim.id.as_bytes());
        key
    }

    // Client operations

    /// Get a client record
    pub fn get_client(&self, client_id: ClientId) -> Result<Option<Client>> {
        let cf = self.cf_handle(CF_CLIENTS)?;
        match self.db.get_cf(cf, client_id.to_key_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// List all client records, skipping unreadable rows
    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let cf = self.cf_handle(CF_CLIENTS)?;
        let mut clients = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = match item {
                Ok(kv) => kv,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable client row");
                    continue;
                }
            };
            match bincode::deserialize::<Client>(&value) {
                Ok(client) => clients.push(client),
                Err(e) => {
                    tracing::warn!(key = ?key, error = %e, "Skipping corrupt client record");
                }
            }
        }

        Ok(clients)
    }

    // Order operations

    /// Append an order and upsert its owning client, atomically
    ///
    /// The client record's display name is last-write-wins and its
    /// last-activity timestamp follows the order.
    pub fn append_order(&self, entry: &OrderEntry, display_name: &str) -> Result<()> {
        let cf_orders = self.cf_handle(CF_ORDERS)?;
        let cf_clients = self.cf_handle(CF_CLIENTS)?;

        let key = Self::history_key(entry.client_id, entry.timestamp_nanos(), entry.order_id);
        let value = bincode::serialize(entry)?;

        let client = Client {
            id: entry.client_id,
            display_name: display_name.to_string(),
            last_activity: entry.created_at,
        };
        let client_value = bincode::serialize(&client)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(cf_orders, &key, &value);
        batch.put_cf(cf_clients, entry.client_id.to_key_bytes(), &client_value);
        self.db.write(batch)?;

        tracing::debug!(
            order_id = %entry.order_id,
            client_id = %entry.client_id,
            item = %entry.item_code,
            quantity = entry.quantity,
            "Order appended"
        );

        Ok(())
    }

    /// List a client's orders
    ///
    /// Chronological without a limit; newest-first when a limit is given.
    pub fn list_orders(&self, client_id: ClientId, limit: Option<usize>) -> Result<Vec<OrderEntry>> {
        let cf = self.cf_handle(CF_ORDERS)?;
        let entries = self.scan_client_history::<OrderEntry>(cf, client_id)?;
        Ok(Self::apply_limit(entries, limit))
    }

    /// Sum a client's order totals, decimal-exact
    ///
    /// Line totals are recomputed from quantity and unit price; corrupt rows
    /// are skipped so one bad row never aborts a balance computation.
    pub fn sum_orders(&self, client_id: ClientId) -> Result<Decimal> {
        let cf = self.cf_handle(CF_ORDERS)?;
        let entries = self.scan_client_history::<OrderEntry>(cf, client_id)?;
        Ok(entries.iter().map(|e| e.line_total()).sum())
    }

    // Payment operations

    /// Append a confirmed payment
    pub fn append_payment(&self, entry: &PaymentEntry) -> Result<()> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let key = Self::history_key(entry.client_id, entry.timestamp_nanos(), entry.payment_id);
        let value = bincode::serialize(entry)?;

        self.db.put_cf(cf, &key, &value)?;

        tracing::debug!(
            payment_id = %entry.payment_id,
            client_id = %entry.client_id,
            amount = %entry.amount,
            "Payment appended"
        );

        Ok(())
    }

    /// List a client's confirmed payments
    ///
    /// Chronological without a limit; newest-first when a limit is given.
    pub fn list_payments(
        &self,
        client_id: ClientId,
        limit: Option<usize>,
    ) -> Result<Vec<PaymentEntry>> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let entries = self.scan_client_history::<PaymentEntry>(cf, client_id)?;
        Ok(Self::apply_limit(entries, limit))
    }

    /// Sum a client's confirmed payments, decimal-exact
    pub fn sum_payments(&self, client_id: ClientId) -> Result<Decimal> {
        let cf = self.cf_handle(CF_PAYMENTS)?;
        let entries = self.scan_client_history::<PaymentEntry>(cf, client_id)?;
        Ok(entries.iter().map(|e| e.amount).sum())
    }

    // Pending-queue operations

    /// Enqueue a payment claim
    pub fn enqueue_pending(&self, claim: &PendingPayment) -> Result<()> {
        let cf = self.cf_handle(CF_PENDING)?;
        let key = Self::pending_key(claim);
        let value = bincode::serialize(claim)?;

        self.db.put_cf(cf, &key, &value)?;

        tracing::debug!(
            claim_id = %claim.id,
            client_id = %claim.client_id,
            amount = %claim.amount,
            "Payment claim enqueued"
        );

        Ok(())
    }

    /// List pending claims, oldest claim first
    pub fn list_pending(&self, limit: Option<usize>) -> Result<Vec<PendingPayment>> {
        let cf = self.cf_handle(CF_PENDING)?;
        let mut claims = Vec::new();

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = match item {
                Ok(kv) => kv,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable pending row");
                    continue;
                }
            };
            match bincode::deserialize::<PendingPayment>(&value) {
                Ok(claim) => claims.push(claim),
                Err(e) => {
                    tracing::warn!(key = ?key, error = %e, "Skipping corrupt pending claim");
                }
            }
            if let Some(n) = limit {
                if claims.len() >= n {
                    break;
                }
            }
        }

        Ok(claims)
    }

    /// Delete a claim if it is still present, keyed by its durable id
    ///
    /// Returns false when a concurrent confirmation already consumed it.
    /// Only the single-writer actor calls this, which is what makes the
    /// check-and-delete linearizable.
    pub fn remove_pending(&self, claim: &PendingPayment) -> Result<bool> {
        let cf = self.cf_handle(CF_PENDING)?;
        let key = Self::pending_key(claim);

        if self.db.get_cf(cf, &key)?.is_none() {
            return Ok(false);
        }

        self.db.delete_cf(cf, &key)?;

        tracing::debug!(claim_id = %claim.id, "Pending claim removed");
        Ok(true)
    }

    // Scan helpers

    fn scan_client_history<T: serde::de::DeserializeOwned>(
        &self,
        cf: &ColumnFamily,
        client_id: ClientId,
    ) -> Result<Vec<T>> {
        let prefix = client_id.to_key_bytes();
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = match item {
                Ok(kv) => kv,
                Err(e) => {
                    tracing::warn!(client_id = %client_id, error = %e, "Skipping unreadable row");
                    continue;
                }
            };
            if !key.starts_with(&prefix) {
                break;
            }
            match bincode::deserialize::<T>(&value) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!(client_id = %client_id, key = ?key, error = %e, "Skipping corrupt row");
                }
            }
        }

        Ok(entries)
    }

    fn apply_limit<T>(mut entries: Vec<T>, limit: Option<usize>) -> Vec<T> {
        match limit {
            Some(n) => {
                // Recent-first for summaries
                entries.reverse();
                entries.truncate(n);
                entries
            }
            None => entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn test_order(client_id: ClientId, quantity: u32, unit_price: Decimal) -> OrderEntry {
        OrderEntry {
            order_id: Uuid::now_v7(),
            client_id,
            item_code: "coffee".to_string(),
            item_name: "Coffee".to_string(),
            quantity,
            unit_price,
            created_at: Utc::now(),
        }
    }

    fn test_payment(client_id: ClientId, amount: Decimal) -> PaymentEntry {
        PaymentEntry {
            payment_id: Uuid::now_v7(),
            client_id,
            amount,
            confirmed_at: Utc::now(),
            claimed_at: Utc::now(),
        }
    }

    fn test_claim(client_id: ClientId, amount: Decimal) -> PendingPayment {
        PendingPayment {
            id: Uuid::now_v7(),
            client_id,
            display_name: "@alice".to_string(),
            amount,
            claimed_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_order_upserts_client() {
        let (storage, _temp) = test_storage();
        let client_id = ClientId::new(7);

        let order = test_order(client_id, 2, dec!(2.50));
        storage.append_order(&order, "@alice").unwrap();

        let client = storage.get_client(client_id).unwrap().unwrap();
        assert_eq!(client.display_name, "@alice");

        // Display name is last-write-wins
        let order2 = test_order(client_id, 1, dec!(2.50));
        storage.append_order(&order2, "@alice_renamed").unwrap();
        let client = storage.get_client(client_id).unwrap().unwrap();
        assert_eq!(client.display_name, "@alice_renamed");

        let orders = storage.list_orders(client_id, None).unwrap();
        assert_eq!(orders.len(), 2);
    }

    #[test]
    fn test_sum_orders_recomputes_line_totals() {
        let (storage, _temp) = test_storage();
        let client_id = ClientId::new(1);

        storage
            .append_order(&test_order(client_id, 2, dec!(2.50)), "@a")
            .unwrap();
        storage
            .append_order(&test_order(client_id, 3, dec!(4.00)), "@a")
            .unwrap();

        assert_eq!(storage.sum_orders(client_id).unwrap(), dec!(17.00));
    }

    #[test]
    fn test_history_isolated_per_client() {
        let (storage, _temp) = test_storage();
        let a = ClientId::new(1);
        let b = ClientId::new(2);

        storage.append_order(&test_order(a, 1, dec!(2.50)), "@a").unwrap();
        storage.append_order(&test_order(b, 5, dec!(8.00)), "@b").unwrap();

        assert_eq!(storage.sum_orders(a).unwrap(), dec!(2.50));
        assert_eq!(storage.sum_orders(b).unwrap(), dec!(40.00));
        assert_eq!(storage.list_orders(a, None).unwrap().len(), 1);
    }

    #[test]
    fn test_list_orders_limit_is_recent_first() {
        let (storage, _temp) = test_storage();
        let client_id = ClientId::new(1);

        for quantity in 1..=5 {
            let mut order = test_order(client_id, quantity, dec!(1.00));
            // Distinct timestamps so key order is deterministic
            order.created_at = Utc::now() + chrono::Duration::milliseconds(quantity as i64);
            storage.append_order(&order, "@a").unwrap();
        }

        let recent = storage.list_orders(client_id, Some(2)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].quantity, 5);
        assert_eq!(recent[1].quantity, 4);
    }

    #[test]
    fn test_payments_sum() {
        let (storage, _temp) = test_storage();
        let client_id = ClientId::new(3);

        storage.append_payment(&test_payment(client_id, dec!(5.00))).unwrap();
        storage.append_payment(&test_payment(client_id, dec!(0.01))).unwrap();

        assert_eq!(storage.sum_payments(client_id).unwrap(), dec!(5.01));
        assert_eq!(storage.list_payments(client_id, None).unwrap().len(), 2);
    }

    #[test]
    fn test_pending_fifo_order() {
        let (storage, _temp) = test_storage();

        let mut first = test_claim(ClientId::new(1), dec!(1.00));
        first.claimed_at = Utc::now() - chrono::Duration::seconds(10);
        let second = test_claim(ClientId::new(2), dec!(2.00));

        // Enqueue out of order; listing must be oldest claim first
        storage.enqueue_pending(&second).unwrap();
        storage.enqueue_pending(&first).unwrap();

        let pending = storage.list_pending(None).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }

    #[test]
    fn test_remove_pending_is_conditional() {
        let (storage, _temp) = test_storage();
        let claim = test_claim(ClientId::new(1), dec!(5.00));

        storage.enqueue_pending(&claim).unwrap();
        assert!(storage.remove_pending(&claim).unwrap());
        // Second removal observes absence
        assert!(!storage.remove_pending(&claim).unwrap());
        assert!(storage.list_pending(None).unwrap().is_empty());
    }

    #[test]
    fn test_scans_skip_corrupt_rows() {
        let (storage, _temp) = test_storage();
        let client_id = ClientId::new(9);

        storage
            .append_order(&test_order(client_id, 2, dec!(2.50)), "@a")
            .unwrap();
        storage
            .append_order(&test_order(client_id, 1, dec!(4.00)), "@a")
            .unwrap();

        // Plant a garbage row inside the client's key range
        let cf = storage.cf_handle(CF_ORDERS).unwrap();
        let key = Storage::history_key(client_id, i64::MAX / 2, Uuid::now_v7());
        storage.db.put_cf(cf, &key, b"not bincode").unwrap();

        let orders = storage.list_orders(client_id, None).unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(storage.sum_orders(client_id).unwrap(), dec!(9.00));
    }

    #[test]
    fn test_list_pending_skips_corrupt_rows() {
        let (storage, _temp) = test_storage();

        storage
            .enqueue_pending(&test_claim(ClientId::new(1), dec!(3.00)))
            .unwrap();

        let cf = storage.cf_handle(CF_PENDING).unwrap();
        storage.db.put_cf(cf, b"zzzz-garbage-key", b"garbage").unwrap();

        let pending = storage.list_pending(None).unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_list_clients_skips_corrupt_rows() {
        let (storage, _temp) = test_storage();

        storage
            .append_order(&test_order(ClientId::new(1), 1, dec!(2.00)), "@a")
            .unwrap();
        storage
            .append_order(&test_order(ClientId::new(2), 1, dec!(2.00)), "@b")
            .unwrap();

        let cf = storage.cf_handle(CF_CLIENTS).unwrap();
        storage
            .db
            .put_cf(cf, ClientId::new(3).to_key_bytes(), b"corrupt")
            .unwrap();

        let clients = storage.list_clients().unwrap();
        assert_eq!(clients.len(), 2);
    }
}

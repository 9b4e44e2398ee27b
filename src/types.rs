//! Core types for the cafeteria ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for money)
//! - Append-only history (orders and payments are immutable facts)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Client identifier (external numeric account id, e.g. a chat user id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(i64);

impl ClientId {
    /// Create new client ID
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get as raw integer
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Big-endian key bytes (preserves numeric ordering in storage)
    pub fn to_key_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Reconstruct from big-endian key bytes
    pub fn from_key_bytes(bytes: [u8; 8]) -> Self {
        Self(i64::from_be_bytes(bytes))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client known to the system
///
/// Created (or upserted) on first order. `display_name` is last-write-wins;
/// the record is never deleted while ledger history for it exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Stable external identifier
    pub id: ClientId,

    /// Display name, refreshed on every order
    pub display_name: String,

    /// Last order/payment activity
    pub last_activity: DateTime<Utc>,
}

/// An immutable order fact: "client X ordered item Y, quantity Q, at unit price P"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEntry {
    /// Unique order ID (UUIDv7 for time-ordering)
    pub order_id: Uuid,

    /// Owning client
    pub client_id: ClientId,

    /// Menu item code at order time
    pub item_code: String,

    /// Item name snapshot at order time
    pub item_name: String,

    /// Quantity ordered (always > 0)
    pub quantity: u32,

    /// Unit price snapshot at order time (exact decimal)
    pub unit_price: Decimal,

    /// Order timestamp
    pub created_at: DateTime<Utc>,
}

impl OrderEntry {
    /// Line total, always recomputed from quantity and unit price
    ///
    /// Never cached in storage: a stale total must not survive a price-field
    /// edit or a partially-written row.
    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }

    /// Key timestamp in nanoseconds since the Unix epoch
    pub fn timestamp_nanos(&self) -> i64 {
        self.created_at.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// An immutable confirmed-payment fact
///
/// Created only by a manager confirming a [`PendingPayment`]; never written
/// directly from a client action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEntry {
    /// Unique payment ID (UUIDv7)
    pub payment_id: Uuid,

    /// Owning client
    pub client_id: ClientId,

    /// Confirmed amount (always > 0)
    pub amount: Decimal,

    /// When the manager confirmed
    pub confirmed_at: DateTime<Utc>,

    /// When the client originally reported the payment
    pub claimed_at: DateTime<Utc>,
}

impl PaymentEntry {
    /// Key timestamp in nanoseconds since the Unix epoch
    pub fn timestamp_nanos(&self) -> i64 {
        self.confirmed_at.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// A payment claim awaiting manager confirmation
///
/// Lives in the pending queue from enqueue until exactly one confirmation
/// removes it. The `(claimed_at, id)` pair is the durable queue key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPayment {
    /// Stable queue key, assigned at insertion (UUIDv7)
    pub id: Uuid,

    /// Claiming client
    pub client_id: ClientId,

    /// Client display name snapshot at claim time
    pub display_name: String,

    /// Claimed amount (always > 0)
    pub amount: Decimal,

    /// When the client reported the payment
    pub claimed_at: DateTime<Utc>,
}

impl PendingPayment {
    /// Key timestamp in nanoseconds since the Unix epoch
    pub fn timestamp_nanos(&self) -> i64 {
        self.claimed_at.timestamp_nanos_opt().unwrap_or(0)
    }
}

/// Interpretation of a derived balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceStatus {
    /// Client owes money (balance > 0)
    Due,
    /// Client has overpaid (balance < 0)
    Credit,
    /// Settled (balance == 0)
    Settled,
}

impl BalanceStatus {
    /// Classify a balance
    pub fn from_balance(balance: Decimal) -> Self {
        if balance > Decimal::ZERO {
            BalanceStatus::Due
        } else if balance < Decimal::ZERO {
            BalanceStatus::Credit
        } else {
            BalanceStatus::Settled
        }
    }
}

/// Per-client history summary (orders, payments, derived balance)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSummary {
    /// The client record
    pub client: Client,

    /// Most recent orders, newest first
    pub recent_orders: Vec<OrderEntry>,

    /// Most recent confirmed payments, newest first
    pub recent_payments: Vec<PaymentEntry>,

    /// Full-history order total
    pub total_ordered: Decimal,

    /// Full-history confirmed-payment total
    pub total_paid: Decimal,

    /// `total_ordered - total_paid`
    pub balance: Decimal,

    /// Classification of `balance`
    pub status: BalanceStatus,
}

/// One row of the fleet-wide balance listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientBalance {
    /// The client record
    pub client: Client,

    /// Derived balance
    pub balance: Decimal,

    /// Classification of `balance`
    pub status: BalanceStatus,
}

/// Fleet-wide aggregate across all clients plus the live pending queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSummary {
    /// Sum of every client's order totals
    pub total_ordered: Decimal,

    /// Sum of every client's confirmed payments
    pub total_paid: Decimal,

    /// Sum of unconfirmed claims in the pending queue
    pub total_pending: Decimal,

    /// `total_ordered - total_paid`
    pub amount_due: Decimal,

    /// Units sold per item name, across all clients
    pub per_item_quantities: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_id_key_roundtrip() {
        let id = ClientId::new(135_976_546);
        assert_eq!(ClientId::from_key_bytes(id.to_key_bytes()), id);
    }

    #[test]
    fn test_client_id_key_ordering() {
        // Storage sorts keys lexicographically; BE encoding must match
        let a = ClientId::new(5).to_key_bytes();
        let b = ClientId::new(600).to_key_bytes();
        assert!(a < b);
    }

    #[test]
    fn test_line_total_recomputed() {
        let order = OrderEntry {
            order_id: Uuid::now_v7(),
            client_id: ClientId::new(1),
            item_code: "coffee".to_string(),
            item_name: "Coffee".to_string(),
            quantity: 3,
            unit_price: dec!(2.50),
            created_at: Utc::now(),
        };
        assert_eq!(order.line_total(), dec!(7.50));
    }

    #[test]
    fn test_balance_status() {
        assert_eq!(BalanceStatus::from_balance(dec!(5.00)), BalanceStatus::Due);
        assert_eq!(
            BalanceStatus::from_balance(dec!(-0.01)),
            BalanceStatus::Credit
        );
        assert_eq!(
            BalanceStatus::from_balance(Decimal::ZERO),
            BalanceStatus::Settled
        );
    }
}

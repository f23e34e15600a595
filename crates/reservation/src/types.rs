//! Reservation domain types
//!
//! Value-style records referenced by explicit ids. Orders embed their items;
//! inventory records are the shared mutable state guarded by the store's locks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReservationError, Result};

/// Store-assigned order identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub i64);

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a user known to the user directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Stock reserved, awaiting confirmation or cancellation
    Pending,
    /// Sold; stock stays reserved
    Confirmed,
    /// Reservation released
    Cancelled,
}

impl OrderStatus {
    /// Confirmed and cancelled orders never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ReservationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(ReservationError::Internal(format!("unknown order status '{}'", other))),
        }
    }
}

/// Stock record for a single product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub product_id: String,
    pub total_stock: i32,
    pub reserved_stock: i32,
}

impl Inventory {
    /// Fresh record with nothing reserved
    pub fn new(product_id: impl Into<String>, total_stock: i32) -> Self {
        Self {
            product_id: product_id.into(),
            total_stock,
            reserved_stock: 0,
        }
    }

    /// Quantity orderable right now
    pub fn available_stock(&self) -> i32 {
        self.total_stock - self.reserved_stock
    }
}

/// One product line of an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i32,
}

impl OrderItem {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }

    /// Reject blank product ids and non-positive quantities
    pub fn validate(&self) -> Result<()> {
        if self.product_id.trim().is_empty() {
            return Err(ReservationError::InvalidInput(
                "Product ID is required for every item".to_string(),
            ));
        }
        if self.quantity <= 0 {
            return Err(ReservationError::InvalidInput(format!(
                "Quantity must be positive for product: {}",
                self.product_id
            )));
        }
        Ok(())
    }
}

/// Validate a whole order request
pub fn validate_items(items: &[OrderItem]) -> Result<()> {
    if items.is_empty() {
        return Err(ReservationError::InvalidInput(
            "Order must contain at least one item".to_string(),
        ));
    }
    items.iter().try_for_each(OrderItem::validate)
}

/// Copy of `items` in lock-acquisition order.
///
/// Ascending by product id; the sort is stable so duplicates keep their
/// request order.
pub fn lock_order(items: &[OrderItem]) -> Vec<OrderItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    sorted
}

/// A user as seen by the reservation core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
}

/// Order that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(user_id: UserId, items: Vec<OrderItem>) -> Self {
        Self {
            user_id,
            items,
            created_at: Utc::now(),
        }
    }

    /// Attach the store-assigned id; new orders always start PENDING
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            status: OrderStatus::Pending,
            items: self.items,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Persisted order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Bump the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Total units across all items
    pub fn total_units(&self) -> i64 {
        self.items.iter().map(|i| i64::from(i.quantity)).sum()
    }
}

//! Reservation error types

use thiserror::Error;

use crate::store::StoreError;
use crate::types::{OrderId, OrderStatus};

/// Kind of record a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Order,
    Product,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::User => write!(f, "User"),
            Entity::Order => write!(f, "Order"),
            Entity::Product => write!(f, "Product"),
        }
    }
}

/// Errors returned by reservation operations
#[derive(Error, Debug)]
pub enum ReservationError {
    /// Malformed or empty request data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller lacks the role the operation needs
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced user, order or product does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// Not enough unreserved stock
    #[error("Insufficient stock for product {product_id} (available={available}, requested={requested})")]
    InsufficientStock {
        product_id: String,
        available: i32,
        requested: i32,
    },

    /// Lifecycle transition attempted from a terminal state
    #[error("Order {order_id} is {current}, expected {expected}")]
    InvalidState {
        order_id: OrderId,
        current: OrderStatus,
        expected: OrderStatus,
    },

    /// Storage layer failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Worker pool is not accepting work
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReservationError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ReservationError::InvalidInput(_) => "invalid_input",
            ReservationError::Forbidden(_) => "forbidden",
            ReservationError::NotFound { .. } => "not_found",
            ReservationError::InsufficientStock { .. } => "insufficient_stock",
            ReservationError::InvalidState { .. } => "invalid_state",
            ReservationError::Storage(_) => "storage",
            ReservationError::Unavailable(_) => "unavailable",
            ReservationError::Internal(_) => "internal",
        }
    }

    /// True for the generic failure kind (anything that is not a business outcome)
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ReservationError::Storage(_) | ReservationError::Unavailable(_) | ReservationError::Internal(_)
        )
    }
}

/// Result type for reservation operations
pub type Result<T> = std::result::Result<T, ReservationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message_carries_context() {
        let err = ReservationError::InsufficientStock {
            product_id: "SKU-MUG-456".to_string(),
            available: 4,
            requested: 10,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for product SKU-MUG-456 (available=4, requested=10)"
        );
        assert_eq!(err.kind(), "insufficient_stock");
        assert!(!err.is_internal());
    }

    #[test]
    fn test_not_found_display() {
        let err = ReservationError::not_found(Entity::Order, OrderId(55));
        assert_eq!(err.to_string(), "Order not found: 55");
    }

    #[test]
    fn test_storage_is_internal() {
        let err = ReservationError::from(StoreError::Database("connection reset".into()));
        assert!(err.is_internal());
    }
}

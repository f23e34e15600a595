//! Inventory reservation core for Stockroom
//!
//! Places orders against shared inventory without overselling, and moves
//! orders through their lifecycle.
//!
//! # Features
//!
//! - All-or-nothing multi-item reservation with deadlock-free lock ordering
//! - Order confirmation and cancellation with stock release
//! - Inventory administration
//! - Bounded worker pool for order placement
//!
//! # Feature Flags
//!
//! - `postgres` - Enable PostgreSQL storage
//! - `api` - Enable HTTP API

pub mod types;
pub mod error;
pub mod identity;
pub mod store;
pub mod clients;
pub mod ledger;
pub mod coordinator;
pub mod lifecycle;
pub mod worker;
pub mod metrics;

#[cfg(feature = "api")]
pub mod api;

// Re-export commonly used types
pub use types::{Inventory, NewOrder, Order, OrderId, OrderItem, OrderStatus, User, UserId};
pub use error::{Entity, ReservationError, Result};
pub use identity::{Identity, INVENTORY_ADMIN_ROLE};
pub use ledger::InventoryLedger;
pub use coordinator::ReservationCoordinator;
pub use lifecycle::OrderLifecycle;
pub use worker::{OrderTicket, ReservationPool};
pub use metrics::ReservationMetrics;

// Store exports
pub use store::traits::{Store, UnitOfWork};
pub use store::memory::InMemoryStore;

#[cfg(feature = "postgres")]
pub use store::postgres::PostgresStore;

// Client exports
pub use clients::{StaticUserDirectory, UserDirectory};

#[cfg(feature = "postgres")]
pub use clients::PostgresUserDirectory;

//! Store and UnitOfWork trait definitions

use async_trait::async_trait;

use crate::store::error::StoreError;
use crate::types::{Inventory, NewOrder, Order, OrderId};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Store trait - opens atomic units of work against the backing data store
///
/// Implementations (in-memory, PostgreSQL) can be swapped without changing the
/// reservation logic.
#[async_trait]
pub trait Store: Send + Sync {
    /// Begin a new unit of work.
    ///
    /// Everything done through the returned handle becomes visible together on
    /// [`UnitOfWork::commit`]. Dropping the handle without committing discards
    /// all writes and releases every lock it holds.
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// A single transaction: reads, exclusive record locks and staged writes.
///
/// Locks are held until the unit of work ends. Acquiring a lock the unit of
/// work already holds returns immediately.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Read an inventory record without locking it
    async fn find_inventory(&mut self, product_id: &str) -> StoreResult<Option<Inventory>>;

    /// Exclusively lock an inventory record and return its current values.
    ///
    /// Suspends until competing holders release the record. Returns `None`
    /// when the product does not exist; the key stays locked either way, so a
    /// subsequent insert of that product is serialized too.
    async fn lock_inventory(&mut self, product_id: &str) -> StoreResult<Option<Inventory>>;

    /// Insert or replace an inventory record. The record must be locked.
    async fn save_inventory(&mut self, inventory: &Inventory) -> StoreResult<Inventory>;

    /// Read an order without locking it
    async fn find_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// Exclusively lock an order and return it
    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// Persist a new order, assigning its id
    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order>;

    /// Persist status and timestamp changes of an existing, locked order
    async fn update_order(&mut self, order: &Order) -> StoreResult<Order>;

    /// Make every staged write visible and release all locks
    async fn commit(self: Box<Self>) -> StoreResult<()>;

    /// Discard every staged write and release all locks
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

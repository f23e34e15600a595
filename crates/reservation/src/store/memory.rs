//! In-memory store implementation
//!
//! Each record key has its own async mutex. A unit of work keeps the owned
//! guards of every key it locked and stages its writes privately; commit
//! publishes the staged writes under the state lock and then drops the guards.
//! Dropping an uncommitted unit of work throws the staged writes away.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex as RecordLock, OwnedMutexGuard};
use tracing::debug;

use crate::store::error::StoreError;
use crate::store::traits::{Store, StoreResult, UnitOfWork};
use crate::types::{Inventory, NewOrder, Order, OrderId};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LockKey {
    Inventory(String),
    Order(OrderId),
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::Inventory(product_id) => write!(f, "inventory:{}", product_id),
            LockKey::Order(order_id) => write!(f, "order:{}", order_id),
        }
    }
}

#[derive(Default)]
struct LockTable {
    entries: Mutex<HashMap<LockKey, Arc<RecordLock<()>>>>,
}

impl LockTable {
    /// Get (or create) the mutex for a key. The table lock is released before
    /// the caller awaits the record mutex.
    fn handle(&self, key: &LockKey) -> Arc<RecordLock<()>> {
        let mut entries = self.entries.lock();
        Arc::clone(
            entries
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RecordLock::new(()))),
        )
    }

    /// Drop the entries of released keys that nobody else holds or waits on.
    /// Waiters clone the handle under the table lock, so a strong count of
    /// one means the table owns the only reference.
    fn release(&self, keys: impl IntoIterator<Item = LockKey>) {
        let mut entries = self.entries.lock();
        for key in keys {
            if entries
                .get(&key)
                .is_some_and(|entry| Arc::strong_count(entry) == 1)
            {
                entries.remove(&key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[derive(Default)]
struct MemoryState {
    inventory: HashMap<String, Inventory>,
    orders: BTreeMap<OrderId, Order>,
}

/// In-memory store for development and testing
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<LockTable>,
    next_order_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            locks: Arc::new(LockTable::default()),
            next_order_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Create a store pre-populated with inventory records
    pub fn with_inventory(records: impl IntoIterator<Item = Inventory>) -> Self {
        let store = Self::new();
        for record in records {
            store.seed_inventory(record);
        }
        store
    }

    /// Write an inventory record directly, outside any unit of work.
    ///
    /// Only meant for start-up seeding and test fixtures.
    pub fn seed_inventory(&self, inventory: Inventory) {
        self.state
            .write()
            .inventory
            .insert(inventory.product_id.clone(), inventory);
    }

    /// Write an order directly, outside any unit of work
    pub fn seed_order(&self, order: Order) {
        self.next_order_id.fetch_max(order.id.0 + 1, Ordering::SeqCst);
        self.state.write().orders.insert(order.id, order);
    }

    /// Committed state of an inventory record
    pub fn inventory_snapshot(&self, product_id: &str) -> Option<Inventory> {
        self.state.read().inventory.get(product_id).cloned()
    }

    /// Committed state of every inventory record
    pub fn all_inventory(&self) -> Vec<Inventory> {
        self.state.read().inventory.values().cloned().collect()
    }

    /// Number of committed orders
    pub fn order_count(&self) -> usize {
        self.state.read().orders.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            state: Arc::clone(&self.state),
            locks: Arc::clone(&self.locks),
            next_order_id: Arc::clone(&self.next_order_id),
            held: HashMap::new(),
            inventory_writes: HashMap::new(),
            order_writes: BTreeMap::new(),
        }))
    }
}

/// Unit of work over [`InMemoryStore`]
pub struct InMemoryUnitOfWork {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<LockTable>,
    next_order_id: Arc<AtomicI64>,
    held: HashMap<LockKey, OwnedMutexGuard<()>>,
    inventory_writes: HashMap<String, Inventory>,
    order_writes: BTreeMap<OrderId, Order>,
}

impl InMemoryUnitOfWork {
    async fn acquire(&mut self, key: LockKey) {
        if self.held.contains_key(&key) {
            return;
        }
        let handle = self.locks.handle(&key);
        debug!(%key, "Waiting for record lock");
        let guard = handle.lock_owned().await;
        debug!(%key, "Record lock acquired");
        self.held.insert(key, guard);
    }

    fn release_all(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let keys: Vec<LockKey> = self.held.keys().cloned().collect();
        self.held.clear();
        self.locks.release(keys);
    }

    fn ensure_held(&self, key: &LockKey) -> StoreResult<()> {
        if self.held.contains_key(key) {
            Ok(())
        } else {
            Err(StoreError::LockNotHeld(key.to_string()))
        }
    }

    fn read_inventory(&self, product_id: &str) -> Option<Inventory> {
        if let Some(staged) = self.inventory_writes.get(product_id) {
            return Some(staged.clone());
        }
        self.state.read().inventory.get(product_id).cloned()
    }

    fn read_order(&self, order_id: OrderId) -> Option<Order> {
        if let Some(staged) = self.order_writes.get(&order_id) {
            return Some(staged.clone());
        }
        self.state.read().orders.get(&order_id).cloned()
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_inventory(&mut self, product_id: &str) -> StoreResult<Option<Inventory>> {
        Ok(self.read_inventory(product_id))
    }

    async fn lock_inventory(&mut self, product_id: &str) -> StoreResult<Option<Inventory>> {
        self.acquire(LockKey::Inventory(product_id.to_string())).await;
        Ok(self.read_inventory(product_id))
    }

    async fn save_inventory(&mut self, inventory: &Inventory) -> StoreResult<Inventory> {
        self.ensure_held(&LockKey::Inventory(inventory.product_id.clone()))?;
        self.inventory_writes
            .insert(inventory.product_id.clone(), inventory.clone());
        Ok(inventory.clone())
    }

    async fn find_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.read_order(order_id))
    }

    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>> {
        self.acquire(LockKey::Order(order_id)).await;
        Ok(self.read_order(order_id))
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let order_id = OrderId(self.next_order_id.fetch_add(1, Ordering::SeqCst));
        // Nobody else can know this id yet, so the lock is uncontended
        self.acquire(LockKey::Order(order_id)).await;
        let order = order.into_order(order_id);
        self.order_writes.insert(order_id, order.clone());
        Ok(order)
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<Order> {
        self.ensure_held(&LockKey::Order(order.id))?;
        if self.read_order(order.id).is_none() {
            return Err(StoreError::Missing(format!("order {}", order.id)));
        }
        self.order_writes.insert(order.id, order.clone());
        Ok(order.clone())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let inventory_writes = std::mem::take(&mut self.inventory_writes);
        let order_writes = std::mem::take(&mut self.order_writes);
        {
            let mut state = self.state.write();
            state.inventory.extend(inventory_writes);
            state.orders.extend(order_writes);
        }
        // Publish first, then release
        self.release_all();
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.inventory_writes.is_empty() || !self.order_writes.is_empty() {
            debug!(
                inventory_writes = self.inventory_writes.len(),
                order_writes = self.order_writes.len(),
                "Unit of work discarded without commit"
            );
        }
        self.release_all();
    }
}

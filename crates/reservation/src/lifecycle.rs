//! Order lifecycle - confirmation and cancellation of PENDING orders
//!
//! Transitions lock the order first and its inventory records second, in
//! ascending product id order. Order placement never locks an order, so the
//! two paths cannot wait on each other in a cycle.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Entity, ReservationError, Result};
use crate::identity::Identity;
use crate::ledger::InventoryLedger;
use crate::metrics::ReservationMetrics;
use crate::store::{Store, UnitOfWork};
use crate::types::{lock_order, Order, OrderId, OrderStatus};

/// Order lifecycle manager
pub struct OrderLifecycle {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
    metrics: ReservationMetrics,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            ledger: InventoryLedger::new(Arc::clone(&store)),
            store,
            metrics: ReservationMetrics::new(),
        }
    }

    /// Fetch an order
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        let mut uow = self.store.begin().await?;
        let order = uow.find_order(order_id).await?;
        uow.rollback().await?;
        order.ok_or_else(|| ReservationError::not_found(Entity::Order, order_id))
    }

    /// PENDING -> CONFIRMED. Reserved stock stays reserved.
    pub async fn confirm(&self, identity: &Identity, order_id: OrderId) -> Result<Order> {
        let mut uow = self.store.begin().await?;
        let mut order = lock_pending(&mut *uow, order_id).await?;

        order.status = OrderStatus::Confirmed;
        order.touch();
        let order = uow.update_order(&order).await?;
        uow.commit().await?;

        self.metrics.order_confirmed();
        info!(actor = %identity, order_id = %order.id, user_id = %order.user_id, "Order confirmed");
        Ok(order)
    }

    /// PENDING -> CANCELLED, releasing every item's reservation
    pub async fn cancel(&self, identity: &Identity, order_id: OrderId) -> Result<Order> {
        let mut uow = self.store.begin().await?;
        let mut order = lock_pending(&mut *uow, order_id).await?;

        let mut released: u64 = 0;
        for item in lock_order(&order.items) {
            let mut inventory = self.ledger.lock_and_get(&mut *uow, &item.product_id).await?;

            let remaining = inventory.reserved_stock - item.quantity;
            if remaining < 0 {
                warn!(
                    order_id = %order_id,
                    product_id = %item.product_id,
                    reserved_stock = inventory.reserved_stock,
                    quantity = item.quantity,
                    drift = -remaining,
                    "Releasing more than reserved; clamping reserved stock at 0"
                );
            }
            let new_reserved = remaining.max(0);
            released += u64::try_from(inventory.reserved_stock - new_reserved).unwrap_or(0);
            inventory.reserved_stock = new_reserved;
            uow.save_inventory(&inventory).await?;
        }

        order.status = OrderStatus::Cancelled;
        order.touch();
        let order = uow.update_order(&order).await?;
        uow.commit().await?;

        self.metrics.order_cancelled(released);
        info!(
            actor = %identity,
            order_id = %order.id,
            user_id = %order.user_id,
            units_released = released,
            "Order cancelled"
        );
        Ok(order)
    }
}

/// Lock an order and require it to be PENDING
async fn lock_pending(uow: &mut dyn UnitOfWork, order_id: OrderId) -> Result<Order> {
    let order = uow
        .lock_order(order_id)
        .await?
        .ok_or_else(|| ReservationError::not_found(Entity::Order, order_id))?;

    if order.status != OrderStatus::Pending {
        warn!(order_id = %order_id, current = %order.status, "Transition refused");
        return Err(ReservationError::InvalidState {
            order_id,
            current: order.status,
            expected: OrderStatus::Pending,
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use crate::types::{Inventory, NewOrder, OrderItem, UserId};
    use assert_matches::assert_matches;
    use futures::future::join_all;

    const BOOK: &str = "SKU-BOOK-123";
    const MUG: &str = "SKU-MUG-456";

    fn clerk() -> Identity {
        Identity::new("clerk")
    }

    fn stock(product_id: &str, total: i32, reserved: i32) -> Inventory {
        Inventory {
            product_id: product_id.to_string(),
            total_stock: total,
            reserved_stock: reserved,
        }
    }

    fn seeded_order(id: i64, status: OrderStatus, items: Vec<OrderItem>) -> Order {
        let mut order = NewOrder::new(UserId(1), items).into_order(OrderId(id));
        order.status = status;
        order
    }

    /// Order 7 PENDING with (BOOK,2),(MUG,1); BOOK reserved 5, MUG reserved 2
    fn pending_fixture() -> (Arc<InMemoryStore>, OrderLifecycle) {
        let store = Arc::new(InMemoryStore::with_inventory(vec![
            stock(BOOK, 10, 5),
            stock(MUG, 5, 2),
        ]));
        store.seed_order(seeded_order(
            7,
            OrderStatus::Pending,
            vec![OrderItem::new(BOOK, 2), OrderItem::new(MUG, 1)],
        ));
        let lifecycle = OrderLifecycle::new(store.clone());
        (store, lifecycle)
    }

    fn reserved(store: &InMemoryStore, product_id: &str) -> i32 {
        store.inventory_snapshot(product_id).unwrap().reserved_stock
    }

    #[tokio::test]
    async fn test_cancel_releases_reservations() {
        let (store, lifecycle) = pending_fixture();
        let before = lifecycle.get_order(OrderId(7)).await.unwrap();

        let order = lifecycle.cancel(&clerk(), OrderId(7)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.updated_at >= before.updated_at);
        assert_eq!(reserved(&store, BOOK), 3);
        assert_eq!(reserved(&store, MUG), 1);
        assert_eq!(
            lifecycle.get_order(OrderId(7)).await.unwrap().status,
            OrderStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn test_confirm_keeps_reservations() {
        let (store, lifecycle) = pending_fixture();

        let order = lifecycle.confirm(&clerk(), OrderId(7)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(reserved(&store, BOOK), 5);
        assert_eq!(reserved(&store, MUG), 2);
    }

    #[tokio::test]
    async fn test_confirm_cancelled_order_is_invalid_state() {
        let store = Arc::new(InMemoryStore::new());
        store.seed_order(seeded_order(42, OrderStatus::Cancelled, vec![OrderItem::new(BOOK, 1)]));
        let lifecycle = OrderLifecycle::new(store);

        let result = lifecycle.confirm(&clerk(), OrderId(42)).await;
        assert_matches!(
            result,
            Err(ReservationError::InvalidState {
                current: OrderStatus::Cancelled,
                expected: OrderStatus::Pending,
                ..
            })
        );
    }

    #[tokio::test]
    async fn test_terminal_orders_never_change() {
        let (store, lifecycle) = pending_fixture();
        lifecycle.confirm(&clerk(), OrderId(7)).await.unwrap();

        assert_matches!(
            lifecycle.cancel(&clerk(), OrderId(7)).await,
            Err(ReservationError::InvalidState { current: OrderStatus::Confirmed, .. })
        );
        assert_matches!(
            lifecycle.confirm(&clerk(), OrderId(7)).await,
            Err(ReservationError::InvalidState { .. })
        );
        assert_eq!(reserved(&store, BOOK), 5);
    }

    #[tokio::test]
    async fn test_missing_order_not_found() {
        let lifecycle = OrderLifecycle::new(Arc::new(InMemoryStore::new()));

        assert_matches!(
            lifecycle.get_order(OrderId(1)).await,
            Err(ReservationError::NotFound { entity: Entity::Order, .. })
        );
        assert_matches!(
            lifecycle.cancel(&clerk(), OrderId(1)).await,
            Err(ReservationError::NotFound { .. })
        );
        assert_matches!(
            lifecycle.confirm(&clerk(), OrderId(1)).await,
            Err(ReservationError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_cancel_clamps_drifted_reservation_at_zero() {
        let store = Arc::new(InMemoryStore::with_inventory(vec![stock(BOOK, 10, 1)]));
        store.seed_order(seeded_order(3, OrderStatus::Pending, vec![OrderItem::new(BOOK, 4)]));
        let lifecycle = OrderLifecycle::new(store.clone());

        lifecycle.cancel(&clerk(), OrderId(3)).await.unwrap();
        assert_eq!(reserved(&store, BOOK), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cancels_release_once() {
        let (store, lifecycle) = pending_fixture();
        let lifecycle = Arc::new(lifecycle);

        let tasks = (0..8).map(|_| {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.cancel(&clerk(), OrderId(7)).await })
        });
        let results: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ReservationError::InvalidState { .. })));
        assert_eq!(reserved(&store, BOOK), 3);
        assert_eq!(reserved(&store, MUG), 1);
    }
}

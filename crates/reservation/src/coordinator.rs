//! Reservation coordinator - places orders and reserves their stock
//!
//! Order placement is one unit of work:
//! 1. Validate the request and resolve the user
//! 2. Lock every inventory record in ascending product id order
//! 3. Check and increment `reserved_stock` per item
//! 4. Persist the order as PENDING and commit
//!
//! Any failure drops the unit of work, which discards every reservation made
//! so far and releases the locks.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::clients::UserDirectory;
use crate::error::{Entity, ReservationError, Result};
use crate::identity::Identity;
use crate::ledger::InventoryLedger;
use crate::metrics::ReservationMetrics;
use crate::store::Store;
use crate::types::{lock_order, validate_items, NewOrder, Order, OrderItem, UserId};

/// Reservation coordinator
pub struct ReservationCoordinator {
    store: Arc<dyn Store>,
    users: Arc<dyn UserDirectory>,
    ledger: InventoryLedger,
    metrics: ReservationMetrics,
}

impl ReservationCoordinator {
    pub fn new(store: Arc<dyn Store>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            ledger: InventoryLedger::new(Arc::clone(&store)),
            store,
            users,
            metrics: ReservationMetrics::new(),
        }
    }

    /// Place an order for `user_id`, reserving stock for every item.
    ///
    /// The returned order keeps the items in request order.
    pub async fn create_order(
        &self,
        identity: &Identity,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.place(user_id, items).await;

        match &result {
            Ok(order) => {
                let units = u64::try_from(order.total_units()).unwrap_or(0);
                self.metrics.order_created(units, started.elapsed());
                info!(
                    actor = %identity,
                    order_id = %order.id,
                    user_id = %user_id,
                    items = order.items.len(),
                    units,
                    "Order placed"
                );
            }
            Err(e) => {
                self.metrics.order_rejected(e.kind(), started.elapsed());
                if e.is_internal() {
                    error!(actor = %identity, user_id = %user_id, error = %e, "Order placement failed");
                } else {
                    warn!(actor = %identity, user_id = %user_id, reason = e.kind(), error = %e, "Order rejected");
                }
            }
        }

        result
    }

    async fn place(&self, user_id: UserId, items: Vec<OrderItem>) -> Result<Order> {
        validate_items(&items)?;

        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ReservationError::not_found(Entity::User, user_id))?;

        let mut uow = self.store.begin().await?;

        for item in lock_order(&items) {
            let mut inventory = self.ledger.lock_and_get(&mut *uow, &item.product_id).await?;

            // Sees earlier lines of this order for the same product
            let available = inventory.available_stock();
            if available < item.quantity {
                return Err(ReservationError::InsufficientStock {
                    product_id: item.product_id,
                    available,
                    requested: item.quantity,
                });
            }

            inventory.reserved_stock += item.quantity;
            uow.save_inventory(&inventory).await?;
        }

        let order = uow.insert_order(NewOrder::new(user_id, items)).await?;
        uow.commit().await?;
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::users::MockUserDirectory;
    use crate::clients::StaticUserDirectory;
    use crate::store::memory::InMemoryStore;
    use crate::types::{Inventory, OrderStatus, User};
    use assert_matches::assert_matches;
    use futures::future::join_all;
    use std::time::Duration;

    const BOOK: &str = "SKU-BOOK-123";
    const MUG: &str = "SKU-MUG-456";

    fn shopper() -> Identity {
        Identity::new("shopper-1")
    }

    fn user(id: i64) -> User {
        User {
            id: UserId(id),
            email: format!("user{}@example.com", id),
            display_name: format!("User {}", id),
        }
    }

    fn stock(product_id: &str, total: i32, reserved: i32) -> Inventory {
        Inventory {
            product_id: product_id.to_string(),
            total_stock: total,
            reserved_stock: reserved,
        }
    }

    fn setup(records: Vec<Inventory>) -> (Arc<InMemoryStore>, ReservationCoordinator) {
        let store = Arc::new(InMemoryStore::with_inventory(records));
        let users = Arc::new(StaticUserDirectory::new(vec![user(1), user(2)]));
        let coordinator = ReservationCoordinator::new(store.clone(), users);
        (store, coordinator)
    }

    fn reserved(store: &InMemoryStore, product_id: &str) -> i32 {
        store.inventory_snapshot(product_id).unwrap().reserved_stock
    }

    #[tokio::test]
    async fn test_create_order_reserves_every_item() {
        let (store, coordinator) = setup(vec![stock(BOOK, 10, 3), stock(MUG, 5, 1)]);

        let items = vec![OrderItem::new(BOOK, 2), OrderItem::new(MUG, 1)];
        let order = coordinator
            .create_order(&shopper(), UserId(1), items.clone())
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_id, UserId(1));
        assert_eq!(order.items, items);
        assert_eq!(reserved(&store, BOOK), 5);
        assert_eq!(reserved(&store, MUG), 2);
        assert_eq!(store.order_count(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_earlier_items() {
        let (store, coordinator) = setup(vec![stock(BOOK, 10, 3), stock(MUG, 5, 1)]);

        let result = coordinator
            .create_order(
                &shopper(),
                UserId(1),
                vec![OrderItem::new(BOOK, 2), OrderItem::new(MUG, 10)],
            )
            .await;

        assert_matches!(
            result,
            Err(ReservationError::InsufficientStock { ref product_id, available: 4, requested: 10 })
                if product_id == MUG
        );
        assert_eq!(reserved(&store, BOOK), 3);
        assert_eq!(reserved(&store, MUG), 1);
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_items_rejected() {
        let (store, coordinator) = setup(vec![stock(BOOK, 10, 3)]);

        let result = coordinator.create_order(&shopper(), UserId(1), vec![]).await;
        assert_matches!(result, Err(ReservationError::InvalidInput(_)));
        assert_eq!(store.order_count(), 0);
    }

    #[tokio::test]
    async fn test_non_positive_quantity_rejected() {
        let (store, coordinator) = setup(vec![stock(BOOK, 10, 3)]);

        let result = coordinator
            .create_order(&shopper(), UserId(1), vec![OrderItem::new(BOOK, -1)])
            .await;
        assert_matches!(result, Err(ReservationError::InvalidInput(_)));
        assert_eq!(reserved(&store, BOOK), 3);
    }

    #[tokio::test]
    async fn test_unknown_product_aborts_whole_order() {
        let (store, coordinator) = setup(vec![stock(BOOK, 10, 0)]);

        let result = coordinator
            .create_order(
                &shopper(),
                UserId(1),
                vec![OrderItem::new(BOOK, 1), OrderItem::new("SKU-ZZZ", 1)],
            )
            .await;

        assert_matches!(
            result,
            Err(ReservationError::NotFound { entity: Entity::Product, .. })
        );
        assert_eq!(reserved(&store, BOOK), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected_before_locking() {
        let store = Arc::new(InMemoryStore::with_inventory(vec![stock(BOOK, 10, 0)]));
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_id()
            .withf(|id| *id == UserId(99))
            .times(1)
            .returning(|_| Ok(None));
        let coordinator = ReservationCoordinator::new(store.clone(), Arc::new(users));

        let result = coordinator
            .create_order(&shopper(), UserId(99), vec![OrderItem::new(BOOK, 1)])
            .await;

        assert_matches!(result, Err(ReservationError::NotFound { entity: Entity::User, .. }));
        assert_eq!(reserved(&store, BOOK), 0);
    }

    #[tokio::test]
    async fn test_user_lookup_failure_is_internal() {
        let store = Arc::new(InMemoryStore::with_inventory(vec![stock(BOOK, 10, 0)]));
        let mut users = MockUserDirectory::new();
        users
            .expect_find_by_id()
            .returning(|_| Err(ReservationError::Internal("directory offline".to_string())));
        let coordinator = ReservationCoordinator::new(store, Arc::new(users));

        let err = coordinator
            .create_order(&shopper(), UserId(1), vec![OrderItem::new(BOOK, 1)])
            .await
            .unwrap_err();
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn test_duplicate_items_checked_cumulatively() {
        let (store, coordinator) = setup(vec![stock(BOOK, 5, 0)]);

        let result = coordinator
            .create_order(
                &shopper(),
                UserId(1),
                vec![OrderItem::new(BOOK, 3), OrderItem::new(BOOK, 3)],
            )
            .await;
        assert_matches!(
            result,
            Err(ReservationError::InsufficientStock { available: 2, requested: 3, .. })
        );
        assert_eq!(reserved(&store, BOOK), 0);

        let order = coordinator
            .create_order(
                &shopper(),
                UserId(1),
                vec![OrderItem::new(BOOK, 3), OrderItem::new(BOOK, 2)],
            )
            .await
            .unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(reserved(&store, BOOK), 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_lock_orders_do_not_deadlock() {
        let (store, coordinator) = setup(vec![stock(BOOK, 1000, 0), stock(MUG, 1000, 0)]);
        let coordinator = Arc::new(coordinator);

        let tasks = (0..40).map(|i| {
            let coordinator = Arc::clone(&coordinator);
            let items = if i % 2 == 0 {
                vec![OrderItem::new(BOOK, 1), OrderItem::new(MUG, 2)]
            } else {
                vec![OrderItem::new(MUG, 2), OrderItem::new(BOOK, 1)]
            };
            tokio::spawn(async move {
                coordinator
                    .create_order(&Identity::new("shopper"), UserId(1 + i % 2), items)
                    .await
            })
        });

        let results = tokio::time::timeout(Duration::from_secs(10), join_all(tasks))
            .await
            .expect("concurrent orders deadlocked");

        for result in results {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(reserved(&store, BOOK), 40);
        assert_eq!(reserved(&store, MUG), 80);
        assert_eq!(store.order_count(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_never_oversell() {
        let (store, coordinator) = setup(vec![stock(MUG, 5, 0)]);
        let coordinator = Arc::new(coordinator);

        let tasks = (0..20).map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .create_order(&shopper(), UserId(1), vec![OrderItem::new(MUG, 1)])
                    .await
            })
        });

        let results: Vec<_> = join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let placed = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(ReservationError::InsufficientStock { .. })))
            .count();

        assert_eq!(placed, 5);
        assert_eq!(rejected, 15);
        let mug = store.inventory_snapshot(MUG).unwrap();
        assert_eq!(mug.reserved_stock, mug.total_stock);
    }
}

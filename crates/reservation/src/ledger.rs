//! Inventory ledger
//!
//! Reads and administrative writes of inventory records. Reservation and
//! release go through [`InventoryLedger::lock_and_get`] inside the caller's
//! unit of work.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{Entity, ReservationError, Result};
use crate::identity::{Identity, INVENTORY_ADMIN_ROLE};
use crate::store::{Store, UnitOfWork};
use crate::types::Inventory;

/// Inventory ledger
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn Store>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Current values of a product, without locking
    pub async fn get(&self, product_id: &str) -> Result<Inventory> {
        let mut uow = self.store.begin().await?;
        let inventory = uow.find_inventory(product_id).await?;
        uow.rollback().await?;
        inventory.ok_or_else(|| ReservationError::not_found(Entity::Product, product_id))
    }

    /// Exclusively lock a product for the rest of `uow` and return its values.
    ///
    /// Suspends while another unit of work holds the record. Locking twice in
    /// the same unit of work returns immediately.
    pub async fn lock_and_get(&self, uow: &mut dyn UnitOfWork, product_id: &str) -> Result<Inventory> {
        let inventory = uow.lock_inventory(product_id).await?;
        debug!(product_id, "Inventory locked");
        inventory.ok_or_else(|| ReservationError::not_found(Entity::Product, product_id))
    }

    /// Create a product or replace its total stock.
    ///
    /// New products start with nothing reserved. An existing reservation is
    /// kept as is; a total below it is rejected. The caller must hold the
    /// inventory admin role.
    pub async fn upsert(&self, identity: &Identity, product_id: &str, total_stock: i32) -> Result<Inventory> {
        if !identity.has_role(INVENTORY_ADMIN_ROLE) {
            warn!(actor = %identity, product_id, "Inventory upsert refused");
            return Err(ReservationError::Forbidden(format!(
                "inventory upsert requires role {}",
                INVENTORY_ADMIN_ROLE
            )));
        }
        if product_id.trim().is_empty() {
            return Err(ReservationError::InvalidInput("Product ID is required".to_string()));
        }
        if total_stock < 0 {
            return Err(ReservationError::InvalidInput(format!(
                "Total stock must be non-negative, got {}",
                total_stock
            )));
        }

        let mut uow = self.store.begin().await?;
        let inventory = match uow.lock_inventory(product_id).await? {
            Some(mut existing) => {
                if existing.reserved_stock < 0 {
                    warn!(
                        product_id,
                        reserved_stock = existing.reserved_stock,
                        "Negative reserved stock reset to 0"
                    );
                    existing.reserved_stock = 0;
                }
                if total_stock < existing.reserved_stock {
                    return Err(ReservationError::InvalidInput(format!(
                        "Total stock {} is below reserved stock {} for product {}",
                        total_stock, existing.reserved_stock, product_id
                    )));
                }
                existing.total_stock = total_stock;
                existing
            }
            None => Inventory::new(product_id, total_stock),
        };

        let saved = uow.save_inventory(&inventory).await?;
        uow.commit().await?;

        info!(
            actor = %identity,
            product_id,
            total_stock = saved.total_stock,
            reserved_stock = saved.reserved_stock,
            "Inventory updated"
        );
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;
    use assert_matches::assert_matches;

    fn clerk() -> Identity {
        Identity::new("clerk").with_roles([INVENTORY_ADMIN_ROLE])
    }

    fn ledger_with(records: Vec<Inventory>) -> (Arc<InMemoryStore>, InventoryLedger) {
        let store = Arc::new(InMemoryStore::with_inventory(records));
        (store.clone(), InventoryLedger::new(store))
    }

    #[tokio::test]
    async fn test_get_missing_product() {
        let (_, ledger) = ledger_with(vec![]);
        let result = ledger.get("SKU-NONE").await;
        assert_matches!(
            result,
            Err(ReservationError::NotFound { entity: Entity::Product, .. })
        );
    }

    #[tokio::test]
    async fn test_upsert_creates_with_zero_reserved() {
        let (_, ledger) = ledger_with(vec![]);

        let created = ledger.upsert(&clerk(), "SKU-LAMP-9", 12).await.unwrap();
        assert_eq!(created, Inventory::new("SKU-LAMP-9", 12));
        assert_eq!(ledger.get("SKU-LAMP-9").await.unwrap().available_stock(), 12);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_keeps_reservation() {
        let (_, ledger) = ledger_with(vec![Inventory {
            product_id: "SKU-BOOK-123".to_string(),
            total_stock: 10,
            reserved_stock: 3,
        }]);

        ledger.upsert(&clerk(), "SKU-BOOK-123", 25).await.unwrap();
        let second = ledger.upsert(&clerk(), "SKU-BOOK-123", 25).await.unwrap();

        assert_eq!(second.total_stock, 25);
        assert_eq!(second.reserved_stock, 3);
    }

    #[tokio::test]
    async fn test_upsert_clamps_negative_reserved() {
        let (store, ledger) = ledger_with(vec![Inventory {
            product_id: "SKU-X".to_string(),
            total_stock: 4,
            reserved_stock: -2,
        }]);

        let saved = ledger.upsert(&clerk(), "SKU-X", 4).await.unwrap();
        assert_eq!(saved.reserved_stock, 0);
        assert_eq!(store.inventory_snapshot("SKU-X").unwrap().reserved_stock, 0);
    }

    #[tokio::test]
    async fn test_upsert_rejects_bad_input() {
        let (store, ledger) = ledger_with(vec![Inventory {
            product_id: "SKU-MUG-456".to_string(),
            total_stock: 5,
            reserved_stock: 4,
        }]);

        assert_matches!(
            ledger.upsert(&clerk(), "SKU-MUG-456", -1).await,
            Err(ReservationError::InvalidInput(_))
        );
        assert_matches!(
            ledger.upsert(&clerk(), "  ", 3).await,
            Err(ReservationError::InvalidInput(_))
        );
        assert_matches!(
            ledger.upsert(&clerk(), "SKU-MUG-456", 3).await,
            Err(ReservationError::InvalidInput(_))
        );
        assert_eq!(store.inventory_snapshot("SKU-MUG-456").unwrap().total_stock, 5);
    }

    #[tokio::test]
    async fn test_upsert_requires_admin_role() {
        let (store, ledger) = ledger_with(vec![Inventory::new("SKU-MUG-456", 5)]);

        let shopper = Identity::new("shopper").with_roles(["customer"]);
        assert_matches!(
            ledger.upsert(&shopper, "SKU-MUG-456", 50).await,
            Err(ReservationError::Forbidden(_))
        );
        assert_matches!(
            ledger.upsert(&Identity::new("anonymous-clerk"), "SKU-NEW", 1).await,
            Err(ReservationError::Forbidden(_))
        );
        assert_eq!(store.inventory_snapshot("SKU-MUG-456").unwrap().total_stock, 5);
        assert!(store.inventory_snapshot("SKU-NEW").is_none());
    }

    #[tokio::test]
    async fn test_lock_and_get_is_reentrant() {
        let (store, ledger) = ledger_with(vec![Inventory::new("SKU-1", 3)]);

        let mut uow = store.begin().await.unwrap();
        let first = ledger.lock_and_get(&mut *uow, "SKU-1").await.unwrap();
        let second = ledger.lock_and_get(&mut *uow, "SKU-1").await.unwrap();
        assert_eq!(first, second);

        assert_matches!(
            ledger.lock_and_get(&mut *uow, "SKU-2").await,
            Err(ReservationError::NotFound { .. })
        );
    }
}

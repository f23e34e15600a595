//! PostgreSQL store implementation
//!
//! One database transaction per unit of work. Record locks are row locks
//! (`SELECT ... FOR UPDATE`). Locking a product that has no row yet takes a
//! transaction-scoped advisory lock on its 64-bit key hash and re-reads, so
//! concurrent creation of the same product is still serialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::store::error::StoreError;
use crate::store::traits::{Store, StoreResult, UnitOfWork};
use crate::types::{Inventory, NewOrder, Order, OrderId, OrderItem, OrderStatus, UserId};

const LOCK_INVENTORY_ROW: &str = r#"
    SELECT product_id, total_stock, reserved_stock
    FROM inventory
    WHERE product_id = $1
    FOR UPDATE
"#;

const LOCK_MISSING_INVENTORY: &str =
    "SELECT pg_advisory_xact_lock(hashtextextended('inventory:' || $1, 0))";

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&*self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Shared connection pool
    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork {
            tx: Some(tx),
            locked_inventory: HashSet::new(),
            locked_orders: HashSet::new(),
        }))
    }
}

/// Unit of work over a single PostgreSQL transaction.
///
/// Dropping it without commit drops the transaction, which rolls back.
pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
    locked_inventory: HashSet<String>,
    locked_orders: HashSet<OrderId>,
}

impl PgUnitOfWork {
    fn conn(&mut self) -> StoreResult<&mut PgConnection> {
        match self.tx.as_mut() {
            Some(tx) => Ok(&mut **tx),
            None => Err(StoreError::Database("transaction already finished".to_string())),
        }
    }

    async fn load_items(&mut self, order_id: OrderId) -> StoreResult<Vec<OrderItem>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity
            FROM order_items
            WHERE order_id = $1
            ORDER BY position
            "#,
        )
        .bind(order_id.0)
        .fetch_all(self.conn()?)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<OrderItem> {
                Ok(OrderItem {
                    product_id: row.try_get("product_id")?,
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    async fn load_order(&mut self, order_id: OrderId, for_update: bool) -> StoreResult<Option<Order>> {
        let sql = if for_update {
            "SELECT id, user_id, status, created_at, updated_at FROM orders WHERE id = $1 FOR UPDATE"
        } else {
            "SELECT id, user_id, status, created_at, updated_at FROM orders WHERE id = $1"
        };
        let row = sqlx::query(sql)
            .bind(order_id.0)
            .fetch_optional(self.conn()?)
            .await?;

        match row {
            Some(row) => {
                let items = self.load_items(order_id).await?;
                Ok(Some(row_to_order(&row, items)?))
            }
            None => Ok(None),
        }
    }
}

fn row_to_inventory(row: &PgRow) -> StoreResult<Inventory> {
    Ok(Inventory {
        product_id: row.try_get("product_id")?,
        total_stock: row.try_get("total_stock")?,
        reserved_stock: row.try_get("reserved_stock")?,
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> StoreResult<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        status,
        items,
        created_at,
        updated_at,
    })
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_inventory(&mut self, product_id: &str) -> StoreResult<Option<Inventory>> {
        let row = sqlx::query(
            "SELECT product_id, total_stock, reserved_stock FROM inventory WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(self.conn()?)
        .await?;

        row.as_ref().map(row_to_inventory).transpose()
    }

    async fn lock_inventory(&mut self, product_id: &str) -> StoreResult<Option<Inventory>> {
        debug!(product_id, "Waiting for inventory lock");
        let row = sqlx::query(LOCK_INVENTORY_ROW)
            .bind(product_id)
            .fetch_optional(self.conn()?)
            .await?;

        let row = match row {
            Some(row) => Some(row),
            None => {
                // No row to lock; serialize creation of this product instead
                sqlx::query(LOCK_MISSING_INVENTORY)
                    .bind(product_id)
                    .execute(self.conn()?)
                    .await?;
                sqlx::query(LOCK_INVENTORY_ROW)
                    .bind(product_id)
                    .fetch_optional(self.conn()?)
                    .await?
            }
        };
        self.locked_inventory.insert(product_id.to_string());

        row.as_ref().map(row_to_inventory).transpose()
    }

    async fn save_inventory(&mut self, inventory: &Inventory) -> StoreResult<Inventory> {
        if !self.locked_inventory.contains(&inventory.product_id) {
            return Err(StoreError::LockNotHeld(format!(
                "inventory:{}",
                inventory.product_id
            )));
        }

        let row = sqlx::query(
            r#"
            INSERT INTO inventory (product_id, total_stock, reserved_stock)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) DO UPDATE
            SET total_stock = EXCLUDED.total_stock,
                reserved_stock = EXCLUDED.reserved_stock
            RETURNING product_id, total_stock, reserved_stock
            "#,
        )
        .bind(&inventory.product_id)
        .bind(inventory.total_stock)
        .bind(inventory.reserved_stock)
        .fetch_one(self.conn()?)
        .await?;

        row_to_inventory(&row)
    }

    async fn find_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>> {
        self.load_order(order_id, false).await
    }

    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>> {
        debug!(order_id = %order_id, "Waiting for order lock");
        let order = self.load_order(order_id, true).await?;
        if order.is_some() {
            self.locked_orders.insert(order_id);
        }
        Ok(order)
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (user_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $3)
            RETURNING id
            "#,
        )
        .bind(order.user_id.0)
        .bind(OrderStatus::Pending.as_str())
        .bind(order.created_at)
        .fetch_one(self.conn()?)
        .await?;
        let order_id = OrderId(row.try_get("id")?);

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, position, product_id, quantity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id.0)
            .bind(position as i32)
            .bind(&item.product_id)
            .bind(item.quantity)
            .execute(self.conn()?)
            .await?;
        }

        self.locked_orders.insert(order_id);
        Ok(order.into_order(order_id))
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<Order> {
        if !self.locked_orders.contains(&order.id) {
            return Err(StoreError::LockNotHeld(format!("order:{}", order.id)));
        }

        let result = sqlx::query("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(order.status.as_str())
            .bind(order.updated_at)
            .bind(order.id.0)
            .execute(self.conn()?)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(format!("order {}", order.id)));
        }
        Ok(order.clone())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        match self.tx.take() {
            Some(tx) => {
                tx.commit().await?;
                Ok(())
            }
            None => Err(StoreError::Database("transaction already finished".to_string())),
        }
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_inventory_lock_uses_64_bit_key() {
        assert!(LOCK_MISSING_INVENTORY.contains("pg_advisory_xact_lock"));
        assert!(LOCK_MISSING_INVENTORY.contains("hashtextextended("));
        assert!(!LOCK_MISSING_INVENTORY.contains("hashtext("));
    }

    #[test]
    fn test_inventory_row_lock_is_for_update() {
        assert!(LOCK_INVENTORY_ROW.contains("FOR UPDATE"));
        assert!(!LOCK_INVENTORY_ROW.contains("advisory"));
    }
}

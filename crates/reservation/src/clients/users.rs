//! User directory - trait and implementations

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::types::{User, UserId};

/// Lookup of users known to the system
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id. `Ok(None)` when the user does not exist.
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>>;
}

// ==================== Static Implementation ====================

/// Fixed set of users, loaded from configuration at start-up
#[derive(Debug, Default, Clone)]
pub struct StaticUserDirectory {
    users: HashMap<UserId, User>,
}

impl StaticUserDirectory {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&user_id).cloned())
    }
}

// ==================== PostgreSQL Implementation ====================

#[cfg(feature = "postgres")]
pub use self::postgres::PostgresUserDirectory;

#[cfg(feature = "postgres")]
mod postgres {
    use async_trait::async_trait;
    use sqlx::{postgres::PgPool, Row};
    use std::sync::Arc;

    use super::UserDirectory;
    use crate::error::Result;
    use crate::store::StoreError;
    use crate::types::{User, UserId};

    /// Users read from the `users` table
    pub struct PostgresUserDirectory {
        pool: Arc<PgPool>,
    }

    impl PostgresUserDirectory {
        pub fn new(pool: Arc<PgPool>) -> Self {
            Self { pool }
        }
    }

    #[async_trait]
    impl UserDirectory for PostgresUserDirectory {
        async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>> {
            let row = sqlx::query("SELECT id, email, display_name FROM users WHERE id = $1")
                .bind(user_id.0)
                .fetch_optional(&*self.pool)
                .await
                .map_err(StoreError::from)?;

            match row {
                Some(row) => Ok(Some(User {
                    id: UserId(row.try_get("id").map_err(StoreError::from)?),
                    email: row.try_get("email").map_err(StoreError::from)?,
                    display_name: row.try_get("display_name").map_err(StoreError::from)?,
                })),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        User {
            id: UserId(1),
            email: "alice@example.com".to_string(),
            display_name: "Alice".to_string(),
        }
    }

    #[tokio::test]
    async fn test_static_directory_lookup() {
        let directory = StaticUserDirectory::new(vec![alice()]);

        assert_eq!(directory.len(), 1);
        assert_eq!(directory.find_by_id(UserId(1)).await.unwrap(), Some(alice()));
        assert_eq!(directory.find_by_id(UserId(2)).await.unwrap(), None);
    }
}

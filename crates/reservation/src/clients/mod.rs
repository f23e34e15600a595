//! Collaborator clients consumed by the reservation core

pub mod users;

pub use users::{StaticUserDirectory, UserDirectory};

#[cfg(feature = "postgres")]
pub use users::PostgresUserDirectory;

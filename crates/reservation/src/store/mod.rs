//! Store module exports

pub mod error;
pub mod traits;
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::StoreError;
pub use traits::{Store, StoreResult, UnitOfWork};

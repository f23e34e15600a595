//! HTTP API for orders and inventory

pub mod auth;
pub mod handlers;
pub mod models;
pub mod routes;

pub use auth::{RequireIdentity, ROLES_HEADER, SUBJECT_HEADER};
pub use handlers::ReservationApiState;
pub use routes::create_router;

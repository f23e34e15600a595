//! API routes for orders and inventory
//!
//! `GET` routes are public. Every `POST` route requires an authenticated
//! caller (see [`RequireIdentity`](crate::api::RequireIdentity)).

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers::*;

/// Create the reservation router
pub fn create_router(state: Arc<ReservationApiState>) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/confirm", post(confirm_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .route(
            "/inventory/:product_id",
            get(get_inventory).post(upsert_inventory),
        )
        .with_state(state)
}

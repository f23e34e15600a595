//! API handlers for reservation HTTP endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::api::auth::RequireIdentity;
use crate::api::models::*;
use crate::ledger::InventoryLedger;
use crate::lifecycle::OrderLifecycle;
use crate::types::{OrderId, OrderItem, UserId};
use crate::worker::ReservationPool;

pub struct ReservationApiState {
    pub pool: Arc<ReservationPool>,
    pub lifecycle: Arc<OrderLifecycle>,
    pub ledger: InventoryLedger,
}

fn parse_order_id(path: Result<Path<i64>, PathRejection>) -> ApiResult<OrderId> {
    let Path(id) = path.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", e.body_text(), None)
    })?;
    Ok(OrderId(id))
}

/// Place order handler
pub async fn create_order(
    State(state): State<Arc<ReservationApiState>>,
    RequireIdentity(identity): RequireIdentity,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = body.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", e.body_text(), None)
    })?;

    let items: Vec<OrderItem> = req.items.into_iter().map(OrderItem::from).collect();
    let order = state
        .pool
        .submit(identity, UserId(req.user_id), items)
        .await?
        .await?;

    let location = format!("/orders/{}", order.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(OrderResponse::from(order)),
    ))
}

/// Get order handler
pub async fn get_order(
    State(state): State<Arc<ReservationApiState>>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let order_id = parse_order_id(path)?;
    let order = state.lifecycle.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// Confirm order handler
pub async fn confirm_order(
    State(state): State<Arc<ReservationApiState>>,
    RequireIdentity(identity): RequireIdentity,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let order_id = parse_order_id(path)?;
    let order = state.lifecycle.confirm(&identity, order_id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// Cancel order handler
pub async fn cancel_order(
    State(state): State<Arc<ReservationApiState>>,
    RequireIdentity(identity): RequireIdentity,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<OrderResponse>> {
    let order_id = parse_order_id(path)?;
    let order = state.lifecycle.cancel(&identity, order_id).await?;
    Ok(Json(OrderResponse::from(order)))
}

/// Get inventory handler
pub async fn get_inventory(
    State(state): State<Arc<ReservationApiState>>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<InventoryResponse>> {
    let inventory = state.ledger.get(&product_id).await?;
    Ok(Json(InventoryResponse::from(inventory)))
}

/// Create or update inventory handler
pub async fn upsert_inventory(
    State(state): State<Arc<ReservationApiState>>,
    RequireIdentity(identity): RequireIdentity,
    Path(product_id): Path<String>,
    params: Result<Query<UpsertInventoryParams>, QueryRejection>,
) -> ApiResult<Json<InventoryResponse>> {
    let Query(params) = params.map_err(|e| {
        api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", e.body_text(), None)
    })?;

    let inventory = state
        .ledger
        .upsert(&identity, &product_id, params.total_stock)
        .await?;
    Ok(Json(InventoryResponse::from(inventory)))
}

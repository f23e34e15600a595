//! API models for reservation HTTP endpoints

use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::error::ReservationError;
use crate::types::{Inventory, Order, OrderItem, OrderStatus};

/// Request to place a new order
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: i64,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

/// One line of an order request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: i32,
}

impl From<OrderItemRequest> for OrderItem {
    fn from(item: OrderItemRequest) -> Self {
        OrderItem::new(item.product_id, item.quantity)
    }
}

/// Order line in API responses
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: i32,
}

/// Single order in API responses
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.0,
            user_id: order.user_id.0,
            status: order.status,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

/// Inventory record in API responses
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    pub product_id: String,
    pub total_stock: i32,
    pub reserved_stock: i32,
    pub available_stock: i32,
}

impl From<Inventory> for InventoryResponse {
    fn from(inventory: Inventory) -> Self {
        Self {
            available_stock: inventory.available_stock(),
            product_id: inventory.product_id,
            total_stock: inventory.total_stock,
            reserved_stock: inventory.reserved_stock,
        }
    }
}

/// Query parameters of `POST /inventory/{productId}`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertInventoryParams {
    pub total_stock: i32,
}

/// Error detail
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

/// Generic error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

/// Error half of every handler result
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Result type for API handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Build an error response
pub fn api_error(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                details,
            },
        }),
    )
}

impl From<ReservationError> for (StatusCode, Json<ErrorResponse>) {
    fn from(e: ReservationError) -> Self {
        let message = e.to_string();
        match e {
            ReservationError::InvalidInput(_) => {
                api_error(StatusCode::BAD_REQUEST, "INVALID_INPUT", message, None)
            }
            ReservationError::Forbidden(_) => {
                api_error(StatusCode::FORBIDDEN, "FORBIDDEN", message, None)
            }
            ReservationError::NotFound { entity, id } => api_error(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                message,
                Some(json!({ "entity": entity.to_string(), "id": id })),
            ),
            ReservationError::InsufficientStock {
                product_id,
                available,
                requested,
            } => api_error(
                StatusCode::CONFLICT,
                "INSUFFICIENT_STOCK",
                message,
                Some(json!({
                    "productId": product_id,
                    "available": available,
                    "requested": requested,
                })),
            ),
            ReservationError::InvalidState {
                order_id,
                current,
                expected,
            } => api_error(
                StatusCode::CONFLICT,
                "INVALID_STATE",
                message,
                Some(json!({
                    "orderId": order_id.0,
                    "current": current,
                    "expected": expected,
                })),
            ),
            ReservationError::Unavailable(_) => api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "service unavailable",
                None,
            ),
            ReservationError::Storage(_) | ReservationError::Internal(_) => {
                error!(error = %message, "Request failed with internal error");
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error",
                    None,
                )
            }
        }
    }
}

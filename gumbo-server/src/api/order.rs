//! Order endpoints: placement, lookup, and the consumer-visible list
//!
//! Placement does shape validation only: no pricing, no catalog lookup,
//! no coupon check. The request is persisted to the queue and a tracking
//! handle comes back with 202; the worker realizes it asynchronously.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{OrderRequest, QueueItem, QueueStatus};

use crate::db;
use crate::state::AppState;

use super::ApiResult;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderResponse {
    pub message: &'static str,
    pub queue_item_id: Uuid,
    pub status: QueueStatus,
}

/// POST /api/v1/order
pub async fn place_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), AppError> {
    let Json(order_req) = payload.map_err(|_| AppError::new(ErrorCode::InvalidRequest))?;

    order_req.validate()?;

    let item = db::queue::enqueue(&state.pool, &order_req).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PlaceOrderResponse {
            message: "Order queued for processing",
            queue_item_id: item.id,
            status: item.status,
        }),
    ))
}

/// GET /api/v1/order/{order_id}
///
/// The queue-item view is primary: a completed item answers with its
/// realized order, an in-flight item answers with its tracking state.
/// Ids that predate the queue fall back to the order table.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Response, AppError> {
    let id: Uuid = order_id
        .parse()
        .map_err(|_| AppError::new(ErrorCode::OrderNotFound))?;

    if let Some(item) = db::queue::lookup(&state.pool, id).await? {
        if let Some(order) = item.order {
            return Ok(Json(order).into_response());
        }
        return Ok(Json(item).into_response());
    }

    match db::orders::find(&state.pool, id).await? {
        Some(order) => Ok(Json(order).into_response()),
        None => Err(AppError::new(ErrorCode::OrderNotFound)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryItem {
    pub product_id: String,
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: Uuid,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub customer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    pub items: Vec<SummaryItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<OrderSummary>,
    pub stats: HashMap<String, i64>,
    pub message: &'static str,
}

/// GET /api/v1/order
pub async fn list_orders(State(state): State<AppState>) -> ApiResult<ListOrdersResponse> {
    let items = db::queue::list_all(&state.pool).await?;

    let stats = match db::queue::stats(&state.pool).await {
        Ok(stats) => stats,
        Err(e) => {
            // The list is still useful without aggregate counts
            tracing::warn!(error = %e, "Failed to load queue stats");
            HashMap::new()
        }
    };

    Ok(Json(ListOrdersResponse {
        orders: items.into_iter().map(summarize).collect(),
        stats,
        message: "Orders retrieved successfully",
    }))
}

/// Project a queue item to the display shape: realized items carry their
/// captured prices and total, unrealized ones echo the requested lines.
fn summarize(item: QueueItem) -> OrderSummary {
    let error = match item.status {
        QueueStatus::Failed => item.error,
        _ => None,
    };

    let (total, items) = match &item.order {
        Some(order) => (
            Some(order.total),
            order
                .items
                .iter()
                .map(|line| SummaryItem {
                    product_id: line.product_id.to_string(),
                    quantity: line.quantity as i64,
                    price: Some(line.price),
                })
                .collect(),
        ),
        None => (
            None,
            item.order_req
                .items
                .iter()
                .map(|line| SummaryItem {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity,
                    price: None,
                })
                .collect(),
        ),
    };

    OrderSummary {
        id: item.id,
        status: item.status,
        created_at: item.created_at,
        updated_at: item.updated_at,
        customer: "Guest",
        total,
        items,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Order, PricedItem, RequestedItem};

    const PRODUCT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn item(product_id: &str, quantity: i64) -> RequestedItem {
        RequestedItem {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn queue_item(status: QueueStatus, order: Option<Order>) -> QueueItem {
        QueueItem {
            id: Uuid::new_v4(),
            order_req: OrderRequest {
                coupon_code: None,
                items: vec![item(PRODUCT_ID, 3)],
            },
            status,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            error: Some("product not found".to_string()),
            order,
            retry_count: 0,
        }
    }

    #[test]
    fn test_summarize_pending_item() {
        let summary = summarize(queue_item(QueueStatus::Pending, None));
        assert_eq!(summary.status, QueueStatus::Pending);
        assert!(summary.total.is_none());
        assert_eq!(summary.items.len(), 1);
        assert_eq!(summary.items[0].quantity, 3);
        assert!(summary.items[0].price.is_none());
        // error only surfaces on failed items
        assert!(summary.error.is_none());
    }

    #[test]
    fn test_summarize_completed_item_uses_realized_order() {
        let product_id: Uuid = PRODUCT_ID.parse().unwrap();
        let order = Order {
            id: Uuid::new_v4(),
            total: 37.5,
            discounts: 0.0,
            items: vec![PricedItem {
                product_id,
                quantity: 3,
                price: 12.5,
            }],
            products: vec![],
        };
        let summary = summarize(queue_item(QueueStatus::Completed, Some(order)));
        assert_eq!(summary.total, Some(37.5));
        assert_eq!(summary.items[0].price, Some(12.5));
    }

    #[test]
    fn test_summarize_failed_item_carries_error() {
        let summary = summarize(queue_item(QueueStatus::Failed, None));
        assert_eq!(summary.error.as_deref(), Some("product not found"));
    }
}

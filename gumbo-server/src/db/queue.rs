//! Durable order queue operations
//!
//! The queue table is the only hand-off point between the ingestion path
//! and the worker pool. All status mutation flows through these functions;
//! row-level locks in `claim_batch` are the concurrency source of truth,
//! no in-process mutex is involved.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use shared::models::{MAX_RETRIES, Order, OrderRequest, QueueItem};

use crate::error::{ServiceError, ServiceResult};

/// Rows stuck in `processing` longer than this are considered abandoned by
/// a crashed worker and become claimable again.
pub const LEASE_TTL: Duration = Duration::from_secs(120);

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: Uuid,
    order_req: serde_json::Value,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    error: Option<String>,
    order_data: Option<serde_json::Value>,
    retry_count: i32,
}

impl QueueRow {
    fn into_item(self) -> ServiceResult<QueueItem> {
        let order_req: OrderRequest = serde_json::from_value(self.order_req)?;
        let status = self
            .status
            .parse()
            .map_err(|e: String| ServiceError::Infra(e.into()))?;

        // Tolerate unreadable order payloads: the row is still useful for
        // status display, and completed rows are never reprocessed.
        let order: Option<Order> = self
            .order_data
            .and_then(|v| serde_json::from_value(v).ok());

        Ok(QueueItem {
            id: self.id,
            order_req,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
            error: self.error,
            order,
            retry_count: self.retry_count,
        })
    }
}

/// Insert a new pending queue item for an accepted request.
pub async fn enqueue(pool: &PgPool, order_req: &OrderRequest) -> ServiceResult<QueueItem> {
    let id = Uuid::new_v4();
    let req_json = serde_json::to_value(order_req)?;

    let row: QueueRow = sqlx::query_as(
        r#"
        INSERT INTO order_queue (id, order_req, status)
        VALUES ($1, $2, 'pending')
        RETURNING id, order_req, status, created_at, updated_at, error, order_data, retry_count
        "#,
    )
    .bind(id)
    .bind(&req_json)
    .fetch_one(pool)
    .await?;

    row.into_item()
}

/// Atomically claim up to `batch_size` processable items and transition
/// them to `processing`.
///
/// Claimable rows are pending, failed with retries remaining, or
/// processing past the worker lease. The locking SELECT and the status
/// UPDATE run as one statement, so two concurrent claimants always
/// receive disjoint sets; `SKIP LOCKED` steps over rows another claimant
/// holds.
pub async fn claim_batch(pool: &PgPool, batch_size: i64) -> ServiceResult<Vec<QueueItem>> {
    let rows: Vec<QueueRow> = sqlx::query_as(
        r#"
        WITH picked AS (
            SELECT id
            FROM order_queue
            WHERE status = 'pending'
               OR (status = 'failed' AND retry_count < $2)
               OR (status = 'processing' AND updated_at < now() - make_interval(secs => $3))
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE order_queue AS q
        SET status = 'processing', updated_at = now()
        FROM picked
        WHERE q.id = picked.id
        RETURNING q.id, q.order_req, q.status, q.created_at, q.updated_at,
                  q.error, q.order_data, q.retry_count
        "#,
    )
    .bind(batch_size)
    .bind(MAX_RETRIES)
    .bind(LEASE_TTL.as_secs_f64())
    .fetch_all(pool)
    .await?;

    let mut items = rows
        .into_iter()
        .map(QueueRow::into_item)
        .collect::<ServiceResult<Vec<_>>>()?;
    items.sort_by_key(|item| item.created_at);
    Ok(items)
}

/// Transition an item to `completed`, storing the realized order.
///
/// The queue row and the denormalized order tables are written in one
/// transaction. Replays are harmless: the order insert is
/// `ON CONFLICT DO NOTHING`, so captured prices are never overwritten.
pub async fn mark_completed(pool: &PgPool, id: Uuid, order: &Order) -> ServiceResult<()> {
    let order_json = serde_json::to_value(order)?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE order_queue
        SET status = 'completed', updated_at = now(), order_data = $2, error = NULL
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(&order_json)
    .execute(&mut *tx)
    .await?;

    let inserted: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO orders (id, total, discounts)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(id)
    .bind(order.total)
    .bind(order.discounts)
    .fetch_optional(&mut *tx)
    .await?;

    if inserted.is_some() {
        for item in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price_at_time)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(id)
            .bind(item.product_id)
            .bind(item.quantity as i32)
            .bind(item.price)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Transition an item to `failed` and bump its retry count. Returns the
/// new retry count so callers can log permanent failures.
pub async fn mark_failed(pool: &PgPool, id: Uuid, error_msg: &str) -> ServiceResult<i32> {
    let row: (i32,) = sqlx::query_as(
        r#"
        UPDATE order_queue
        SET status = 'failed', updated_at = now(), error = $2, retry_count = retry_count + 1
        WHERE id = $1
        RETURNING retry_count
        "#,
    )
    .bind(id)
    .bind(error_msg)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

/// Full queue item state by id.
pub async fn lookup(pool: &PgPool, id: Uuid) -> ServiceResult<Option<QueueItem>> {
    let row: Option<QueueRow> = sqlx::query_as(
        r#"
        SELECT id, order_req, status, created_at, updated_at, error, order_data, retry_count
        FROM order_queue
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(QueueRow::into_item).transpose()
}

/// Newest-first enumeration for the consumer-visible orders view.
pub async fn list_all(pool: &PgPool) -> ServiceResult<Vec<QueueItem>> {
    let rows: Vec<QueueRow> = sqlx::query_as(
        r#"
        SELECT id, order_req, status, created_at, updated_at, error, order_data, retry_count
        FROM order_queue
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(QueueRow::into_item).collect()
}

/// Count of queue items per status.
pub async fn stats(pool: &PgPool) -> ServiceResult<HashMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*)
        FROM order_queue
        GROUP BY status
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::models::QueueStatus;

    fn row(status: &str, order_data: Option<serde_json::Value>) -> QueueRow {
        QueueRow {
            id: Uuid::new_v4(),
            order_req: json!({
                "couponCode": "HAPPYHRS",
                "items": [{"productId": "550e8400-e29b-41d4-a716-446655440000", "quantity": 2}]
            }),
            status: status.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            error: None,
            order_data,
            retry_count: 0,
        }
    }

    #[test]
    fn test_row_into_item() {
        let item = row("pending", None).into_item().unwrap();
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.order_req.coupon_code.as_deref(), Some("HAPPYHRS"));
        assert_eq!(item.order_req.items[0].quantity, 2);
        assert!(item.order.is_none());
    }

    #[test]
    fn test_row_with_order_payload() {
        let id = Uuid::new_v4();
        let order = json!({
            "id": id,
            "total": 25.0,
            "discounts": 2.5,
            "items": [{"productId": "550e8400-e29b-41d4-a716-446655440000", "quantity": 2, "price": 12.5}],
            "products": []
        });
        let item = row("completed", Some(order)).into_item().unwrap();
        assert_eq!(item.status, QueueStatus::Completed);
        let realized = item.order.unwrap();
        assert_eq!(realized.total, 25.0);
        assert_eq!(realized.discounts, 2.5);
    }

    #[test]
    fn test_row_with_garbage_order_payload_is_tolerated() {
        let item = row("completed", Some(json!("not an order"))).into_item().unwrap();
        assert!(item.order.is_none());
    }

    #[test]
    fn test_row_with_unknown_status_fails() {
        assert!(row("archived", None).into_item().is_err());
    }
}

//! Denormalized order table queries
//!
//! Completed orders are written here (transactionally, alongside the queue
//! row) and read back for ids that predate their queue rows.

use sqlx::PgPool;
use uuid::Uuid;

use shared::models::{Order, PricedItem};

use crate::error::ServiceResult;

/// Reassemble a realized order from the denormalized tables. Product
/// snapshots are re-joined from the catalog; rows deleted from the catalog
/// since completion are simply absent.
pub async fn find(pool: &PgPool, id: Uuid) -> ServiceResult<Option<Order>> {
    let header: Option<(f64, f64)> = sqlx::query_as(
        r#"
        SELECT total, discounts
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let Some((total, discounts)) = header else {
        return Ok(None);
    };

    let item_rows: Vec<(Uuid, i32, f64)> = sqlx::query_as(
        r#"
        SELECT product_id, quantity, price_at_time
        FROM order_items
        WHERE order_id = $1
        ORDER BY id
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let product_ids: Vec<Uuid> = item_rows.iter().map(|(pid, _, _)| *pid).collect();
    let products = super::products::find_many(pool, &product_ids).await?;

    let items = item_rows
        .into_iter()
        .map(|(product_id, quantity, price)| PricedItem {
            product_id,
            quantity: quantity.max(0) as u32,
            price,
        })
        .collect();

    Ok(Some(Order {
        id,
        total,
        discounts,
        items,
        products,
    }))
}

//! Queue worker pool and order realization
//!
//! A worker wakes on a fixed cadence, claims a batch of processable queue
//! items (the claim itself transitions them to `processing`), and realizes
//! each one: validate, resolve products, capture prices, apply any
//! recognized discount, persist the result. Failures bump the retry count;
//! the claim query re-picks items with retries remaining on later ticks.
//!
//! The worker only sees the catalog and the coupon set through the narrow
//! [`ProductCatalog`] and [`CouponCheck`] seams.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use shared::error::{AppError, ErrorCode};
use shared::models::{MAX_RETRIES, Order, PricedItem, Product, QueueItem};

use crate::coupons::CouponStore;
use crate::db;
use crate::error::ServiceResult;

/// Read-only product resolution used during realization.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn find(&self, id: Uuid) -> ServiceResult<Option<Product>>;
}

/// Catalog backed by the products table.
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductCatalog for PgCatalog {
    async fn find(&self, id: Uuid) -> ServiceResult<Option<Product>> {
        db::products::find(&self.pool, id).await
    }
}

/// Coupon recognition used during realization. Unknown codes answer 0.
pub trait CouponCheck: Send + Sync {
    fn discount_of(&self, code: &str) -> f64;
}

impl CouponCheck for CouponStore {
    fn discount_of(&self, code: &str) -> f64 {
        CouponStore::discount_of(self, code)
    }
}

/// Result of one worker tick.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

pub struct OrderWorker {
    pool: PgPool,
    catalog: Arc<dyn ProductCatalog>,
    coupons: Arc<dyn CouponCheck>,
    interval: Duration,
    batch_size: i64,
}

impl OrderWorker {
    pub fn new(
        pool: PgPool,
        catalog: Arc<dyn ProductCatalog>,
        coupons: Arc<dyn CouponCheck>,
        interval: Duration,
        batch_size: i64,
    ) -> Self {
        Self {
            pool,
            catalog,
            coupons,
            interval,
            batch_size,
        }
    }

    /// Tick loop. Cancellation is honored between items, never mid-item;
    /// items claimed but not yet processed stay in `processing` and are
    /// recovered through the claim lease after restart.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Starting order queue worker"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Order queue worker stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match self.process_batch(&shutdown).await {
                Ok(outcome) if outcome.processed + outcome.failed > 0 => {
                    tracing::info!(
                        succeeded = outcome.processed,
                        failed = outcome.failed,
                        "Batch processed"
                    );
                    for error in &outcome.errors {
                        tracing::warn!(error = %error, "Item processing error");
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Failed to process batch"),
            }
        }
    }

    /// Claim one batch and process it item by item. A panic inside a
    /// single item's processing is contained to that item; the rest of
    /// the batch and the loop continue.
    pub async fn process_batch(&self, shutdown: &CancellationToken) -> ServiceResult<BatchOutcome> {
        let items = db::queue::claim_batch(&self.pool, self.batch_size).await?;

        let mut outcome = BatchOutcome::default();

        for item in items {
            if shutdown.is_cancelled() {
                break;
            }

            let item_id = item.id;
            let pool = self.pool.clone();
            let catalog = self.catalog.clone();
            let coupons = self.coupons.clone();

            let handle = tokio::spawn(async move {
                process_item(&pool, catalog.as_ref(), coupons.as_ref(), &item).await
            });

            match handle.await {
                Ok(Ok(())) => outcome.processed += 1,
                Ok(Err(e)) => {
                    outcome.failed += 1;
                    outcome.errors.push(format!("Item {item_id}: {e}"));
                }
                Err(join_err) => {
                    outcome.failed += 1;
                    tracing::error!(
                        item_id = %item_id,
                        error = %join_err,
                        "Recovered panic while processing queue item"
                    );
                    if let Err(e) =
                        db::queue::mark_failed(&self.pool, item_id, "panic during processing").await
                    {
                        tracing::error!(item_id = %item_id, error = %e, "Failed to record panicked item");
                    }
                    outcome.errors.push(format!("Item {item_id}: panic"));
                }
            }
        }

        Ok(outcome)
    }
}

/// Realize one claimed item and record the terminal outcome.
async fn process_item(
    pool: &PgPool,
    catalog: &dyn ProductCatalog,
    coupons: &dyn CouponCheck,
    item: &QueueItem,
) -> ServiceResult<()> {
    match realize_order(catalog, coupons, item).await {
        Ok(order) => {
            db::queue::mark_completed(pool, item.id, &order).await?;
            Ok(())
        }
        Err(e) => {
            let retry_count = db::queue::mark_failed(pool, item.id, &e.to_string()).await?;
            if retry_count >= MAX_RETRIES {
                tracing::error!(
                    item_id = %item.id,
                    retry_count,
                    "Item exceeded max retry count, permanently failed"
                );
            }
            Err(e)
        }
    }
}

/// Turn an accepted request into a priced order.
///
/// Prices are captured here, never at ingestion. The id of the realized
/// order equals the queue item id, which makes retries idempotent: the
/// same item always realizes to the same order identity.
///
/// Unknown or invalid coupon codes yield a zero discount and never fail
/// the order; the coupon set may simply lag the source fetches.
pub async fn realize_order(
    catalog: &dyn ProductCatalog,
    coupons: &dyn CouponCheck,
    item: &QueueItem,
) -> ServiceResult<Order> {
    let req = &item.order_req;
    req.validate()?;

    let mut priced = Vec::with_capacity(req.items.len());
    let mut products = Vec::with_capacity(req.items.len());
    let mut total = 0.0;

    for line in &req.items {
        let product_id: Uuid = line
            .product_id
            .parse()
            .map_err(|_| AppError::new(ErrorCode::ProductIdInvalid))?;

        let product = catalog.find(product_id).await?.ok_or_else(|| {
            AppError::with_message(
                ErrorCode::ProductNotFound,
                format!("product {product_id} not found"),
            )
        })?;

        let quantity = line.quantity as u32; // validate() guarantees > 0
        total += product.price * f64::from(quantity);

        priced.push(PricedItem {
            product_id,
            quantity,
            price: product.price,
        });
        products.push(product);
    }

    let total = round2(total);
    let discounts = match &req.coupon_code {
        Some(code) => round2(total * coupons.discount_of(code) / 100.0),
        None => 0.0,
    };

    Ok(Order {
        id: item.id,
        total,
        discounts,
        items: priced,
        products,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::{Image, OrderRequest, QueueStatus, RequestedItem};
    use std::collections::HashMap;

    const PRODUCT_ID: &str = "550e8400-e29b-41d4-a716-446655440000";
    const OTHER_PRODUCT_ID: &str = "650e8400-e29b-41d4-a716-446655440001";

    struct MapCatalog(HashMap<Uuid, Product>);

    #[async_trait]
    impl ProductCatalog for MapCatalog {
        async fn find(&self, id: Uuid) -> ServiceResult<Option<Product>> {
            Ok(self.0.get(&id).cloned())
        }
    }

    fn catalog(entries: &[(&str, f64)]) -> MapCatalog {
        MapCatalog(
            entries
                .iter()
                .map(|(id, price)| {
                    let id: Uuid = id.parse().unwrap();
                    (
                        id,
                        Product {
                            id,
                            name: format!("product-{id}"),
                            price: *price,
                            category: "Waffle".to_string(),
                            image: Image::default(),
                        },
                    )
                })
                .collect(),
        )
    }

    fn queue_item(coupon_code: Option<&str>, items: &[(&str, i64)]) -> QueueItem {
        QueueItem {
            id: Uuid::new_v4(),
            order_req: OrderRequest {
                coupon_code: coupon_code.map(str::to_string),
                items: items
                    .iter()
                    .map(|(product_id, quantity)| RequestedItem {
                        product_id: product_id.to_string(),
                        quantity: *quantity,
                    })
                    .collect(),
            },
            status: QueueStatus::Processing,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            error: None,
            order: None,
            retry_count: 0,
        }
    }

    fn app_code(err: &crate::error::ServiceError) -> Option<ErrorCode> {
        match err {
            crate::error::ServiceError::App(app) => Some(app.code),
            crate::error::ServiceError::Infra(_) => None,
        }
    }

    #[tokio::test]
    async fn test_realize_captures_prices_and_totals() {
        let catalog = catalog(&[(PRODUCT_ID, 12.5), (OTHER_PRODUCT_ID, 4.0)]);
        let coupons = CouponStore::new();
        let item = queue_item(None, &[(PRODUCT_ID, 2), (OTHER_PRODUCT_ID, 3)]);

        let order = realize_order(&catalog, &coupons, &item).await.unwrap();
        assert_eq!(order.id, item.id);
        assert_eq!(order.total, 37.0);
        assert_eq!(order.discounts, 0.0);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].price, 12.5);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.products.len(), 2);
    }

    #[tokio::test]
    async fn test_realize_applies_recognized_coupon() {
        let catalog = catalog(&[(PRODUCT_ID, 10.0)]);
        let coupons = CouponStore::new();
        let item = queue_item(Some("HAPPYHRS"), &[(PRODUCT_ID, 2)]);

        let order = realize_order(&catalog, &coupons, &item).await.unwrap();
        assert_eq!(order.total, 20.0);
        assert_eq!(order.discounts, 2.0);
    }

    #[tokio::test]
    async fn test_realize_ignores_unknown_coupon() {
        let catalog = catalog(&[(PRODUCT_ID, 10.0)]);
        let coupons = CouponStore::new();
        let item = queue_item(Some("NOTREAL88"), &[(PRODUCT_ID, 1)]);

        let order = realize_order(&catalog, &coupons, &item).await.unwrap();
        assert_eq!(order.total, 10.0);
        assert_eq!(order.discounts, 0.0);
    }

    #[tokio::test]
    async fn test_realize_fails_on_missing_product() {
        let catalog = catalog(&[]);
        let coupons = CouponStore::new();
        let item = queue_item(None, &[(PRODUCT_ID, 1)]);

        let err = realize_order(&catalog, &coupons, &item).await.unwrap_err();
        assert_eq!(app_code(&err), Some(ErrorCode::ProductNotFound));
    }

    #[tokio::test]
    async fn test_realize_revalidates_shape() {
        let catalog = catalog(&[(PRODUCT_ID, 10.0)]);
        let coupons = CouponStore::new();

        let item = queue_item(None, &[(PRODUCT_ID, 0)]);
        let err = realize_order(&catalog, &coupons, &item).await.unwrap_err();
        assert_eq!(app_code(&err), Some(ErrorCode::QuantityInvalid));

        let item = queue_item(None, &[]);
        let err = realize_order(&catalog, &coupons, &item).await.unwrap_err();
        assert_eq!(app_code(&err), Some(ErrorCode::OrderEmpty));
    }

    #[tokio::test]
    async fn test_realize_is_idempotent() {
        let catalog = catalog(&[(PRODUCT_ID, 12.5)]);
        let coupons = CouponStore::new();
        let item = queue_item(Some("FIFTYOFF"), &[(PRODUCT_ID, 2)]);

        let first = realize_order(&catalog, &coupons, &item).await.unwrap();
        let second = realize_order(&catalog, &coupons, &item).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.discounts, 12.5);
    }

    #[tokio::test]
    async fn test_realize_rounds_to_cents() {
        let catalog = catalog(&[(PRODUCT_ID, 0.1)]);
        let coupons = CouponStore::new();
        let item = queue_item(None, &[(PRODUCT_ID, 3)]);

        let order = realize_order(&catalog, &coupons, &item).await.unwrap();
        assert_eq!(order.total, 0.3);
    }
}

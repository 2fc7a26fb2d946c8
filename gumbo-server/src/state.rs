//! Application state

use sqlx::PgPool;

use crate::config::Config;
use crate::coupons::CouponStore;
use crate::limiter::RateLimiter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    pub pool: PgPool,
    /// Redis-backed admission control
    pub limiter: RateLimiter,
    /// Current coupon snapshot holder
    pub coupons: CouponStore,
    /// Shared-secret API key
    pub api_key: String,
}

impl AppState {
    /// Connect the backing stores and run migrations.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = crate::db::connect(&config.database_url()).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let limiter = RateLimiter::connect(&config.redis_url()).await?;

        Ok(Self {
            pool,
            limiter,
            coupons: CouponStore::new(),
            api_key: config.api_key.clone(),
        })
    }
}

//! Shared token-bucket rate limiter
//!
//! Admission state lives in Redis, one hash per key. Refill and spend
//! happen inside a single Lua script so concurrent callers can never
//! double-spend a token; no in-process cache shadows the store.

use once_cell::sync::Lazy;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::Script;
use std::time::Duration;

/// Admission policy for one endpoint class.
#[derive(Debug, Clone, Copy)]
pub struct RatePolicy {
    /// Key segment identifying the endpoint class
    pub name: &'static str,
    /// Bucket capacity in tokens
    pub capacity: u32,
    /// Full-refill window
    pub window: Duration,
}

/// Product reads: 100 requests per minute per IP.
pub const PRODUCT_READS: RatePolicy = RatePolicy {
    name: "product",
    capacity: 100,
    window: Duration::from_secs(60),
};

/// Order reads and writes: 50 requests per minute per IP.
pub const ORDER_WRITES: RatePolicy = RatePolicy {
    name: "order",
    capacity: 50,
    window: Duration::from_secs(60),
};

/// Queue status: 30 requests per minute per IP.
pub const QUEUE_STATUS: RatePolicy = RatePolicy {
    name: "queue",
    capacity: 30,
    window: Duration::from_secs(60),
};

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    /// Tokens left in the bucket after this call
    pub remaining: u64,
    /// Unix seconds at which the bucket fully refills
    pub reset: i64,
}

// Token bucket, executed atomically server-side. Reads the bucket hash,
// applies whole-window refills, spends one token when available, writes
// the bucket back and refreshes its TTL either way.
static TOKEN_BUCKET_SCRIPT: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r#"
        local key = KEYS[1]
        local capacity = tonumber(ARGV[1])
        local window = tonumber(ARGV[2])
        local now = tonumber(ARGV[3])

        local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
        local tokens = tonumber(bucket[1])
        local last = tonumber(bucket[2])
        if tokens == nil then tokens = capacity end
        if last == nil then last = now end

        local refills = math.floor((now - last) / window)
        if refills > 0 then
            tokens = math.min(capacity, tokens + refills * capacity)
            last = last + refills * window
        end

        local allowed = 0
        if tokens >= 1 then
            tokens = tokens - 1
            allowed = 1
        end

        redis.call('HMSET', key, 'tokens', tokens, 'last_refill', last)
        redis.call('EXPIRE', key, math.ceil(window / 1000))
        return {allowed, tokens}
    "#,
    )
});

/// Redis-backed rate limiter shared by all handlers.
#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
}

impl RateLimiter {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(1)
            .set_connection_timeout(Duration::from_secs(2));
        let conn = client.get_connection_manager_with_config(config).await?;
        Ok(Self { conn })
    }

    /// Run one admission check for `key` under `policy`.
    ///
    /// Errors surface to the caller; a broken store fails closed, it
    /// never silently admits.
    pub async fn allow(
        &self,
        key: &str,
        policy: RatePolicy,
    ) -> Result<Decision, redis::RedisError> {
        let window_ms = policy.window.as_millis() as i64;
        let now_ms = chrono::Utc::now().timestamp_millis();

        let mut conn = self.conn.clone();
        let result: Vec<i64> = TOKEN_BUCKET_SCRIPT
            .key(key)
            .arg(policy.capacity)
            .arg(window_ms)
            .arg(now_ms)
            .invoke_async(&mut conn)
            .await?;

        let allowed = result.first().copied().unwrap_or(0) == 1;
        let remaining = result.get(1).copied().unwrap_or(0).max(0) as u64;

        Ok(Decision {
            allowed,
            remaining,
            reset: now_ms / 1000 + policy.window.as_secs() as i64,
        })
    }
}

/// Bucket key for a policy and caller identity. Scoping by class keeps one
/// endpoint class from draining another's bucket for the same IP.
pub fn bucket_key(policy: &RatePolicy, ip: &str) -> String {
    format!("rl:{}:{}", policy.name, ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_key_is_scoped_per_class() {
        assert_eq!(bucket_key(&PRODUCT_READS, "10.0.0.1"), "rl:product:10.0.0.1");
        assert_eq!(bucket_key(&ORDER_WRITES, "10.0.0.1"), "rl:order:10.0.0.1");
        assert_ne!(
            bucket_key(&PRODUCT_READS, "10.0.0.1"),
            bucket_key(&QUEUE_STATUS, "10.0.0.1")
        );
    }

    #[test]
    fn test_policy_defaults() {
        assert_eq!(PRODUCT_READS.capacity, 100);
        assert_eq!(ORDER_WRITES.capacity, 50);
        assert_eq!(QUEUE_STATUS.capacity, 30);
        for policy in [PRODUCT_READS, ORDER_WRITES, QUEUE_STATUS] {
            assert_eq!(policy.window, Duration::from_secs(60));
        }
    }
}

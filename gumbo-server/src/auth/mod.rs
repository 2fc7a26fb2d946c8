//! Request admission: API-key authentication and rate limiting

pub mod api_key;
pub mod rate_limit;

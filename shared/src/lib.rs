//! Shared types for the gumbo food-ordering backend
//!
//! Two things live here:
//! - [`error`]: the unified error system (codes, categories, HTTP status
//!   mapping, [`error::AppError`], and the wire envelope)
//! - [`models`]: the domain and wire models exchanged between the API, the
//!   queue worker, and the tests

pub mod error;
pub mod models;

// Re-exports
pub use http;

//! Unified error system for the gumbo backend
//!
//! This module provides a structured error handling system with:
//! - [`ErrorCode`]: standardized error codes for all error types
//! - [`ErrorCategory`]: classification of errors by domain
//! - [`ErrorKind`]: the client-facing `type` discriminator of the wire envelope
//! - [`AppError`]: rich error type with codes, messages, and details
//! - [`ApiResponse`]: the JSON envelope returned for every non-2xx response
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Order errors
//! - 3xxx: Product errors
//! - 4xxx: Rate-limit errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode};
//!
//! // Create a simple error
//! let err = AppError::new(ErrorCode::OrderNotFound);
//!
//! // Create an error with a custom message
//! let err = AppError::with_message(ErrorCode::ValidationFailed, "Invalid product ID format");
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, ErrorKind, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};

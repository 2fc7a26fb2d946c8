//! Unified error codes for the gumbo backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Order errors
//! - 3xxx: Product errors
//! - 4xxx: Rate-limit errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,
    /// API key header missing
    ApiKeyMissing = 1002,
    /// API key does not match
    ApiKeyInvalid = 1003,
    /// Permission denied
    PermissionDenied = 1101,

    // ==================== 2xxx: Order ====================
    /// Order not found
    OrderNotFound = 2001,
    /// Order contains no items
    OrderEmpty = 2002,
    /// Product id is not a well-formed UUID
    ProductIdInvalid = 2003,
    /// Item quantity must be at least 1
    QuantityInvalid = 2004,
    /// Queue item not found
    QueueItemNotFound = 2005,

    // ==================== 3xxx: Product ====================
    /// Product not found
    ProductNotFound = 3001,
    /// Product has an invalid price
    ProductInvalidPrice = 3002,

    // ==================== 4xxx: Rate limit ====================
    /// Too many requests for this key
    RateLimited = 4001,
    /// Rate-limit store unavailable (admission fails closed)
    RateLimiterUnavailable = 4002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
    /// Recovered panic
    Panic = 9101,
}

/// Client-facing error kind, serialized as the `type` field of the wire
/// envelope. Derived totally from [`ErrorCode`]; handlers never pick a kind
/// by inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Error,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    UnprocessableEntity,
    InternalError,
    Panic,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request format",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",

            // Auth
            ErrorCode::NotAuthenticated => "Caller is not authenticated",
            ErrorCode::ApiKeyMissing => "API key is required",
            ErrorCode::ApiKeyInvalid => "Invalid API key",
            ErrorCode::PermissionDenied => "Permission denied",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderEmpty => "Order must contain at least one item",
            ErrorCode::ProductIdInvalid => "Invalid product ID format",
            ErrorCode::QuantityInvalid => "Quantity must be greater than 0",
            ErrorCode::QueueItemNotFound => "Queue item not found",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductInvalidPrice => "Product has an invalid price",

            // Rate limit
            ErrorCode::RateLimited => "Too many requests. Please try again later.",
            ErrorCode::RateLimiterUnavailable => "Rate limiter error",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::Panic => "Internal server error",
        }
    }

    /// Get the wire-envelope kind for this error code
    pub const fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidFormat
            | ErrorCode::RequiredField
            | ErrorCode::OrderEmpty
            | ErrorCode::ProductIdInvalid => ErrorKind::ValidationError,

            ErrorCode::NotFound
            | ErrorCode::OrderNotFound
            | ErrorCode::QueueItemNotFound
            | ErrorCode::ProductNotFound => ErrorKind::NotFound,

            ErrorCode::NotAuthenticated | ErrorCode::ApiKeyMissing | ErrorCode::ApiKeyInvalid => {
                ErrorKind::Unauthorized
            }

            ErrorCode::PermissionDenied => ErrorKind::Forbidden,

            ErrorCode::AlreadyExists => ErrorKind::Conflict,

            ErrorCode::QuantityInvalid => ErrorKind::UnprocessableEntity,

            ErrorCode::InternalError
            | ErrorCode::DatabaseError
            | ErrorCode::NetworkError
            | ErrorCode::TimeoutError
            | ErrorCode::ConfigError
            | ErrorCode::RateLimiterUnavailable => ErrorKind::InternalError,

            ErrorCode::Panic => ErrorKind::Panic,

            _ => ErrorKind::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, InvalidErrorCode> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            5 => ErrorCode::InvalidRequest,
            6 => ErrorCode::InvalidFormat,
            7 => ErrorCode::RequiredField,
            1001 => ErrorCode::NotAuthenticated,
            1002 => ErrorCode::ApiKeyMissing,
            1003 => ErrorCode::ApiKeyInvalid,
            1101 => ErrorCode::PermissionDenied,
            2001 => ErrorCode::OrderNotFound,
            2002 => ErrorCode::OrderEmpty,
            2003 => ErrorCode::ProductIdInvalid,
            2004 => ErrorCode::QuantityInvalid,
            2005 => ErrorCode::QueueItemNotFound,
            3001 => ErrorCode::ProductNotFound,
            3002 => ErrorCode::ProductInvalidPrice,
            4001 => ErrorCode::RateLimited,
            4002 => ErrorCode::RateLimiterUnavailable,
            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::NetworkError,
            9004 => ErrorCode::TimeoutError,
            9005 => ErrorCode::ConfigError,
            9101 => ErrorCode::Panic,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

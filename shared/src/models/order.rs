//! Order request, realized order, and queue item models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::product::Product;
use crate::error::{AppError, ErrorCode};

/// Maximum number of processing attempts before a queue item is frozen in
/// its failed state.
pub const MAX_RETRIES: i32 = 3;

/// Longest accepted coupon code on the wire. Validity is checked at
/// realization; this only bounds the stored payload.
pub const MAX_COUPON_CODE_LEN: usize = 16;

/// Client-supplied order request. Immutable once accepted; carries no
/// prices, those are captured at realization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Optional promo code applied to the order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub items: Vec<RequestedItem>,
}

impl OrderRequest {
    /// Shape validation, applied at ingestion and again at realization.
    ///
    /// Checks structure only: item presence, product-id form, quantity
    /// positivity, coupon-code length. No catalog or coupon lookup.
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(code) = &self.coupon_code
            && code.len() > MAX_COUPON_CODE_LEN
        {
            return Err(AppError::validation("Coupon code too long"));
        }

        if self.items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty));
        }

        for item in &self.items {
            if item.product_id.len() != 36 {
                return Err(AppError::new(ErrorCode::ProductIdInvalid));
            }
            if item.quantity <= 0 {
                return Err(AppError::new(ErrorCode::QuantityInvalid));
            }
        }

        Ok(())
    }
}

/// One line of an incoming order: product reference plus count.
///
/// Quantity is signed so a negative value deserializes and is rejected
/// with 422 at validation, rather than failing JSON parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedItem {
    /// ID of the product
    pub product_id: String,
    /// Item count
    pub quantity: i64,
}

/// One line of a realized order, with the unit price captured at
/// processing time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedItem {
    pub product_id: Uuid,
    pub quantity: u32,
    /// Unit price at time of order
    pub price: f64,
}

/// Realized order produced by the queue worker. `id` equals the id of the
/// originating queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub total: f64,
    pub discounts: f64,
    pub items: Vec<PricedItem>,
    /// Snapshot of the referenced catalog rows
    pub products: Vec<Product>,
}

/// Queue item lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown queue status: {other}")),
        }
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable envelope for an order request while it moves through the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: Uuid,
    pub order_req: OrderRequest,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Realized order, present once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    pub retry_count: i32,
}

impl QueueItem {
    /// Terminal items never transition again: completed, or failed with
    /// retries exhausted.
    pub fn is_terminal(&self) -> bool {
        match self.status {
            QueueStatus::Completed => true,
            QueueStatus::Failed => self.retry_count >= MAX_RETRIES,
            _ => false,
        }
    }
}

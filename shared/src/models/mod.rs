//! Domain and wire models

pub mod order;
pub mod product;

pub use order::{
    MAX_COUPON_CODE_LEN, MAX_RETRIES, Order, OrderRequest, PricedItem, QueueItem, QueueStatus,
    RequestedItem,
};
pub use product::{Image, Product};

//! Coupon validation subsystem
//!
//! [`store::CouponStore`] holds the current snapshot of valid codes and
//! serves lock-cheap reads; [`refresher::CouponRefresher`] periodically
//! rebuilds the snapshot from the external compressed sources and swaps it
//! in atomically.

pub mod refresher;
pub mod store;

pub use refresher::CouponRefresher;
pub use store::{CouponSnapshot, CouponStore};

//! Coupon snapshot store
//!
//! Readers grab the current snapshot behind a briefly-held lock and then
//! query it without further synchronization; the refresher replaces the
//! whole snapshot in one pointer swap, so a reader always sees either the
//! prior set or the new set in its entirety.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Accepted coupon code length bounds (inclusive).
pub const MIN_CODE_LEN: usize = 8;
pub const MAX_CODE_LEN: usize = 10;

/// Discount applied to codes learned from the source files.
const DEFAULT_DISCOUNT_PCT: f64 = 5.0;

/// Hard-coded demo codes, recognized regardless of source-file content so
/// the system is usable before the first successful refresh.
const DEMO_CODES: [(&str, f64); 2] = [("HAPPYHRS", 10.0), ("FIFTYOFF", 50.0)];

/// Immutable set of valid uppercase codes with their discount percentages.
#[derive(Debug, Clone)]
pub struct CouponSnapshot {
    codes: HashMap<String, f64>,
}

impl CouponSnapshot {
    /// Snapshot containing only the demo codes.
    pub fn demo() -> Self {
        Self::from_codes(std::iter::empty::<String>())
    }

    /// Build a snapshot from file-derived codes (assumed already uppercase
    /// and length-filtered). Demo codes are always layered on top.
    pub fn from_codes(codes: impl IntoIterator<Item = String>) -> Self {
        let mut map: HashMap<String, f64> = codes
            .into_iter()
            .map(|code| (code, DEFAULT_DISCOUNT_PCT))
            .collect();
        for (code, pct) in DEMO_CODES {
            map.insert(code.to_string(), pct);
        }
        Self { codes: map }
    }

    /// Whether the (case-insensitive) code is valid.
    pub fn contains(&self, code: &str) -> bool {
        if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()) {
            return false;
        }
        self.codes.contains_key(&code.to_uppercase())
    }

    /// Discount percentage for the code; 0 for unknown or malformed codes.
    pub fn discount_of(&self, code: &str) -> f64 {
        if !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()) {
            return 0.0;
        }
        self.codes.get(&code.to_uppercase()).copied().unwrap_or(0.0)
    }

    /// Number of codes in the snapshot (demo codes included).
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Shared holder of the current [`CouponSnapshot`].
#[derive(Clone)]
pub struct CouponStore {
    inner: Arc<RwLock<Arc<CouponSnapshot>>>,
}

impl CouponStore {
    /// Store seeded with the demo snapshot.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(CouponSnapshot::demo()))),
        }
    }

    /// Atomically replace the current snapshot.
    pub fn publish(&self, snapshot: CouponSnapshot) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }

    /// The current snapshot; internally consistent for the caller's whole
    /// sequence of queries against it.
    pub fn snapshot(&self) -> Arc<CouponSnapshot> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the (case-insensitive) code is currently valid.
    pub fn contains(&self, code: &str) -> bool {
        self.snapshot().contains(code)
    }

    /// Current discount percentage for the code; 0 when unknown.
    pub fn discount_of(&self, code: &str) -> f64 {
        self.snapshot().discount_of(code)
    }
}

impl Default for CouponStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_codes_always_valid() {
        let store = CouponStore::new();
        assert!(store.contains("HAPPYHRS"));
        assert!(store.contains("FIFTYOFF"));
        assert_eq!(store.discount_of("HAPPYHRS"), 10.0);
        assert_eq!(store.discount_of("FIFTYOFF"), 50.0);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let store = CouponStore::new();
        for code in ["happyhrs", "HappyHrs", "HAPPYHRS"] {
            assert!(store.contains(code));
            assert_eq!(store.contains(code), store.contains(&code.to_uppercase()));
        }
    }

    #[test]
    fn test_length_bounds() {
        let snapshot = CouponSnapshot::from_codes([
            "EIGHT889".to_string(),    // 8 chars
            "TENCHARS10".to_string(),  // 10 chars
        ]);
        assert!(snapshot.contains("EIGHT889"));
        assert!(snapshot.contains("TENCHARS10"));
        assert!(!snapshot.contains("SEVEN77"));      // 7 chars
        assert!(!snapshot.contains("ELEVENCHARS"));  // 11 chars
        assert!(!snapshot.contains(""));
    }

    #[test]
    fn test_unknown_code_has_zero_discount() {
        let store = CouponStore::new();
        assert!(!store.contains("NOTREAL88"));
        assert_eq!(store.discount_of("NOTREAL88"), 0.0);
    }

    #[test]
    fn test_publish_replaces_file_codes_keeps_demo() {
        let store = CouponStore::new();
        store.publish(CouponSnapshot::from_codes(["SAVE10NOW".to_string()]));
        assert!(store.contains("SAVE10NOW"));
        assert_eq!(store.discount_of("SAVE10NOW"), 5.0);
        assert!(store.contains("HAPPYHRS"));

        // A later round without SAVE10NOW drops it wholesale
        store.publish(CouponSnapshot::from_codes(["WELCOME20".to_string()]));
        assert!(!store.contains("SAVE10NOW"));
        assert!(store.contains("WELCOME20"));
        assert!(store.contains("FIFTYOFF"));
    }

    #[test]
    fn test_snapshot_is_stable_across_publish() {
        let store = CouponStore::new();
        let snapshot = store.snapshot();
        store.publish(CouponSnapshot::from_codes(["SAVE10NOW".to_string()]));
        // The previously-taken snapshot is unchanged
        assert!(!snapshot.contains("SAVE10NOW"));
        // A fresh snapshot sees the new set
        assert!(store.snapshot().contains("SAVE10NOW"));
    }
}

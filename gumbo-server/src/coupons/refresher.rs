//! Coupon source refresher
//!
//! Downloads the configured gzip-compressed code lists, streams them
//! through decompression and CSV parsing in bounded memory, tallies how
//! many sources each code appears in, and publishes a fresh snapshot of
//! the codes seen in at least two sources.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use futures_util::{StreamExt, TryStreamExt};
use tokio::io::{AsyncBufRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use crate::error::{ServiceError, ServiceResult};

use super::store::{CouponSnapshot, CouponStore, MAX_CODE_LEN, MIN_CODE_LEN};

/// Fixed set of source files fetched from the configured base URL.
const COUPON_FILES: [&str; 3] = ["couponbase1.gz", "couponbase2.gz", "couponbase3.gz"];

/// A code must appear in at least this many sources to be valid.
const MIN_SOURCE_COUNT: u32 = 2;

/// Compressed download cap per file. Enforced even when the server omits
/// Content-Length, by bounding the body reader.
const MAX_DOWNLOAD_BYTES: u64 = 1024 * 1024 * 1024;

/// Time limit for fetching and parsing a single file.
const PER_FILE_TIMEOUT: Duration = Duration::from_secs(120);

/// Overall HTTP client timeout for one download.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Cadence of the refresh loop, after the eager run at startup.
const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct CouponRefresher {
    http: reqwest::Client,
    base_url: String,
    store: CouponStore,
}

impl CouponRefresher {
    pub fn new(base_url: String, store: CouponStore) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(CLIENT_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url,
            store,
        })
    }

    /// Refresh loop: one eager run at startup, then every 24 hours until
    /// cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        self.refresh().await;

        let mut interval = tokio::time::interval(REFRESH_INTERVAL);
        interval.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Coupon refresher stopped");
                    return;
                }
                _ = interval.tick() => self.refresh().await,
            }
        }
    }

    /// One refresh round. Individual file failures are logged and
    /// tolerated; the snapshot is only published when enough sources
    /// succeeded, otherwise the prior snapshot is retained.
    pub async fn refresh(&self) {
        let mut per_file_codes = Vec::new();

        for filename in COUPON_FILES {
            match tokio::time::timeout(PER_FILE_TIMEOUT, self.fetch_codes(filename)).await {
                Ok(Ok(codes)) => {
                    tracing::info!(file = filename, codes = codes.len(), "Coupon source processed");
                    per_file_codes.push(codes);
                }
                Ok(Err(e)) => {
                    tracing::warn!(file = filename, error = %e, "Failed to process coupon source");
                }
                Err(_) => {
                    tracing::warn!(file = filename, "Coupon source timed out");
                }
            }
        }

        match build_snapshot(&per_file_codes) {
            Some(snapshot) => {
                tracing::info!(codes = snapshot.len(), "Publishing refreshed coupon snapshot");
                self.store.publish(snapshot);
            }
            None => {
                tracing::warn!(
                    succeeded = per_file_codes.len(),
                    required = COUPON_FILES.len().div_ceil(2),
                    "Too few coupon sources succeeded, retaining prior snapshot"
                );
            }
        }
    }

    /// Download one file and return the set of candidate codes it
    /// contains. The compressed body is capped and decompressed in a
    /// streaming fashion; nothing is buffered whole.
    async fn fetch_codes(&self, filename: &str) -> ServiceResult<HashSet<String>> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), filename);
        let resp = self.http.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(ServiceError::Infra(
                format!("coupon source {url} returned status {}", resp.status()).into(),
            ));
        }

        if let Some(len) = resp.content_length()
            && len > MAX_DOWNLOAD_BYTES
        {
            return Err(ServiceError::Infra(
                format!("coupon source {url} is {len} bytes, over the {MAX_DOWNLOAD_BYTES} byte cap").into(),
            ));
        }

        let stream = resp.bytes_stream().map_err(std::io::Error::other).boxed();
        let body = StreamReader::new(stream);
        read_source(body.take(MAX_DOWNLOAD_BYTES)).await
    }
}

/// Decompress a gzip stream and parse the candidate codes out of it.
async fn read_source<R>(reader: R) -> ServiceResult<HashSet<String>>
where
    R: AsyncBufRead + Unpin + Send,
{
    parse_codes(GzipDecoder::new(reader)).await
}

/// Parse a decompressed source as permissive CSV and collect the first
/// field of each record when it looks like a code. Malformed records are
/// logged and skipped; only an I/O failure of the underlying stream aborts
/// the file.
async fn parse_codes<R>(reader: R) -> ServiceResult<HashSet<String>>
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut csv_reader = csv_async::AsyncReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv_async::Trim::All)
        .create_reader(reader);

    let mut codes = HashSet::new();
    let mut records = csv_reader.records();

    while let Some(result) = records.next().await {
        match result {
            Ok(record) => {
                if let Some(field) = record.get(0) {
                    let code = field.trim();
                    if (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len()) {
                        codes.insert(code.to_uppercase());
                    }
                }
            }
            Err(e) if matches!(e.kind(), csv_async::ErrorKind::Io(_)) => {
                return Err(ServiceError::Infra(e.into()));
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed coupon record");
            }
        }
    }

    Ok(codes)
}

/// Intersect the per-file code sets into a candidate snapshot.
///
/// Returns `None` when fewer than half (rounded up) of the sources
/// succeeded this round; a tally built from a mostly-failed round would
/// shrink the set spuriously.
fn build_snapshot(per_file_codes: &[HashSet<String>]) -> Option<CouponSnapshot> {
    if per_file_codes.len() < COUPON_FILES.len().div_ceil(2) {
        return None;
    }

    let mut tally: HashMap<&str, u32> = HashMap::new();
    for codes in per_file_codes {
        for code in codes {
            *tally.entry(code).or_insert(0) += 1;
        }
    }

    let valid = tally
        .into_iter()
        .filter(|(_, count)| *count >= MIN_SOURCE_COUNT)
        .map(|(code, _)| code.to_string());

    Some(CouponSnapshot::from_codes(valid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = async_compression::tokio::write::GzipEncoder::new(Vec::new());
        encoder.write_all(data).await.unwrap();
        encoder.shutdown().await.unwrap();
        encoder.into_inner()
    }

    fn set(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_parse_codes_filters_by_length() {
        let data = b"HAPPYHRS\nSHORT77\nSAVE10NOW\nWAYTOOLONG123\nTENCHARS10\n";
        let codes = parse_codes(&data[..]).await.unwrap();
        assert_eq!(codes, set(&["HAPPYHRS", "SAVE10NOW", "TENCHARS10"]));
    }

    #[tokio::test]
    async fn test_parse_codes_takes_first_field_and_trims() {
        let data = b"  HAPPYHRS ,ignored,fields\nSAVE10NOW,1\n";
        let codes = parse_codes(&data[..]).await.unwrap();
        assert_eq!(codes, set(&["HAPPYHRS", "SAVE10NOW"]));
    }

    #[tokio::test]
    async fn test_parse_codes_uppercases() {
        let data = b"happyhrs\nSave10Now\n";
        let codes = parse_codes(&data[..]).await.unwrap();
        assert_eq!(codes, set(&["HAPPYHRS", "SAVE10NOW"]));
    }

    #[tokio::test]
    async fn test_parse_codes_counts_once_per_file() {
        let data = b"HAPPYHRS\nHAPPYHRS\nHAPPYHRS\n";
        let codes = parse_codes(&data[..]).await.unwrap();
        assert_eq!(codes.len(), 1);
    }

    #[tokio::test]
    async fn test_read_source_decompresses() {
        let compressed = gzip(b"HAPPYHRS\nSAVE10NOW,extra\n").await;
        let codes = read_source(&compressed[..]).await.unwrap();
        assert_eq!(codes, set(&["HAPPYHRS", "SAVE10NOW"]));
    }

    #[tokio::test]
    async fn test_read_source_rejects_garbage() {
        let result = read_source(&b"definitely not gzip"[..]).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_build_snapshot_intersection() {
        // source-1 = {A,B,C}, source-2 = {A,B,D}, source-3 = {B,E} -> {A,B}
        let sets = vec![
            set(&["ALPHA123", "BRAVO456", "CHARLIE78"]),
            set(&["ALPHA123", "BRAVO456", "DELTA9999"]),
            set(&["BRAVO456", "ECHO12345"]),
        ];
        let snapshot = build_snapshot(&sets).unwrap();
        assert!(snapshot.contains("ALPHA123"));
        assert!(snapshot.contains("BRAVO456"));
        assert!(!snapshot.contains("CHARLIE78"));
        assert!(!snapshot.contains("DELTA9999"));
        assert!(!snapshot.contains("ECHO12345"));
    }

    #[test]
    fn test_build_snapshot_keeps_demo_codes() {
        let sets = vec![set(&["ALPHA123"]), set(&["ALPHA123"])];
        let snapshot = build_snapshot(&sets).unwrap();
        assert!(snapshot.contains("HAPPYHRS"));
        assert!(snapshot.contains("FIFTYOFF"));
        assert_eq!(snapshot.discount_of("ALPHA123"), 5.0);
    }

    #[test]
    fn test_build_snapshot_requires_majority_of_sources() {
        // 1 of 3 sources is below the publish threshold
        let sets = vec![set(&["ALPHA123", "BRAVO456"])];
        assert!(build_snapshot(&sets).is_none());

        // zero successes never publishes
        assert!(build_snapshot(&[]).is_none());

        // 2 of 3 is enough
        let sets = vec![set(&["ALPHA123"]), set(&["ALPHA123"])];
        assert!(build_snapshot(&sets).is_some());
    }
}

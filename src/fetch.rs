//! Remote retrieval of raw dataset bytes.

use std::{collections::HashMap, sync::Mutex};

use crate::error::FetchError;

/// Single-attempt retrieval of a remote artifact.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP GET with no retries; non-success statuses are errors.
#[cfg(feature = "download")]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "download")]
impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        use std::time::Duration;

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("transitmap/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(300))
            .build()?;

        Ok(Self { client })
    }
}

#[cfg(feature = "download")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Request { url: url.to_string(), message: e.to_string() };

        log::info!("[fetch] GET {url}");
        let response = self.client.get(url).send().map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() })
        }

        let bytes = response.bytes().map_err(request_error)?;
        log::debug!("[fetch] {url}: {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

/// Refuses every request; used for cache-only runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Offline { url: url.to_string() })
    }
}

/// Serves canned responses by URL and records every request. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MemFetcher {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemFetcher {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, url: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), bytes.into());
        self
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Fetcher for MemFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.responses.get(url).cloned()
            .ok_or_else(|| FetchError::Status { url: url.to_string(), status: 404 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_fetcher_serves_known_urls_and_records_requests() {
        let fetcher = MemFetcher::new().with("https://example.invalid/a", b"abc".to_vec());
        assert_eq!(fetcher.fetch("https://example.invalid/a").unwrap(), b"abc");
        assert!(matches!(
            fetcher.fetch("https://example.invalid/b"),
            Err(FetchError::Status { status: 404, .. })
        ));
        assert_eq!(fetcher.requests().len(), 2);
    }

    #[test]
    fn offline_fetcher_always_fails() {
        let err = OfflineFetcher.fetch("https://example.invalid/a").unwrap_err();
        assert_eq!(err.to_string(), "https://example.invalid/a is not cached and fetching is disabled");
    }
}

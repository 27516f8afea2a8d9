use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// In-process memory of profile pages already fetched.
///
/// Two caches:
/// - extracted page text by URL, so a second pass in the same process does
///   not hit the profile site again
/// - SHA-256 fingerprints of page texts already judged noise-only, so the
///   identical "empty template" page served for many handles is analysed once
#[derive(Clone)]
pub struct PageCache {
    pages: Cache<String, String>,
    noise_fingerprints: Cache<String, ()>,
}

impl PageCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            pages: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
            noise_fingerprints: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    /// One hour TTL, 10k pages.
    pub fn hourly() -> Self {
        Self::new(Duration::from_secs(3600), 10_000)
    }

    /// Computes the SHA-256 fingerprint of a page text (hex encoded)
    pub fn fingerprint(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub async fn page(&self, url: &str) -> Option<String> {
        self.pages.get(url).await
    }

    pub async fn store_page(&self, url: &str, text: &str) {
        self.pages.insert(url.to_string(), text.to_string()).await;
    }

    pub async fn is_known_noise(&self, text: &str) -> bool {
        self.noise_fingerprints
            .get(&Self::fingerprint(text))
            .await
            .is_some()
    }

    pub async fn mark_noise(&self, text: &str) {
        self.noise_fingerprints
            .insert(Self::fingerprint(text), ())
            .await;
    }
}

use crate::circuit_breaker::{create_profile_site_breaker, ProfileSiteBreaker, PROFILE_FAILURE_THRESHOLD};
use crate::config::Config;
use crate::errors::AppError;
use crate::page_cache::PageCache;
use failsafe::futures::CircuitBreaker as _;
use reqwest::StatusCode;
use scraper::Html;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Fetches member profile pages and reduces them to visible text.
#[derive(Clone)]
pub struct ProfileFetcher {
    client: reqwest::Client,
    base_url: String,
    breaker: ProfileSiteBreaker,
    cache: PageCache,
    delay: Duration,
}

impl ProfileFetcher {
    /// Creates a new `ProfileFetcher` with a fresh breaker and page cache.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create profile client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.profile_base_url.clone(),
            breaker: create_profile_site_breaker(PROFILE_FAILURE_THRESHOLD),
            cache: PageCache::hourly(),
            delay: config.profile_fetch_delay(),
        })
    }

    /// `{base}/{term}nd/{handle}`
    pub fn profile_url(&self, term: i32, handle: &str) -> String {
        format!("{}/{}nd/{}", self.base_url, term, handle)
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Pause between two attempts against the profile site.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Visible text of the page at `url`, `None` on 404.
    ///
    /// Transport errors and 5xx responses count against the breaker; while it
    /// is open the call fails fast with `ExternalApiError`.
    pub async fn fetch_text(&self, url: &str) -> Result<Option<String>, AppError> {
        if let Some(text) = self.cache.page(url).await {
            tracing::debug!("Profile page cache hit: {}", url);
            return Ok(Some(text));
        }

        let text = match self.breaker.call(self.get(url)).await {
            Ok(text) => text,
            Err(failsafe::Error::Rejected) => {
                tracing::warn!("Profile site circuit open, skipping {}", url);
                return Err(AppError::ExternalApiError(
                    "Profile site circuit open".to_string(),
                ));
            }
            Err(failsafe::Error::Inner(e)) => return Err(e),
        };

        if let Some(ref text) = text {
            self.cache.store_page(url, text).await;
        }
        Ok(text)
    }

    async fn get(&self, url: &str) -> Result<Option<String>, AppError> {
        tracing::info!("Fetching profile page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Profile request failed: {}", e)))?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Profile page not found: {}", url);
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::ExternalApiError(format!(
                "Profile site returned {} for {}",
                response.status(),
                url
            )));
        }

        let body = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read profile page: {}", e))
        })?;
        Ok(Some(extract_page_text(&body)))
    }
}

/// Joins the page's visible text nodes with newlines, skipping script and
/// style content.
pub fn extract_page_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in doc.tree.nodes() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"));
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
    }

    parts.join("\n")
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// URL handle spellings to try, in order, without repeats.
///
/// The site is inconsistent about how it capitalises romanized names, so
/// the feed's handle (whitespace removed) is tried as-is, title-cased,
/// lower-cased, and split after the 2nd and 3rd letter with each half
/// title-cased (`KIMMINSU` → `KiMminsu`, `KimMinsu`).
pub fn handle_variants(handle: &str) -> Vec<String> {
    let compact: String = handle.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Vec::new();
    }

    let mut variants = vec![compact.clone(), title_case(&compact), compact.to_lowercase()];
    for split in [2, 3] {
        if compact.chars().count() > split {
            let (head, tail): (String, String) = (
                compact.chars().take(split).collect(),
                compact.chars().skip(split).collect(),
            );
            variants.push(format!("{}{}", title_case(&head), title_case(&tail)));
        }
    }

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_variants_order_and_dedup() {
        assert_eq!(
            handle_variants("KIM MINSU"),
            vec!["KIMMINSU", "Kimminsu", "kimminsu", "KiMminsu", "KimMinsu"]
        );
        assert_eq!(handle_variants("  "), Vec::<String>::new());
    }

    #[test]
    fn test_handle_variants_short_handle() {
        assert_eq!(handle_variants("oh"), vec!["oh", "Oh"]);
    }

    #[test]
    fn test_extract_page_text_skips_scripts() {
        let html = "<html><head><style>.a{}</style><script>var x = 1;</script></head>\
                    <body><h1>국회의원 홍길동</h1><ul><li>서울대학교 졸업</li><li>변호사</li></ul></body></html>";
        assert_eq!(extract_page_text(html), "국회의원 홍길동\n서울대학교 졸업\n변호사");
    }
}

/// Biography enrichment: the fallback chain of biography sources.
///
/// Sources are tried in order and the first one that yields at least one
/// classified item wins:
/// 1. Historical-records feed (`HAK` field) for terms 20 and 21
/// 2. Member profile page, trying each handle spelling
/// 3. The member feed's raw biography field
///
/// A source that fails is logged and skipped; it never aborts the pass.
use crate::classifier::Classifier;
use crate::errors::AppError;
use crate::lexicon::Lexicon;
use crate::models::{BiographyItem, Provenance, HISTORICAL_TERMS};
use crate::noise::NoiseDetector;
use crate::profile_fetcher::{handle_variants, ProfileFetcher};
use crate::segmenter::{normalize_entities, Segmenter};
use crate::services::AssemblyApiClient;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Raw biography text shorter than this is not worth parsing.
pub const MIN_RAW_BIOGRAPHY_CHARS: usize = 10;

/// Segments free text and classifies each fragment.
pub struct BiographyParser {
    segmenter: Segmenter,
    classifier: Classifier,
}

impl BiographyParser {
    pub fn new(lexicon: &Lexicon) -> Result<Self, AppError> {
        Ok(Self {
            segmenter: Segmenter::new(lexicon)?,
            classifier: Classifier::new(lexicon)?,
        })
    }

    /// Items in text order, without repeats.
    pub fn parse(&self, text: &str, provenance: Provenance) -> Vec<BiographyItem> {
        let normalized = normalize_entities(text);
        let mut seen = HashSet::new();
        self.segmenter
            .segment(&normalized)
            .iter()
            .filter_map(|fragment| self.classifier.classify(fragment, provenance))
            .filter(|item| seen.insert(item.text.clone()))
            .collect()
    }
}

/// What the chain knows about the person being enriched.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentTarget {
    pub name: String,
    /// Romanized handle for profile URLs.
    pub handle: Option<String>,
    pub raw_biography: Option<String>,
    /// Matched election terms, ascending.
    pub terms: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceYield {
    pub items: Vec<BiographyItem>,
    /// Set when the source proved a URL to be the person's profile page.
    pub homepage: Option<String>,
}

#[async_trait]
pub trait BiographySource: Send + Sync {
    fn provenance(&self) -> Provenance;

    /// `Ok(None)` when the source has nothing usable for `target`.
    async fn fetch(&self, target: &EnrichmentTarget) -> Result<Option<SourceYield>, AppError>;
}

pub struct HistoricalRecordsSource {
    api: AssemblyApiClient,
    parser: Arc<BiographyParser>,
}

impl HistoricalRecordsSource {
    pub fn new(api: AssemblyApiClient, parser: Arc<BiographyParser>) -> Self {
        Self { api, parser }
    }
}

#[async_trait]
impl BiographySource for HistoricalRecordsSource {
    fn provenance(&self) -> Provenance {
        Provenance::HistoricalRecords
    }

    async fn fetch(&self, target: &EnrichmentTarget) -> Result<Option<SourceYield>, AppError> {
        for term in target.terms.iter().filter(|t| HISTORICAL_TERMS.contains(t)) {
            let text = match self.api.fetch_historical(&target.name, *term).await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(
                        "Historical records lookup failed for {} ({}대): {}",
                        target.name,
                        term,
                        e
                    );
                    continue;
                }
            };

            let items = self.parser.parse(&text, self.provenance());
            if !items.is_empty() {
                tracing::info!(
                    "Historical records biography for {} ({}대): {} items",
                    target.name,
                    term,
                    items.len()
                );
                return Ok(Some(SourceYield {
                    items,
                    homepage: None,
                }));
            }
        }
        Ok(None)
    }
}

pub struct ProfilePageSource {
    fetcher: ProfileFetcher,
    detector: NoiseDetector,
    parser: Arc<BiographyParser>,
}

impl ProfilePageSource {
    pub fn new(fetcher: ProfileFetcher, detector: NoiseDetector, parser: Arc<BiographyParser>) -> Self {
        Self {
            fetcher,
            detector,
            parser,
        }
    }
}

#[async_trait]
impl BiographySource for ProfilePageSource {
    fn provenance(&self) -> Provenance {
        Provenance::ProfilePage
    }

    async fn fetch(&self, target: &EnrichmentTarget) -> Result<Option<SourceYield>, AppError> {
        let Some(handle) = target.handle.as_deref() else {
            return Ok(None);
        };
        let Some(term) = target.terms.last().copied() else {
            return Ok(None);
        };

        for (attempt, variant) in handle_variants(handle).iter().enumerate() {
            if attempt > 0 && self.fetcher.delay() > Duration::ZERO {
                tokio::time::sleep(self.fetcher.delay()).await;
            }

            let url = self.fetcher.profile_url(term, variant);
            let Some(text) = self.fetcher.fetch_text(&url).await? else {
                continue;
            };

            if self.fetcher.cache().is_known_noise(&text).await {
                tracing::debug!("Skipping known noise page: {}", url);
                continue;
            }
            if self.detector.is_noise_only(&text, &target.name) {
                self.fetcher.cache().mark_noise(&text).await;
                continue;
            }

            let items = self.parser.parse(&text, self.provenance());
            if !items.is_empty() {
                tracing::info!(
                    "Profile page biography for {}: {} items from {}",
                    target.name,
                    items.len(),
                    url
                );
                return Ok(Some(SourceYield {
                    items,
                    homepage: Some(url),
                }));
            }
        }
        Ok(None)
    }
}

pub struct RawFieldSource {
    parser: Arc<BiographyParser>,
}

impl RawFieldSource {
    pub fn new(parser: Arc<BiographyParser>) -> Self {
        Self { parser }
    }
}

#[async_trait]
impl BiographySource for RawFieldSource {
    fn provenance(&self) -> Provenance {
        Provenance::RawField
    }

    async fn fetch(&self, target: &EnrichmentTarget) -> Result<Option<SourceYield>, AppError> {
        let Some(raw) = target.raw_biography.as_deref() else {
            return Ok(None);
        };
        let text = normalize_entities(raw);
        if text.trim().chars().count() < MIN_RAW_BIOGRAPHY_CHARS {
            return Ok(None);
        }

        let items = self.parser.parse(&text, self.provenance());
        Ok((!items.is_empty()).then_some(SourceYield {
            items,
            homepage: None,
        }))
    }
}

/// Ordered biography sources.
pub struct FallbackChain {
    sources: Vec<Box<dyn BiographySource>>,
}

impl FallbackChain {
    pub fn new(sources: Vec<Box<dyn BiographySource>>) -> Self {
        Self { sources }
    }

    /// Historical records, then profile page, then raw field.
    pub fn standard(
        api: AssemblyApiClient,
        fetcher: ProfileFetcher,
        lexicon: &Lexicon,
    ) -> Result<Self, AppError> {
        let parser = Arc::new(BiographyParser::new(lexicon)?);
        Ok(Self::new(vec![
            Box::new(HistoricalRecordsSource::new(api, parser.clone())),
            Box::new(ProfilePageSource::new(
                fetcher,
                NoiseDetector::new(lexicon)?,
                parser.clone(),
            )),
            Box::new(RawFieldSource::new(parser)),
        ]))
    }

    /// First non-empty yield, or `None` when every source came up empty.
    pub async fn enrich(&self, target: &EnrichmentTarget) -> Option<SourceYield> {
        for source in &self.sources {
            match source.fetch(target).await {
                Ok(Some(found)) if !found.items.is_empty() => return Some(found),
                Ok(_) => {
                    tracing::debug!("{} had nothing for {}", source.provenance(), target.name);
                }
                Err(e) => {
                    tracing::warn!(
                        "{} failed for {}, trying next source: {}",
                        source.provenance(),
                        target.name,
                        e
                    );
                }
            }
        }
        tracing::info!("No biography source yielded items for {}", target.name);
        None
    }
}

use std::time::Duration;

use crate::errors::{AppError, ResultExt};
use crate::models::{PassProgress, SUPPORTED_TERMS};
use crate::services::AssemblyApiClient;
use crate::store::BillStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BillPassReport {
    pub pages: u32,
    pub inserted: u64,
    pub updated: u64,
}

impl BillPassReport {
    pub fn processed(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Bill ingestion pass: per supported term, page through the bill feed
/// and upsert by bill id.
pub struct BillSync<'a> {
    pub api: &'a AssemblyApiClient,
    pub store: &'a dyn BillStore,
    pub page_size: u32,
    pub max_pages: u32,
    pub page_delay: Duration,
    pub term_delay: Duration,
}

impl BillSync<'_> {
    /// Feed failures end the current term; store failures abort the pass.
    pub async fn run<F>(&self, mut on_page: F) -> Result<BillPassReport, AppError>
    where
        F: FnMut(PassProgress) + Send,
    {
        let mut report = BillPassReport::default();

        for (i, term) in SUPPORTED_TERMS.iter().copied().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.term_delay).await;
            }
            tracing::info!("Syncing bills for term {}", term);

            for page_index in 1..=self.max_pages {
                let page = match self.api.fetch_bills(term, page_index, self.page_size).await {
                    Ok(page) => page,
                    Err(e) if e.is_source_unavailable() => {
                        tracing::warn!(
                            "Bill feed term {} page {} failed, moving on: {}",
                            term,
                            page_index,
                            e
                        );
                        break;
                    }
                    Err(e) => return Err(e),
                };
                if page.row_count == 0 {
                    break;
                }

                let summary = self
                    .store
                    .upsert_bills(&page.items)
                    .await
                    .with_context(|| format!("Failed to commit bills term {} page {}", term, page_index))?;
                report.pages += 1;
                report.inserted += summary.inserted;
                report.updated += summary.updated;

                tracing::info!(
                    "Bills term {} page {}: {} new, {} updated",
                    term,
                    page_index,
                    summary.inserted,
                    summary.updated
                );
                on_page(PassProgress {
                    page: report.pages,
                    processed: report.processed(),
                    total: page.total_count,
                });

                if page.row_count < self.page_size as usize {
                    break;
                }
                if page_index < self.max_pages {
                    tokio::time::sleep(self.page_delay).await;
                }
            }
        }

        tracing::info!(
            "Bill pass done: {} inserted, {} updated over {} pages",
            report.inserted,
            report.updated,
            report.pages
        );
        Ok(report)
    }
}

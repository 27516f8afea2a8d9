use std::collections::HashSet;
use std::time::Duration;

use crate::election::ElectionTable;
use crate::enrichment::{EnrichmentTarget, FallbackChain};
use crate::errors::{AppError, ResultExt};
use crate::identity::{apply_terms, find_or_create, screen, Screening};
use crate::models::{PassProgress, Person};
use crate::services::{AssemblyApiClient, MemberRecord};
use crate::store::MemberStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberPassReport {
    pub pages: u32,
    pub processed: u64,
    pub out_of_era: u64,
    pub not_elected: u64,
    pub enriched: u64,
}

/// Member sync pass: resolves each feed record to a person, enriches
/// persons that still lack a biography, and commits one page at a time.
pub struct MemberSync<'a> {
    pub api: &'a AssemblyApiClient,
    pub store: &'a dyn MemberStore,
    pub table: &'a ElectionTable,
    pub chain: &'a FallbackChain,
    pub page_size: u32,
    pub page_delay: Duration,
}

impl MemberSync<'_> {
    /// Runs the pass to the last page. Feed failures end the pass early;
    /// store failures abort it.
    pub async fn run<F>(&self, mut on_page: F) -> Result<MemberPassReport, AppError>
    where
        F: FnMut(PassProgress) + Send,
    {
        let mut report = MemberPassReport::default();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut page_index = 1;

        loop {
            let page = match self.api.fetch_members(page_index, self.page_size).await {
                Ok(page) => page,
                Err(e) if e.is_source_unavailable() => {
                    tracing::warn!("Member feed page {} failed, ending pass: {}", page_index, e);
                    break;
                }
                Err(e) => return Err(e),
            };
            if page.row_count == 0 {
                break;
            }

            let mut pending: Vec<Person> = Vec::new();
            for record in &page.items {
                if !seen.insert((record.name.clone(), record.birth_date.clone())) {
                    tracing::debug!("Already handled this pass: {} ({})", record.name, record.birth_date);
                    continue;
                }
                self.handle_record(record, &mut pending, &mut report).await?;
            }

            self.store
                .upsert_members(&pending)
                .await
                .with_context(|| format!("Failed to commit member page {}", page_index))?;

            report.pages += 1;
            tracing::info!(
                "Member page {} committed: {} persons ({} processed so far)",
                page_index,
                pending.len(),
                report.processed
            );
            on_page(PassProgress {
                page: page_index,
                processed: report.processed,
                total: page.total_count,
            });

            if page.row_count < self.page_size as usize {
                break;
            }
            page_index += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        Ok(report)
    }

    async fn handle_record(
        &self,
        record: &MemberRecord,
        pending: &mut Vec<Person>,
        report: &mut MemberPassReport,
    ) -> Result<(), AppError> {
        let terms = match screen(record, self.table) {
            Screening::Accepted(terms) => terms,
            Screening::OutOfEra => {
                tracing::debug!("Out of era: {} ({})", record.name, record.term_coverage);
                report.out_of_era += 1;
                return Ok(());
            }
            Screening::NotElected => {
                tracing::debug!("No election row for {}", record.name);
                report.not_elected += 1;
                return Ok(());
            }
        };

        let mut person = find_or_create(self.store, pending.as_slice(), record).await?;
        apply_terms(&mut person, record, &terms, self.table);

        if !person.has_biography() {
            let target = EnrichmentTarget {
                name: person.name.clone(),
                handle: person.english_name.clone(),
                raw_biography: record.raw_biography.clone(),
                terms: terms.clone(),
            };
            if let Some(found) = self.chain.enrich(&target).await {
                let added = person.absorb_items(&found.items);
                if let Some(homepage) = found.homepage {
                    person.homepage = Some(homepage);
                }
                report.enriched += 1;
                tracing::info!(
                    "Biography for {}: {} items (education {}, career {})",
                    person.name,
                    added,
                    person.education.len(),
                    person.career.len()
                );
            }
        }

        tracing::info!(
            "Processed {} ({:?}) - {}",
            person.name,
            person.sessions,
            person.party.as_deref().unwrap_or("-")
        );
        report.processed += 1;

        match pending.iter_mut().find(|p| p.id == person.id) {
            Some(slot) => *slot = person,
            None => pending.push(person),
        }
        Ok(())
    }
}

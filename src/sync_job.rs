use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

use crate::bills::BillSync;
use crate::config::Config;
use crate::dedup::deduplicate;
use crate::election::ElectionTable;
use crate::enrichment::FallbackChain;
use crate::errors::AppError;
use crate::lexicon::Lexicon;
use crate::members::MemberSync;
use crate::models::{PassProgress, SyncJobStatus, SyncMode};
use crate::profile_fetcher::ProfileFetcher;
use crate::services::AssemblyApiClient;
use crate::store::{BillStore, MemberStore};

/// Read-only view of the job status.
#[derive(Clone)]
pub struct SyncStatusReader {
    rx: watch::Receiver<SyncJobStatus>,
}

impl SyncStatusReader {
    pub fn snapshot(&self) -> SyncJobStatus {
        self.rx.borrow().clone()
    }

    /// Waits until the job is no longer running and returns the final status.
    pub async fn wait_idle(&mut self) -> SyncJobStatus {
        let done = self.rx.wait_for(|s| !s.running).await.map(|s| s.clone()).ok();
        done.unwrap_or_else(|| self.snapshot())
    }
}

/// Everything a job needs, built once per process.
pub struct SyncContext {
    pub config: Config,
    pub api: AssemblyApiClient,
    pub chain: FallbackChain,
    pub members: Arc<dyn MemberStore>,
    pub bills: Arc<dyn BillStore>,
}

impl SyncContext {
    pub fn new(
        config: Config,
        members: Arc<dyn MemberStore>,
        bills: Arc<dyn BillStore>,
    ) -> Result<Self, AppError> {
        let lexicon = Lexicon::load(config.lexicon_path.as_deref())?;
        let api = AssemblyApiClient::new(&config)?;
        let fetcher = ProfileFetcher::new(&config)?;
        let chain = FallbackChain::standard(api.clone(), fetcher, &lexicon)?;

        Ok(Self {
            config,
            api,
            chain,
            members,
            bills,
        })
    }
}

/// Share of the progress bar a stage owns.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: u8,
    end: u8,
}

impl Span {
    const FULL: Span = Span { start: 0, end: 100 };

    fn at(&self, progress: &PassProgress) -> u8 {
        let fraction = match progress.total {
            Some(total) if total > 0 => (progress.processed as f64 / total as f64).min(1.0),
            _ => progress.page as f64 / (progress.page as f64 + 1.0),
        };
        let width = f64::from(self.end - self.start);
        self.start + (width * fraction).floor() as u8
    }
}

#[derive(Clone)]
struct StatusHandle {
    tx: Arc<watch::Sender<SyncJobStatus>>,
}

impl StatusHandle {
    /// Claims the job slot; `false` when a job is already running.
    fn try_claim(&self, mode: SyncMode) -> bool {
        self.tx.send_if_modified(|status| {
            if status.running {
                return false;
            }
            *status = SyncJobStatus {
                running: true,
                message: format!("Starting {:?} sync", mode),
                start_time: Some(Utc::now()),
                ..Default::default()
            };
            true
        })
    }

    fn stage(&self, progress: u8, message: &str) {
        self.tx.send_modify(|status| {
            status.progress = status.progress.max(progress);
            status.message = message.to_string();
        });
    }

    fn page(&self, label: &str, span: Span, progress: &PassProgress) {
        let pct = span.at(progress);
        self.tx.send_modify(|status| {
            status.progress = status.progress.max(pct);
            status.processed = progress.processed;
            status.message = match progress.total {
                Some(total) => format!(
                    "{}: page {} ({}/{})",
                    label, progress.page, progress.processed, total
                ),
                None => format!("{}: page {} ({})", label, progress.page, progress.processed),
            };
        });
    }

    fn finish(&self, message: String) {
        self.tx.send_modify(|status| {
            status.running = false;
            status.completed = true;
            status.progress = 100;
            status.error = None;
            status.message = message;
        });
    }

    fn fail(&self, error: &AppError) {
        self.tx.send_modify(|status| {
            status.running = false;
            status.completed = false;
            status.error = Some(error.to_string());
            status.message = "Sync failed".to_string();
        });
    }
}

/// Starts and tracks sync jobs. At most one job runs at a time.
///
/// The status lives in a `watch` channel: the orchestrator owns the sender
/// and everybody else gets a [`SyncStatusReader`].
#[derive(Clone)]
pub struct SyncOrchestrator {
    status: StatusHandle,
    context: Arc<SyncContext>,
}

impl SyncOrchestrator {
    pub fn new(context: SyncContext) -> Self {
        let (tx, _rx) = watch::channel(SyncJobStatus::default());
        Self {
            status: StatusHandle { tx: Arc::new(tx) },
            context: Arc::new(context),
        }
    }

    pub fn status(&self) -> SyncStatusReader {
        SyncStatusReader {
            rx: self.status.tx.subscribe(),
        }
    }

    /// Claims the slot and spawns the job. Rejects instead of queueing when
    /// a job is already running.
    pub fn start(&self, mode: SyncMode) -> Result<SyncJobStatus, AppError> {
        if !self.status.try_claim(mode) {
            tracing::warn!("Sync start rejected: a job is already running");
            return Err(AppError::Conflict("Sync already running".to_string()));
        }

        let status = self.status.clone();
        let context = self.context.clone();
        supervise(self.status.clone(), async move {
            run_job(&context, &status, mode).await;
        });

        Ok(self.status().snapshot())
    }

    /// Claims the slot and runs the job on the current task.
    pub async fn run_to_completion(&self, mode: SyncMode) -> Result<SyncJobStatus, AppError> {
        if !self.status.try_claim(mode) {
            return Err(AppError::Conflict("Sync already running".to_string()));
        }
        run_job(&self.context, &self.status, mode).await;
        Ok(self.status().snapshot())
    }
}

/// Spawns `job` and releases the slot with an error if it panics.
fn supervise<F>(status: StatusHandle, job: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let handle = tokio::spawn(job);
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            tracing::error!("Sync job aborted: {}", e);
            status.fail(&AppError::InternalError(format!("Sync job aborted: {}", e)));
        }
    });
}

async fn run_job(context: &SyncContext, status: &StatusHandle, mode: SyncMode) {
    tracing::info!("Sync job started: {:?}", mode);
    match run_stages(context, status, mode).await {
        Ok(message) => {
            tracing::info!("Sync job finished: {}", message);
            status.finish(message);
        }
        Err(e) => {
            tracing::error!("Sync job failed: {}", e);
            status.fail(&e);
        }
    }
}

async fn run_stages(
    context: &SyncContext,
    status: &StatusHandle,
    mode: SyncMode,
) -> Result<String, AppError> {
    let config = &context.config;
    let (dedup_span, member_span, bill_span) = match mode {
        SyncMode::Full => (
            Some(Span { start: 0, end: 10 }),
            Some(Span { start: 10, end: 80 }),
            Some(Span { start: 80, end: 100 }),
        ),
        SyncMode::Members => (None, Some(Span::FULL), None),
        SyncMode::Bills => (None, None, Some(Span::FULL)),
        SyncMode::Dedup => (Some(Span::FULL), None, None),
    };

    // Loaded up front so a missing table fails the job before any writes.
    let table = match member_span {
        Some(_) => Some(ElectionTable::load(&config.election_csv_path)?),
        None => None,
    };

    let mut summary = Vec::new();
    let mut first_stage = true;

    if let Some(span) = dedup_span {
        status.stage(span.start, "Deduplicating persons");
        let report = deduplicate(context.members.as_ref(), config.dedup_policy).await?;
        status.stage(span.end, "Deduplication done");
        summary.push(format!(
            "dedup merged {} groups ({} removed)",
            report.groups_merged, report.records_removed
        ));
        first_stage = false;
    }

    if let (Some(span), Some(table)) = (member_span, table.as_ref()) {
        if !first_stage {
            tokio::time::sleep(config.stage_delay()).await;
        }
        status.stage(span.start, "Syncing members");
        let pass = MemberSync {
            api: &context.api,
            store: context.members.as_ref(),
            table,
            chain: &context.chain,
            page_size: config.page_size,
            page_delay: config.page_delay(),
        };
        let report = pass.run(|p| status.page("members", span, &p)).await?;
        summary.push(format!(
            "members {} processed, {} enriched",
            report.processed, report.enriched
        ));
        first_stage = false;
    }

    if let Some(span) = bill_span {
        if !first_stage {
            tokio::time::sleep(config.stage_delay()).await;
        }
        status.stage(span.start, "Syncing bills");
        let pass = BillSync {
            api: &context.api,
            store: context.bills.as_ref(),
            page_size: config.page_size,
            max_pages: config.bill_max_pages,
            page_delay: config.page_delay(),
            term_delay: config.term_delay(),
        };
        let report = pass.run(|p| status.page("bills", span, &p)).await?;
        summary.push(format!(
            "bills {} new, {} updated",
            report.inserted, report.updated
        ));
    }

    let missing = context.members.count_missing_biography().await?;
    if missing > 0 {
        tracing::warn!("{} current persons still lack education/career data", missing);
    }
    summary.push(format!("{} persons missing biography", missing));

    Ok(format!("Sync complete: {}", summary.join("; ")))
}

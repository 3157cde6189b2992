//! Pipeline driver: sequences eligibility, resolution, ingest, and publish
//! over a batch of record ids with bounded concurrency.
//!
//! Records run in parallel under a semaphore; within one record, the manifest
//! is fully resolved before any asset work starts (ordinal assignment depends
//! on manifest order), then assets proceed independently. Ordinals are carried
//! as data from resolution through storage paths and page titles, so
//! out-of-order completion can never corrupt numbering.
//!
//! Partial-failure isolation is the driver's contract: every per-record and
//! per-asset error is caught at this boundary, classified, counted on the
//! [`Tracker`], and logged with the record/asset identifiers. Nothing short of
//! a startup error aborts the run.
//!
//! Each spawned worker constructs its own [`FetchClient`]; HTTP retry and
//! connection state are never shared across workers.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::eligibility::Evaluator;
use crate::http::{FetchClient, RetryPolicy};
use crate::ingest::{IngestOutcome, Ingestor};
use crate::manifest::ManifestResolver;
use crate::publish::{PublishError, PublishOutcome, Publisher, classify_upload_failure};
use crate::record::provider::ProviderDirectory;
use crate::record::{AggregatorClient, AggregatorError, Record};
use crate::store::{MediaStore, paths};
use crate::tracker::{Outcome, Tracker};
use crate::wiki::WikiRepository;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 50;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Error type for pipeline construction and scheduling.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Static configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Partner identifier; prefixes every storage path.
    pub partner: String,
    /// Aggregator item-API base URL.
    pub aggregator_url: String,
    /// Aggregator API key.
    pub api_key: String,
    /// Maximum records in flight.
    pub concurrency: usize,
    /// Retry budget for idempotent HTTP calls.
    pub max_retries: u32,
    /// Re-fetch assets whose destination is already populated.
    pub overwrite: bool,
    /// Run every check but withhold uploads.
    pub dry_run: bool,
}

/// Drives the ingestion and publication stages.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    store: MediaStore,
    directory: Arc<ProviderDirectory>,
    denylist: Arc<HashSet<String>>,
    tracker: Arc<Tracker>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("partner", &self.config.partner)
            .field("concurrency", &self.config.concurrency)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline over loaded run-wide state.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConcurrency`] when the configured value
    /// is outside the valid range.
    pub fn new(
        config: PipelineConfig,
        store: MediaStore,
        directory: ProviderDirectory,
        denylist: HashSet<String>,
    ) -> Result<Self, PipelineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&config.concurrency) {
            return Err(PipelineError::InvalidConcurrency {
                value: config.concurrency,
            });
        }

        debug!(
            partner = %config.partner,
            concurrency = config.concurrency,
            max_retries = config.max_retries,
            "creating pipeline"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            directory: Arc::new(directory),
            denylist: Arc::new(denylist),
            tracker: Arc::new(Tracker::new()),
        })
    }

    /// Returns the run's tracker.
    #[must_use]
    pub fn tracker(&self) -> Arc<Tracker> {
        Arc::clone(&self.tracker)
    }

    /// Runs the download stage (eligibility, resolution, ingest) over a batch.
    ///
    /// Individual record failures never abort the batch; they are tracked and
    /// the run proceeds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SemaphoreClosed`] if scheduling itself breaks.
    #[instrument(skip(self, record_ids), fields(records = record_ids.len()))]
    pub async fn run_download(&self, record_ids: &[String]) -> Result<(), PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(record_ids.len());

        info!("starting download stage");

        for record_id in record_ids {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::SemaphoreClosed)?;

            let record_id = record_id.clone();
            let config = Arc::clone(&self.config);
            let store = self.store.clone();
            let directory = Arc::clone(&self.directory);
            let denylist = Arc::clone(&self.denylist);
            let tracker = Arc::clone(&self.tracker);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                download_record(&record_id, &config, &store, &directory, &denylist, &tracker)
                    .await;
            }));
        }

        join_worker_handles(handles).await;

        info!(summary = %self.tracker.summary(), "download stage complete");
        Ok(())
    }

    /// Runs the publish stage over a batch of already-ingested records.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SemaphoreClosed`] if scheduling itself breaks.
    #[instrument(skip(self, record_ids, wiki), fields(records = record_ids.len()))]
    pub async fn run_publish(
        &self,
        record_ids: &[String],
        wiki: Arc<dyn WikiRepository>,
    ) -> Result<(), PipelineError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(record_ids.len());

        info!(dry_run = self.config.dry_run, "starting publish stage");

        for record_id in record_ids {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| PipelineError::SemaphoreClosed)?;

            let record_id = record_id.clone();
            let config = Arc::clone(&self.config);
            let store = self.store.clone();
            let tracker = Arc::clone(&self.tracker);
            let wiki = Arc::clone(&wiki);

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                publish_record(&record_id, &config, &store, wiki.as_ref(), &tracker).await;
            }));
        }

        join_worker_handles(handles).await;

        info!(summary = %self.tracker.summary(), "publish stage complete");
        Ok(())
    }
}

/// Awaits worker tasks; panics are logged, never propagated.
async fn join_worker_handles(handles: Vec<tokio::task::JoinHandle<()>>) {
    debug!(task_count = handles.len(), "waiting for workers");
    for handle in handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "worker task panicked");
        }
    }
}

/// Full download path for one record. Never returns an error: every failure
/// is classified and tracked here.
#[instrument(skip_all, fields(record_id = %record_id))]
async fn download_record(
    record_id: &str,
    config: &PipelineConfig,
    store: &MediaStore,
    directory: &ProviderDirectory,
    denylist: &HashSet<String>,
    tracker: &Tracker,
) {
    // One client per worker, never shared across tasks.
    let http = FetchClient::with_policy(RetryPolicy::with_max_attempts(config.max_retries));
    let aggregator = AggregatorClient::new(&http, &config.aggregator_url, &config.api_key);

    let mut record = match aggregator.fetch_record(record_id).await {
        Ok(record) => record,
        Err(AggregatorError::NotFound { .. }) => {
            warn!("record not found in aggregator");
            tracker.increment(Outcome::RecordNotFound);
            return;
        }
        Err(e) => {
            warn!(error = %e, "record fetch failed");
            tracker.increment(Outcome::RecordFailed);
            return;
        }
    };

    if !evaluate_record(&http, denylist, directory, &mut record).await {
        tracker.increment(Outcome::Ineligible);
        return;
    }

    let resolver = ManifestResolver::new(&http, store, &config.partner);
    let urls = match resolver.resolve_asset_urls(&record).await {
        Ok(urls) => urls,
        Err(e) => {
            warn!(error = %e, "manifest resolution failed");
            tracker.increment(Outcome::ManifestFailed);
            return;
        }
    };

    let ingestor = Ingestor::new(&http, store, &config.partner);

    // Side files go out as soon as the URL list is known, before any asset
    // work, so a partially failed run still leaves a discoverable record.
    if let Err(e) = ingestor.write_side_files(&record, &urls).await {
        warn!(error = %e, "side-file write failed");
        tracker.increment(Outcome::RecordFailed);
        return;
    }

    if urls.is_empty() {
        info!("no assets resolved for record");
        return;
    }

    // Ordinal is carried as data; completion order cannot renumber pages.
    let ingests = urls.iter().enumerate().map(|(index, url)| {
        let ordinal = index + 1;
        let record = &record;
        let ingestor = &ingestor;
        async move { (ordinal, ingestor.ingest(record, ordinal, url, config.overwrite).await) }
    });

    for (ordinal, result) in join_all(ingests).await {
        match result {
            Ok(IngestOutcome::Stored { size_bytes, .. }) => {
                tracker.increment(Outcome::Stored);
                tracker.add_bytes(size_bytes);
            }
            Ok(IngestOutcome::SkippedExists) => tracker.increment(Outcome::SkippedExists),
            Ok(IngestOutcome::InvalidType { content_type }) => {
                info!(ordinal, content_type = %content_type, "asset rejected by type check");
                tracker.increment(Outcome::InvalidType);
            }
            Err(e) => {
                warn!(ordinal, error = %e, "asset ingest failed");
                tracker.increment(Outcome::FailedIngest);
            }
        }
    }
}

/// Eligibility wrapper: looks up directory entries and runs the evaluator.
async fn evaluate_record(
    http: &FetchClient,
    denylist: &HashSet<String>,
    directory: &ProviderDirectory,
    record: &mut Record,
) -> bool {
    let provider_name = record.provider_name.clone().unwrap_or_default();
    let data_provider_name = record.data_provider_name.clone().unwrap_or_default();

    let provider = directory.provider(&provider_name);
    let data_provider = directory.data_provider(&provider_name, &data_provider_name);

    let evaluator = Evaluator::new(http, denylist);
    evaluator
        .evaluate(record, provider, data_provider)
        .await
        .is_eligible()
}

/// Full publish path for one record. Never returns an error.
#[instrument(skip_all, fields(record_id = %record_id))]
async fn publish_record(
    record_id: &str,
    config: &PipelineConfig,
    store: &MediaStore,
    wiki: &dyn WikiRepository,
    tracker: &Tracker,
) {
    let http = FetchClient::with_policy(RetryPolicy::with_max_attempts(config.max_retries));
    let aggregator = AggregatorClient::new(&http, &config.aggregator_url, &config.api_key);

    let record = match aggregator.fetch_record(record_id).await {
        Ok(record) => record,
        Err(AggregatorError::NotFound { .. }) => {
            warn!("record not found in aggregator");
            tracker.increment(Outcome::RecordNotFound);
            return;
        }
        Err(e) => {
            warn!(error = %e, "record fetch failed");
            tracker.increment(Outcome::RecordFailed);
            return;
        }
    };

    // The file-list side file is the source of truth for how many asset
    // slots the download stage resolved, empty slots included.
    let file_list_path = paths::file_list_path(&config.partner, &record.id);
    let slots = match store.get_bytes(&file_list_path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        Err(e) => {
            warn!(error = %e, "no asset list stored for record; run download first");
            tracker.increment(Outcome::RecordFailed);
            return;
        }
    };

    if slots.is_empty() {
        info!("record has no stored assets to publish");
        return;
    }

    let publisher = Publisher::new(store, wiki, &config.partner);
    let total_assets = slots.len();

    for ordinal in 1..=total_assets {
        match publisher
            .publish(&record, ordinal, total_assets, config.dry_run)
            .await
        {
            Ok(PublishOutcome::Published { title }) => {
                info!(ordinal, title = %title, "published");
                tracker.increment(Outcome::Published);
            }
            Ok(PublishOutcome::Duplicate { existing }) => {
                info!(ordinal, existing = %existing, "duplicate at target");
                tracker.increment(Outcome::Duplicate);
            }
            Ok(PublishOutcome::Skipped { reason }) => {
                info!(ordinal, reason = reason.label(), "publish skipped");
                tracker.increment(Outcome::SkippedPublish);
            }
            Ok(PublishOutcome::DryRun { title }) => {
                info!(ordinal, title = %title, "dry run, upload withheld");
                tracker.increment(Outcome::DryRun);
            }
            Err(PublishError::Wiki(e)) => {
                let kind = classify_upload_failure(&e.to_string());
                warn!(ordinal, failure = kind.label(), error = %e, "upload failed");
                tracker.increment(Outcome::FailedPublish);
            }
            Err(e) => {
                warn!(ordinal, error = %e, "publish failed");
                tracker.increment(Outcome::FailedPublish);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        PipelineConfig {
            partner: "p".to_string(),
            aggregator_url: "https://api.example.org/v2/items".to_string(),
            api_key: "key".to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            max_retries: 1,
            overwrite: false,
            dry_run: false,
        }
    }

    fn pipeline_with_concurrency(concurrency: usize) -> Result<Pipeline, PipelineError> {
        let mut config = config();
        config.concurrency = concurrency;
        Pipeline::new(
            config,
            MediaStore::in_memory(),
            ProviderDirectory::default(),
            HashSet::new(),
        )
    }

    #[test]
    fn test_pipeline_new_valid_concurrency() {
        assert!(pipeline_with_concurrency(1).is_ok());
        assert!(pipeline_with_concurrency(DEFAULT_CONCURRENCY).is_ok());
        assert!(pipeline_with_concurrency(MAX_CONCURRENCY).is_ok());
    }

    #[test]
    fn test_pipeline_new_invalid_concurrency() {
        assert!(matches!(
            pipeline_with_concurrency(0),
            Err(PipelineError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            pipeline_with_concurrency(MAX_CONCURRENCY + 1),
            Err(PipelineError::InvalidConcurrency { .. })
        ));
    }

    #[test]
    fn test_pipeline_error_display() {
        let error = PipelineError::InvalidConcurrency { value: 0 };
        let msg = error.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains('0'));
    }

    #[tokio::test]
    async fn test_run_download_empty_batch_is_clean() {
        let pipeline = pipeline_with_concurrency(2).unwrap();
        pipeline.run_download(&[]).await.unwrap();
        assert_eq!(pipeline.tracker().summary(), "nothing to report");
    }
}

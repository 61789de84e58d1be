//! Background sync service feeding a [`JobStore`] from a [`JobSource`].

use crate::conf_cache::{
    ConfCache, ConfCountersRecord, JobConfRecord, normalize_conf, normalize_conf_counters,
};
use crate::detail::{DetailLimits, JobDetailView};
use crate::error::{ActionError, FetchError, TransportError};
use crate::normalize::normalize;
use crate::source::{JobSource, JobStream};
use crate::store::{BulkOutcome, JobStore, ModelListener, StoreConfig, SubscriptionId, TickReport};
use crate::view::{ClusterSummary, DISPLAY_LIMIT, JobView, ViewSpec};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval;
use timberlake_parsers::canonical_job_id;

/// Configuration for the sync service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often buffered stream updates are flushed into the model.
    pub flush_interval: Duration,
    /// Wait before reconnecting the stream or retrying the bulk fetch.
    pub stream_retry_delay: Duration,
    pub store: StoreConfig,
    /// Rows per table.
    pub display_limit: usize,
    pub detail_limits: DetailLimits,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            stream_retry_delay: Duration::from_secs(5),
            store: StoreConfig::default(),
            display_limit: DISPLAY_LIMIT,
            detail_limits: DetailLimits::default(),
        }
    }
}

/// Owns the store and the tasks that keep it current.
///
/// Dropping the service (or calling [`SyncService::shutdown`]) aborts the
/// bulk fetch, the stream reader and the flush ticker.
pub struct SyncService<S: JobSource> {
    store: Arc<Mutex<JobStore>>,
    source: Arc<S>,
    conf_cache: Arc<Mutex<ConfCache>>,
    config: SyncConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: JobSource> SyncService<S> {
    pub fn new(source: S, config: SyncConfig) -> Self {
        Self {
            store: Arc::new(Mutex::new(JobStore::new(config.store.clone()))),
            source: Arc::new(source),
            conf_cache: Arc::new(Mutex::new(ConfCache::new())),
            config,
            tasks: Vec::new(),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Shared handle to the store.
    pub fn store(&self) -> Arc<Mutex<JobStore>> {
        self.store.clone()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|t| !t.is_finished())
    }

    /// Start the bulk fetch, the stream reader and the flush ticker.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.tasks.clear();

        let retry = self.config.stream_retry_delay;
        self.tasks.push(tokio::spawn(run_bulk_fetch(
            self.store.clone(),
            self.source.clone(),
            retry,
        )));
        self.tasks.push(tokio::spawn(run_stream(
            self.store.clone(),
            self.source.clone(),
            retry,
        )));
        self.tasks.push(tokio::spawn(run_flush(
            self.store.clone(),
            self.config.flush_interval,
        )));
        tracing::info!("Sync service started");
    }

    /// Abort every background task. The store keeps its last state.
    pub fn shutdown(&mut self) {
        if self.tasks.is_empty() {
            return;
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
        tracing::info!("Sync service stopped");
    }

    /// Fetch the job list once and merge it.
    pub async fn refresh_list(&self) -> Result<BulkOutcome, TransportError> {
        let records = self.source.fetch_job_list().await?;
        Ok(self.store.lock().await.ingest_bulk(records))
    }

    /// Open a job in detail: pin it and fetch its full record.
    ///
    /// The record is buffered like a stream update and shows up on the next
    /// flush. Errors are logged and returned; the model is left unchanged.
    pub async fn focus(&self, id: &str) -> Result<(), FetchError> {
        let id = canonical_job_id(id);
        self.store.lock().await.focus(&id);

        let result = async {
            let raw = self.source.fetch_job_detail(&id).await?;
            let job = normalize(raw)?;
            self.store.lock().await.buffer_update(job);
            Ok::<(), FetchError>(())
        }
        .await;

        if let Err(e) = &result {
            tracing::error!("Error fetching job {}: {}", id, e);
        }
        result
    }

    pub async fn unfocus(&self) {
        self.store.lock().await.unfocus();
    }

    pub async fn subscribe(&self, listener: ModelListener) -> SubscriptionId {
        self.store.lock().await.subscribe(listener)
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.lock().await.unsubscribe(id)
    }

    /// Flush buffered updates now instead of waiting for the ticker.
    pub async fn flush(&self) -> TickReport {
        self.store.lock().await.tick()
    }

    /// Table rows for `spec`. A spec limit above the display cap is lowered to it.
    pub async fn get_view(&self, spec: &ViewSpec) -> JobView {
        let spec = spec.clone().with_limit(spec.limit.min(self.config.display_limit));
        self.store.lock().await.view(&spec, Utc::now())
    }

    pub async fn cluster_summary(&self) -> ClusterSummary {
        self.store.lock().await.cluster_summary()
    }

    pub async fn job_detail(&self, id: &str) -> Option<JobDetailView> {
        self.store
            .lock()
            .await
            .detail(id, &self.config.detail_limits, Utc::now())
    }

    /// Configuration of one job, fetched once and then served from cache.
    pub async fn job_conf(&self, id: &str) -> Result<JobConfRecord, FetchError> {
        if let Some(record) = self.conf_cache.lock().await.conf(id) {
            return Ok(record.clone());
        }
        let record = normalize_conf(self.source.fetch_job_conf(id).await?)?;
        self.conf_cache
            .lock()
            .await
            .insert_conf(id, record.clone());
        Ok(record)
    }

    /// Configuration and counters of one job, cached like [`Self::job_conf`].
    pub async fn job_conf_counters(&self, id: &str) -> Result<ConfCountersRecord, FetchError> {
        if let Some(record) = self.conf_cache.lock().await.conf_counters(id) {
            return Ok(record.clone());
        }
        let record = normalize_conf_counters(self.source.fetch_job_conf_counters(id).await?)?;
        self.conf_cache
            .lock()
            .await
            .insert_conf_counters(id, record.clone());
        Ok(record)
    }

    /// Ask the tracker to kill a job. The model only changes when the
    /// tracker reports the new state.
    pub async fn kill_job(&self, id: &str) -> Result<(), ActionError> {
        let id = canonical_job_id(id);
        if let Some(job) = self.store.lock().await.get(&id) {
            if !job.state.is_active() {
                return Err(ActionError::NotActive(id));
            }
        }

        let response = self
            .source
            .kill_job(&id)
            .await
            .map_err(|source| ActionError::Transport {
                id: id.clone(),
                source,
            })?;

        if response.ok {
            tracing::info!("Kill request for {} accepted", id);
            Ok(())
        } else {
            Err(ActionError::Rejected {
                id,
                stderr: response.stderr,
            })
        }
    }
}

impl<S: JobSource> Drop for SyncService<S> {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Fetch the job list, retrying until it succeeds once.
async fn run_bulk_fetch<S: JobSource>(
    store: Arc<Mutex<JobStore>>,
    source: Arc<S>,
    retry: Duration,
) {
    loop {
        match source.fetch_job_list().await {
            Ok(records) => {
                let outcome = store.lock().await.ingest_bulk(records);
                tracing::info!(
                    "Loaded job list: {} new, {} known, {} malformed",
                    outcome.added,
                    outcome.kept,
                    outcome.dropped
                );
                return;
            }
            Err(e) => {
                tracing::error!("Error fetching job list: {}", e);
                tokio::time::sleep(retry).await;
            }
        }
    }
}

/// Read the update stream into the pending buffer, reconnecting on failure.
async fn run_stream<S: JobSource>(store: Arc<Mutex<JobStore>>, source: Arc<S>, retry: Duration) {
    loop {
        match source.subscribe_job_stream().await {
            Ok(mut stream) => {
                tracing::info!("Connected to job update stream");
                loop {
                    match stream.next_record().await {
                        Ok(Some(record)) => {
                            store.lock().await.ingest_streamed(record);
                        }
                        Ok(None) => {
                            tracing::warn!("Job update stream closed by server");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("Error reading job update stream: {}", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                tracing::error!("Error connecting to job update stream: {}", e);
            }
        }
        tokio::time::sleep(retry).await;
    }
}

async fn run_flush(store: Arc<Mutex<JobStore>>, period: Duration) {
    let mut ticker = interval(period);

    // Skip the first tick (fires immediately)
    ticker.tick().await;

    loop {
        ticker.tick().await;
        store.lock().await.tick();
    }
}

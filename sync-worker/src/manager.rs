//! CacheManager - the background worker's lifecycle and interception logic.
//!
//! The manager interprets the pure lifecycle machine from sync-core and the
//! routing decisions of [`ScopePolicy`], performing the actual I/O through
//! the [`Fetcher`] and [`CacheStorage`] traits.
//!
//! ```text
//! install ──► Waiting ──SKIP_WAITING──► Activating ──► Active (intercepts)
//!    │
//!    └─ any manifest failure ──► Redundant (new bucket discarded)
//! ```
//!
//! Until this version is active, the bucket recorded as active in storage
//! keeps answering requests, so a failed install or a restart while offline
//! never leaves pages without their cache.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use offline_sync_core::{
    bucket_name, request_key, stale_buckets, LifecycleAction, LifecycleEvent, Route, ScopePolicy,
    WorkerState,
};
use offline_sync_types::{HttpMethod, WorkerMessage};
use serde::Serialize;
use tokio::sync::broadcast;
use url::Url;

use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::fetch::{FetchRequest, FetchResponse, Fetcher};
use crate::storage::CacheStorage;

/// Capacity of the page broadcast channel.
pub const PAGE_CHANNEL_CAPACITY: usize = 16;

/// Snapshot of the worker for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    /// Lifecycle state name.
    pub state: &'static str,
    /// Current bucket name.
    pub bucket: String,
    /// Entries in the current bucket.
    pub entries: u64,
    /// Bucket answering intercepted requests, if any.
    pub serving: Option<String>,
}

/// Background worker: precache, activate, intercept.
pub struct CacheManager {
    bucket: String,
    prefix: String,
    manifest: Vec<String>,
    fallback_page: String,
    sync_tag: String,
    skip_waiting: bool,
    policy: ScopePolicy,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn CacheStorage>,
    state: Mutex<WorkerState>,
    pages: broadcast::Sender<WorkerMessage>,
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("bucket", &self.bucket)
            .field("policy", &self.policy)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Create a manager for the configured build version.
    pub fn new(
        config: &WorkerConfig,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn CacheStorage>,
    ) -> Result<Self> {
        let policy = ScopePolicy::new(
            config.origin()?,
            config.scope.allowed_hosts.clone(),
            &config.scope.api_prefix,
        );
        let (pages, _) = broadcast::channel(PAGE_CHANNEL_CAPACITY);

        Ok(Self {
            bucket: bucket_name(&config.cache.prefix, &config.cache.version),
            prefix: config.cache.prefix.clone(),
            manifest: config.manifest.urls.clone(),
            fallback_page: config.scope.fallback_page.clone(),
            sync_tag: config.sync.tag.clone(),
            skip_waiting: config.cache.skip_waiting,
            policy,
            fetcher,
            storage,
            state: Mutex::new(WorkerState::new()),
            pages,
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        self.lock_state().clone()
    }

    /// Name of this version's bucket.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The interception scope.
    pub fn policy(&self) -> &ScopePolicy {
        &self.policy
    }

    /// Health snapshot.
    pub async fn status(&self) -> WorkerStatus {
        let entries = match self.storage.entry_count(&self.bucket).await {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(error = %e, "failed to count cache entries");
                0
            }
        };
        WorkerStatus {
            state: self.state().name(),
            bucket: self.bucket.clone(),
            entries,
            serving: self.serving_bucket().await,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        // State transitions never panic while holding the lock.
        lock(&self.state)
    }

    /// Bucket that answers intercepted requests.
    ///
    /// This version's bucket once it is active, otherwise the complete
    /// bucket persisted as active by whichever version last activated.
    pub async fn serving_bucket(&self) -> Option<String> {
        if self.state().intercepts() {
            return Some(self.bucket.clone());
        }
        match self.storage.active_bucket().await {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read active bucket");
                None
            }
        }
    }

    fn transition(&self, event: LifecycleEvent) -> Vec<LifecycleAction> {
        let mut state = self.lock_state();
        let before = state.name();
        let (next, actions) = std::mem::take(&mut *state).on_event(event);
        *state = next;
        if before != state.name() {
            tracing::debug!(from = before, to = state.name(), "worker state changed");
        }
        actions
    }

    /// Precache the manifest into a new bucket.
    ///
    /// All-or-nothing: responses are gathered in memory and written in one
    /// transaction only if every manifest URL answered with a 2xx. On
    /// failure the worker becomes redundant, existing buckets are left
    /// untouched and the previously active bucket keeps serving. A bucket
    /// already completed by an earlier run of this version is reused without
    /// touching the network. On success the worker waits, or activates at
    /// once when `skip_waiting` is set, no earlier version is installed, or
    /// this version was already in control.
    pub async fn install(&self) -> Result<()> {
        let prior_versions = match self.storage.bucket_names().await {
            Ok(names) => names
                .into_iter()
                .filter(|name| name.starts_with(&self.prefix) && *name != self.bucket)
                .count(),
            Err(e) => return self.fail_install(e.into(), false).await,
        };
        let bucket_existed = match self.storage.has_bucket(&self.bucket).await {
            Ok(existed) => existed,
            Err(e) => return self.fail_install(e.into(), false).await,
        };
        let already_complete = match self.storage.is_complete(&self.bucket).await {
            Ok(complete) => complete,
            Err(e) => return self.fail_install(e.into(), bucket_existed).await,
        };
        let was_active = self.serving_bucket().await.as_deref() == Some(self.bucket.as_str());

        if already_complete {
            tracing::info!(bucket = %self.bucket, "bucket already installed, skipping precache");
        } else {
            tracing::info!(bucket = %self.bucket, urls = self.manifest.len(), "installing");

            let entries = match self.precache().await {
                Ok(entries) => entries,
                Err(e) => return self.fail_install(e, bucket_existed).await,
            };

            if let Err(e) = self.storage.put_all(&self.bucket, &entries).await {
                return self.fail_install(e.into(), bucket_existed).await;
            }
            tracing::info!(bucket = %self.bucket, entries = entries.len(), "installed");
        }

        self.transition(LifecycleEvent::InstallSucceeded);

        if self.skip_waiting || prior_versions == 0 || was_active {
            self.activate().await?;
        }
        Ok(())
    }

    async fn precache(&self) -> Result<Vec<(String, FetchResponse)>> {
        let mut entries = Vec::with_capacity(self.manifest.len());
        for raw in &self.manifest {
            let precache_error = |reason: String| WorkerError::Precache {
                url: raw.clone(),
                reason,
            };

            let url = self
                .policy
                .resolve(raw)
                .map_err(|e| precache_error(e.to_string()))?;
            let response = self
                .fetcher
                .fetch(&FetchRequest::get(url.clone()))
                .await
                .map_err(|e| precache_error(e.to_string()))?;
            if !response.is_ok() {
                return Err(precache_error(format!("status {}", response.status)));
            }

            entries.push((request_key(HttpMethod::Get, &url), response));
        }
        Ok(entries)
    }

    async fn fail_install(&self, error: WorkerError, bucket_existed: bool) -> Result<()> {
        tracing::error!(bucket = %self.bucket, error = %error, "install failed");

        let actions = self.transition(LifecycleEvent::InstallFailed {
            error: error.to_string(),
        });
        for action in actions {
            if action == LifecycleAction::DiscardNewBucket && !bucket_existed {
                if let Err(e) = self.storage.delete_bucket(&self.bucket).await {
                    tracing::warn!(error = %e, "failed to discard new bucket");
                }
            }
        }
        Err(error)
    }

    /// Activate a waiting worker: purge stale buckets and start intercepting.
    ///
    /// Returns `false` if the worker was not waiting.
    pub async fn activate(&self) -> Result<bool> {
        let actions = self.transition(LifecycleEvent::SkipWaiting);
        if actions.is_empty() {
            tracing::debug!(state = self.state().name(), "activate ignored");
            return Ok(false);
        }

        for action in actions {
            match action {
                LifecycleAction::PurgeStaleBuckets => {
                    if let Err(e) = self.purge_stale_buckets().await {
                        self.transition(LifecycleEvent::ActivationFailed {
                            error: e.to_string(),
                        });
                        return Err(e);
                    }
                }
                LifecycleAction::ClaimClients => {
                    if let Err(e) = self.storage.set_active(&self.bucket).await {
                        self.transition(LifecycleEvent::ActivationFailed {
                            error: e.to_string(),
                        });
                        return Err(e.into());
                    }
                    tracing::debug!("claiming clients");
                }
                LifecycleAction::DiscardNewBucket => {}
            }
        }

        self.transition(LifecycleEvent::ActivationComplete);
        tracing::info!(bucket = %self.bucket, "activated");
        Ok(true)
    }

    async fn purge_stale_buckets(&self) -> Result<()> {
        let names = self.storage.bucket_names().await?;
        for stale in stale_buckets(&names, &self.bucket) {
            self.storage.delete_bucket(stale).await?;
            tracing::info!(bucket = stale, "deleted stale bucket");
        }
        Ok(())
    }

    /// Answer an intercepted request.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Interception`] only when neither the network
    /// nor the cache can answer.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let Some(bucket) = self.serving_bucket().await else {
            return self.pass_through(&request).await;
        };

        match self
            .policy
            .route(request.method, &request.url, request.accept())
        {
            Route::Bypass => self.pass_through(&request).await,
            Route::NetworkFirst => self.network_first(&request, &bucket).await,
            Route::CacheFirst => self.cache_first(&request, &bucket).await,
        }
    }

    async fn pass_through(&self, request: &FetchRequest) -> Result<FetchResponse> {
        self.fetcher
            .fetch(request)
            .await
            .map_err(|e| interception_error(&request.url, e.to_string()))
    }

    async fn network_first(&self, request: &FetchRequest, bucket: &str) -> Result<FetchResponse> {
        let key = request_key(request.method, &request.url);
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    store_best_effort(self.storage.as_ref(), bucket, &key, &response).await;
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failed, trying cache");
                match self.lookup(bucket, &key).await {
                    Some(cached) => Ok(cached),
                    None => Err(interception_error(&request.url, e.to_string())),
                }
            }
        }
    }

    async fn cache_first(&self, request: &FetchRequest, bucket: &str) -> Result<FetchResponse> {
        let key = request_key(request.method, &request.url);

        if let Some(cached) = self.lookup(bucket, &key).await {
            self.spawn_refresh(request.clone(), bucket, key);
            return Ok(cached);
        }

        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_ok() {
                    store_best_effort(self.storage.as_ref(), bucket, &key, &response).await;
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "offline and uncached");
                match self.fallback(bucket).await {
                    Some(page) => Ok(page),
                    None => Err(interception_error(&request.url, e.to_string())),
                }
            }
        }
    }

    /// Refresh one cached entry in the background.
    ///
    /// At most one refresh per bucket entry is in flight.
    fn spawn_refresh(&self, request: FetchRequest, bucket: &str, key: String) {
        let slot = format!("{} {}", bucket, key);
        if !lock(&self.refreshing).insert(slot.clone()) {
            tracing::trace!(key = %key, "refresh already in flight");
            return;
        }

        let fetcher = Arc::clone(&self.fetcher);
        let storage = Arc::clone(&self.storage);
        let refreshing = Arc::clone(&self.refreshing);
        let bucket = bucket.to_string();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => {
                    store_best_effort(storage.as_ref(), &bucket, &key, &response).await;
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "refresh not stored");
                }
                Err(e) => {
                    tracing::debug!(url = %request.url, error = %e, "background refresh failed");
                }
            }
            lock(&refreshing).remove(&slot);
        });
    }

    async fn lookup(&self, bucket: &str, key: &str) -> Option<FetchResponse> {
        match self.storage.get(bucket, key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed");
                None
            }
        }
    }

    async fn fallback(&self, bucket: &str) -> Option<FetchResponse> {
        let url = self.policy.resolve(&self.fallback_page).ok()?;
        self.lookup(bucket, &request_key(HttpMethod::Get, &url)).await
    }

    /// Handle a message posted by a page.
    pub async fn handle_message(&self, message: WorkerMessage) -> Result<()> {
        match message {
            WorkerMessage::SkipWaiting => {
                self.activate().await?;
            }
            WorkerMessage::CacheUrl { url } => {
                self.cache_url(&url).await?;
            }
            WorkerMessage::SyncRequested { .. } => {
                tracing::debug!("ignoring page-bound message");
            }
        }
        Ok(())
    }

    async fn cache_url(&self, raw: &str) -> Result<()> {
        let cache_error = |reason: String| WorkerError::Precache {
            url: raw.to_string(),
            reason,
        };

        let url = self
            .policy
            .resolve(raw)
            .map_err(|e| cache_error(e.to_string()))?;
        let response = self
            .fetcher
            .fetch(&FetchRequest::get(url.clone()))
            .await
            .map_err(|e| cache_error(e.to_string()))?;
        if !response.is_ok() {
            return Err(cache_error(format!("status {}", response.status)));
        }

        let bucket = self
            .serving_bucket()
            .await
            .unwrap_or_else(|| self.bucket.clone());
        self.storage
            .put(&bucket, &request_key(HttpMethod::Get, &url), &response)
            .await?;
        tracing::debug!(%url, bucket = %bucket, "cached on request");
        Ok(())
    }

    /// Handle a platform background-sync signal.
    ///
    /// When the tag matches, every subscribed page is told to drain its
    /// queue. Returns the number of pages notified.
    pub fn on_background_sync(&self, tag: &str) -> usize {
        if tag != self.sync_tag {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return 0;
        }

        let delivered = self
            .pages
            .send(WorkerMessage::SyncRequested {
                tag: tag.to_string(),
            })
            .unwrap_or(0);
        tracing::info!(tag, pages = delivered, "sync requested");
        delivered
    }

    /// Receive worker→page messages.
    pub fn subscribe_pages(&self) -> broadcast::Receiver<WorkerMessage> {
        self.pages.subscribe()
    }

    /// Number of pages currently subscribed.
    pub fn page_count(&self) -> usize {
        self.pages.receiver_count()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn interception_error(url: &Url, reason: String) -> WorkerError {
    WorkerError::Interception {
        url: url.to_string(),
        reason,
    }
}

async fn store_best_effort(
    storage: &dyn CacheStorage,
    bucket: &str,
    key: &str,
    response: &FetchResponse,
) {
    if let Err(e) = storage.put(bucket, key, response).await {
        tracing::warn!(key, error = %e, "cache write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MockFetcher;
    use crate::storage::SqliteCacheStorage;
    use std::time::Duration;

    const SITE: &str = "http://site.test";

    fn config(version: &str) -> WorkerConfig {
        let mut config = WorkerConfig::default();
        config.cache.version = version.to_string();
        config.scope.origin = format!("{}/", SITE);
        config.scope.allowed_hosts = vec!["unpkg.com".into()];
        config.manifest.urls = vec![
            "/".into(),
            "/route".into(),
            "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js".into(),
        ];
        config
    }

    fn serve_manifest(fetcher: &MockFetcher, tag: &str) {
        fetcher.respond_with(&format!("{}/", SITE), FetchResponse::ok(format!("home {}", tag)));
        fetcher.respond_with(
            &format!("{}/route", SITE),
            FetchResponse::ok(format!("route {}", tag)),
        );
        fetcher.respond_with(
            "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js",
            FetchResponse::ok("L"),
        );
    }

    async fn manager(version: &str) -> (CacheManager, MockFetcher, Arc<SqliteCacheStorage>) {
        let storage = Arc::new(SqliteCacheStorage::in_memory().await.unwrap());
        manager_with(version, Arc::clone(&storage)).await
    }

    async fn manager_with(
        version: &str,
        storage: Arc<SqliteCacheStorage>,
    ) -> (CacheManager, MockFetcher, Arc<SqliteCacheStorage>) {
        let fetcher = MockFetcher::new();
        let manager = CacheManager::new(
            &config(version),
            Arc::new(fetcher.clone()),
            storage.clone(),
        )
        .unwrap();
        (manager, fetcher, storage)
    }

    async fn active(version: &str) -> (CacheManager, MockFetcher, Arc<SqliteCacheStorage>) {
        let (manager, fetcher, storage) = manager(version).await;
        serve_manifest(&fetcher, version);
        manager.install().await.unwrap();
        assert_eq!(manager.state(), WorkerState::Active);
        fetcher.clear_requests();
        (manager, fetcher, storage)
    }

    fn get(path: &str) -> FetchRequest {
        FetchRequest::get(Url::parse(&format!("{}{}", SITE, path)).unwrap())
    }

    #[tokio::test]
    async fn install_precaches_every_manifest_url() {
        let (manager, _, storage) = active("v1").await;
        assert_eq!(storage.entry_count(manager.bucket()).await.unwrap(), 3);
        assert_eq!(manager.bucket(), "candy-route-v1");
    }

    #[tokio::test]
    async fn failed_install_is_all_or_nothing() {
        let (manager, fetcher, storage) = manager("v1").await;
        serve_manifest(&fetcher, "v1");
        fetcher.respond_with(&format!("{}/route", SITE), FetchResponse::new(500));

        let err = manager.install().await.unwrap_err();

        assert!(matches!(err, WorkerError::Precache { .. }));
        assert!(matches!(manager.state(), WorkerState::Redundant { .. }));
        assert!(storage.bucket_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_upgrade_keeps_prior_bucket() {
        let (v1, _, storage) = active("v1").await;

        let (v2, fetcher, _) = manager_with("v2", Arc::clone(&storage)).await;
        serve_manifest(&fetcher, "v2");
        fetcher.fail("https://unpkg.com/leaflet@1.9.4/dist/leaflet.js");

        assert!(v2.install().await.is_err());
        assert_eq!(
            storage.bucket_names().await.unwrap(),
            vec!["candy-route-v1".to_string()]
        );
        assert_eq!(storage.entry_count(v1.bucket()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn failed_upgrade_leaves_prior_version_serving() {
        let (_, _, storage) = active("v1").await;

        let (v2, fetcher, _) = manager_with("v2", Arc::clone(&storage)).await;
        fetcher.set_offline(true);

        assert!(v2.install().await.is_err());
        assert!(matches!(v2.state(), WorkerState::Redundant { .. }));
        assert_eq!(v2.serving_bucket().await.as_deref(), Some("candy-route-v1"));

        let home = v2.handle_fetch(get("/")).await.unwrap();
        assert_eq!(home.body, b"home v1");
        let fallback = v2.handle_fetch(get("/customers/12")).await.unwrap();
        assert_eq!(fallback.body, b"home v1");
    }

    #[tokio::test]
    async fn restart_offline_reuses_installed_bucket() {
        let (_, _, storage) = active("v1").await;

        let (restarted, fetcher, _) = manager_with("v1", Arc::clone(&storage)).await;
        fetcher.set_offline(true);

        restarted.install().await.unwrap();

        assert_eq!(restarted.state(), WorkerState::Active);
        assert!(fetcher.requests().is_empty());
        assert_eq!(storage.entry_count(restarted.bucket()).await.unwrap(), 3);

        let home = restarted.handle_fetch(get("/")).await.unwrap();
        assert_eq!(home.body, b"home v1");
    }

    #[tokio::test]
    async fn restart_resumes_control_without_skip_waiting() {
        let (_, _, storage) = active("v1").await;
        storage.put("candy-route-v0", "k", &FetchResponse::ok("old")).await.unwrap();

        let mut cfg = config("v1");
        cfg.cache.skip_waiting = false;
        let fetcher = MockFetcher::new();
        fetcher.set_offline(true);
        let restarted = CacheManager::new(&cfg, Arc::new(fetcher), storage.clone()).unwrap();

        restarted.install().await.unwrap();
        assert_eq!(restarted.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn incomplete_bucket_is_precached_again() {
        let storage = Arc::new(SqliteCacheStorage::in_memory().await.unwrap());
        storage
            .put("candy-route-v1", "GET http://site.test/stale", &FetchResponse::ok("x"))
            .await
            .unwrap();

        let (manager, fetcher, _) = manager_with("v1", Arc::clone(&storage)).await;
        serve_manifest(&fetcher, "v1");
        manager.install().await.unwrap();

        assert_eq!(fetcher.requests().len(), 3);
        assert!(storage.is_complete("candy-route-v1").await.unwrap());
    }

    #[tokio::test]
    async fn waiting_version_does_not_serve_its_own_bucket() {
        let (_, _, storage) = active("v1").await;

        let mut cfg = config("v2");
        cfg.cache.skip_waiting = false;
        let fetcher = MockFetcher::new();
        serve_manifest(&fetcher, "v2");
        let v2 = CacheManager::new(&cfg, Arc::new(fetcher.clone()), storage.clone()).unwrap();
        v2.install().await.unwrap();
        fetcher.set_offline(true);

        let home = v2.handle_fetch(get("/")).await.unwrap();
        assert_eq!(home.body, b"home v1");
    }

    #[tokio::test]
    async fn activation_deletes_stale_buckets() {
        let (_, _, storage) = active("v1").await;
        storage.put("unrelated", "k", &FetchResponse::ok("x")).await.unwrap();

        let (v2, fetcher, _) = manager_with("v2", Arc::clone(&storage)).await;
        serve_manifest(&fetcher, "v2");
        v2.install().await.unwrap();

        assert_eq!(v2.state(), WorkerState::Active);
        assert_eq!(
            storage.bucket_names().await.unwrap(),
            vec!["candy-route-v2".to_string()]
        );
        let home = storage
            .get("candy-route-v2", &request_key(HttpMethod::Get, &get("/").url))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(home.body, b"home v2");
    }

    #[tokio::test]
    async fn upgrade_waits_without_skip_waiting() {
        let (_, _, storage) = active("v1").await;

        let mut cfg = config("v2");
        cfg.cache.skip_waiting = false;
        let fetcher = MockFetcher::new();
        serve_manifest(&fetcher, "v2");
        let v2 = CacheManager::new(&cfg, Arc::new(fetcher.clone()), storage.clone()).unwrap();

        v2.install().await.unwrap();
        assert!(v2.state().is_waiting());
        assert_eq!(storage.bucket_names().await.unwrap().len(), 2);

        v2.handle_message(WorkerMessage::SkipWaiting).await.unwrap();
        assert_eq!(v2.state(), WorkerState::Active);
        assert_eq!(storage.bucket_names().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn not_intercepting_before_activation() {
        let (manager, fetcher, _) = manager("v1").await;
        fetcher.set_offline(true);

        let err = manager.handle_fetch(get("/")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Interception { .. }));
    }

    #[tokio::test]
    async fn cache_first_answers_without_waiting_then_refreshes() {
        let (manager, fetcher, storage) = active("v1").await;
        fetcher.respond_with(&format!("{}/route", SITE), FetchResponse::ok("route fresh"));
        fetcher.set_delay(Some(Duration::from_millis(200)));

        let response = tokio::time::timeout(
            Duration::from_millis(100),
            manager.handle_fetch(get("/route")),
        )
        .await
        .expect("cached response should not wait on the network")
        .unwrap();
        assert_eq!(response.body, b"route v1");

        // The refresh lands in the bucket once the slow network answers.
        let key = request_key(HttpMethod::Get, &get("/route").url);
        let mut refreshed = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let cached = storage.get(manager.bucket(), &key).await.unwrap().unwrap();
            if cached.body == b"route fresh" {
                refreshed = true;
                break;
            }
        }
        assert!(refreshed);
        assert_eq!(fetcher.requests_for(&format!("{}/route", SITE)), 1);
    }

    #[tokio::test]
    async fn burst_of_hits_refreshes_once() {
        let (manager, fetcher, storage) = active("v1").await;
        let url = format!("{}/route", SITE);
        fetcher.respond_with(&url, FetchResponse::ok("route fresh"));
        fetcher.set_delay(Some(Duration::from_millis(100)));

        for _ in 0..5 {
            let response = manager.handle_fetch(get("/route")).await.unwrap();
            assert_eq!(response.body, b"route v1");
        }

        let key = request_key(HttpMethod::Get, &get("/route").url);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let cached = storage.get(manager.bucket(), &key).await.unwrap().unwrap();
            if cached.body == b"route fresh" {
                break;
            }
        }
        assert_eq!(fetcher.requests_for(&url), 1);

        // The slot frees up once the refresh finishes.
        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.handle_fetch(get("/route")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(fetcher.requests_for(&url), 2);
    }

    #[tokio::test]
    async fn cache_first_miss_fetches_and_stores() {
        let (manager, fetcher, storage) = active("v1").await;
        fetcher.respond_with(&format!("{}/static/app.css", SITE), FetchResponse::ok("css"));

        let response = manager.handle_fetch(get("/static/app.css")).await.unwrap();

        assert_eq!(response.body, b"css");
        assert_eq!(storage.entry_count(manager.bucket()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn cache_first_offline_miss_serves_fallback_page() {
        let (manager, fetcher, _) = active("v1").await;
        fetcher.set_offline(true);

        let response = manager.handle_fetch(get("/customers/12")).await.unwrap();
        assert_eq!(response.body, b"home v1");
    }

    #[tokio::test]
    async fn network_first_prefers_live_response() {
        let (manager, fetcher, storage) = active("v1").await;
        fetcher.respond_with(
            &format!("{}/api/route/today", SITE),
            FetchResponse::ok(r#"{"stops":[]}"#),
        );

        let response = manager.handle_fetch(get("/api/route/today")).await.unwrap();

        assert_eq!(response.body, br#"{"stops":[]}"#);
        let key = request_key(HttpMethod::Get, &get("/api/route/today").url);
        assert!(storage.get(manager.bucket(), &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn network_first_returns_error_status_as_is() {
        let (manager, fetcher, storage) = active("v1").await;
        let url = format!("{}/api/route/today", SITE);
        fetcher.respond_with(&url, FetchResponse::ok("cached"));
        manager.handle_fetch(get("/api/route/today")).await.unwrap();

        fetcher.respond_with(&url, FetchResponse::new(503));
        let response = manager.handle_fetch(get("/api/route/today")).await.unwrap();

        assert_eq!(response.status, 503);
        let key = request_key(HttpMethod::Get, &get("/api/route/today").url);
        assert_eq!(
            storage.get(manager.bucket(), &key).await.unwrap().unwrap().body,
            b"cached"
        );
    }

    #[tokio::test]
    async fn network_first_falls_back_on_transport_failure() {
        let (manager, fetcher, _) = active("v1").await;
        let url = format!("{}/api/route/today", SITE);
        fetcher.respond_with(&url, FetchResponse::ok("yesterday"));
        manager.handle_fetch(get("/api/route/today")).await.unwrap();

        fetcher.set_offline(true);
        let response = manager.handle_fetch(get("/api/route/today")).await.unwrap();
        assert_eq!(response.body, b"yesterday");

        let err = manager.handle_fetch(get("/api/customers")).await.unwrap_err();
        assert!(matches!(err, WorkerError::Interception { .. }));
    }

    #[tokio::test]
    async fn json_accept_is_network_first() {
        let (manager, fetcher, _) = active("v1").await;
        fetcher.respond_with(&format!("{}/route", SITE), FetchResponse::ok("live json"));

        let response = manager
            .handle_fetch(get("/route").with_header("Accept", "application/json"))
            .await
            .unwrap();

        assert_eq!(response.body, b"live json");
    }

    #[tokio::test]
    async fn non_get_and_foreign_requests_pass_through() {
        let (manager, fetcher, storage) = active("v1").await;
        let post = FetchRequest::new(
            HttpMethod::Post,
            Url::parse(&format!("{}/payments/record", SITE)).unwrap(),
        );
        fetcher.respond_with(&format!("{}/payments/record", SITE), FetchResponse::ok("ok"));
        fetcher.respond_with("https://tracker.example.com/p", FetchResponse::ok("t"));

        manager.handle_fetch(post).await.unwrap();
        manager
            .handle_fetch(FetchRequest::get(
                Url::parse("https://tracker.example.com/p").unwrap(),
            ))
            .await
            .unwrap();

        assert_eq!(storage.entry_count(manager.bucket()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn cache_url_message_adds_entry() {
        let (manager, fetcher, storage) = active("v1").await;
        fetcher.respond_with(&format!("{}/balances", SITE), FetchResponse::ok("b"));

        manager
            .handle_message(WorkerMessage::CacheUrl {
                url: "/balances".into(),
            })
            .await
            .unwrap();

        assert_eq!(storage.entry_count(manager.bucket()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn background_sync_notifies_pages() {
        let (manager, _, _) = active("v1").await;
        let mut page = manager.subscribe_pages();

        assert_eq!(manager.on_background_sync("something-else"), 0);
        assert_eq!(manager.on_background_sync("sync-offline-actions"), 1);

        assert_eq!(
            page.recv().await.unwrap(),
            WorkerMessage::SyncRequested {
                tag: "sync-offline-actions".into()
            }
        );
    }

    #[tokio::test]
    async fn background_sync_without_pages_is_harmless() {
        let (manager, _, _) = active("v1").await;
        assert_eq!(manager.on_background_sync("sync-offline-actions"), 0);
    }
}

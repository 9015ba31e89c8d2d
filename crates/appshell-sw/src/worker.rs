//! The offline cache manager: install, activate, and fetch handlers.

use std::sync::Arc;

use futures::future;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, trace, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::clients::Clients;
use crate::config::WorkerConfig;
use crate::fetch::{Fetch, FetchRequest, FetchResponse};
use crate::{Result, WorkerError};

/// Worker lifecycle state.
///
/// The lifecycle is linear: install → activate → active. A failed install
/// leaves the worker redundant; the previous worker, if any, keeps serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Install in progress.
    #[default]
    Installing,
    /// Installed, immediate activation requested.
    Installed,
    /// Activation sweep in progress.
    Activating,
    /// Active and intercepting fetches.
    Activated,
    /// Install failed; this worker never activates.
    Redundant,
}

/// Events emitted for the embedder.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Lifecycle state changed.
    StateChange { state: WorkerState },
    /// Install succeeded; activate now rather than waiting for pages to close.
    ActivationRequested { version_tag: String },
    /// A stale cache store was deleted during activation.
    StoreEvicted { name: String },
    /// The opportunistic write-back of a network response landed in the store.
    CacheUpdated { url: String },
    /// A client came under this worker's control.
    ControllerChange { client_id: String },
}

/// Outcome of fetch handling.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted (non-GET); default handling applies, untouched.
    Passthrough,
    /// A response, from the cache store or the network.
    Served(FetchResponse),
    /// Neither cached nor reachable; surfaces as a standard failed load.
    Failed(crate::WorkerError),
}

impl FetchOutcome {
    /// Whether the request passed through uninterceptedly.
    pub fn is_passthrough(&self) -> bool {
        matches!(self, FetchOutcome::Passthrough)
    }

    /// The served response, if any.
    pub fn response(&self) -> Option<&FetchResponse> {
        match self {
            FetchOutcome::Served(response) => Some(response),
            _ => None,
        }
    }
}

/// The offline cache manager.
///
/// Owns the cache-store and network collaborators and implements the three
/// lifecycle operations. Handlers are independent async operations; awaiting
/// one is the "wait until finished" contract with the host.
pub struct OfflineCacheManager {
    config: WorkerConfig,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
    clients: Arc<RwLock<Clients>>,
    state: RwLock<WorkerState>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
}

impl OfflineCacheManager {
    /// Create a new manager. Validates the configuration up front.
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok((
            Self {
                config,
                store,
                fetcher,
                clients: Arc::new(RwLock::new(Clients::new())),
                state: RwLock::new(WorkerState::Installing),
                event_tx,
            },
            event_rx,
        ))
    }

    /// The configuration this worker runs with.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Name of the current cache store generation.
    pub fn store_name(&self) -> &str {
        &self.config.version_tag
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// The client registry, shared with the embedder.
    pub fn clients(&self) -> Arc<RwLock<Clients>> {
        Arc::clone(&self.clients)
    }

    /// Install: pre-cache the asset list into the current store.
    ///
    /// All-or-nothing: every asset is fetched first, and only a fully
    /// successful batch is committed. On any failure the worker becomes
    /// redundant and nothing is cached. On success, immediate activation is
    /// requested (skip-waiting semantics).
    pub async fn handle_install(&self) -> Result<usize> {
        self.set_state(WorkerState::Installing).await;
        info!(version_tag = %self.config.version_tag, "Installing");

        match self.precache().await {
            Ok(count) => {
                self.set_state(WorkerState::Installed).await;
                info!(precached = count, "Installation complete");
                self.emit(WorkerEvent::ActivationRequested {
                    version_tag: self.config.version_tag.clone(),
                });
                Ok(count)
            }
            Err(e) => {
                error!(error = %e, "Installation failed");
                self.set_state(WorkerState::Redundant).await;
                Err(WorkerError::Install(e.to_string()))
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let name = &self.config.version_tag;
        self.store.open(name).await?;

        let fetches = self.config.precache_urls.iter().map(|url| {
            let request = FetchRequest::get(url.clone());
            async move { self.fetcher.fetch(&request).await }
        });
        let responses = future::try_join_all(fetches).await?;

        let entries: Vec<CacheEntry> = self
            .config
            .precache_urls
            .iter()
            .zip(responses.iter())
            .map(|(url, response)| CacheEntry::from_response(url, response))
            .collect();
        let count = entries.len();

        self.store.put_all(name, entries).await?;
        Ok(count)
    }

    /// Activate: sweep stale cache stores, then claim all open clients.
    ///
    /// Deletions run concurrently and are jointly awaited; a single failure is
    /// logged and blocks neither the other deletions nor the activation.
    /// Returns the number of stores evicted. Fails only for a redundant
    /// worker, which never activates.
    pub async fn handle_activate(&self) -> Result<usize> {
        if self.state().await == WorkerState::Redundant {
            return Err(WorkerError::State(
                "redundant worker cannot activate".into(),
            ));
        }

        self.set_state(WorkerState::Activating).await;
        info!(version_tag = %self.config.version_tag, "Activating");

        let names = match self.store.keys().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to list cache stores");
                Vec::new()
            }
        };

        let sweeps = names
            .iter()
            .filter(|name| name.as_str() != self.config.version_tag)
            .map(|name| async move {
                match self.store.delete(name).await {
                    Ok(true) => {
                        info!(store = %name, "Evicted stale cache store");
                        self.emit(WorkerEvent::StoreEvicted { name: name.clone() });
                        true
                    }
                    Ok(false) => false,
                    Err(e) => {
                        warn!(store = %name, error = %e, "Failed to evict stale cache store");
                        false
                    }
                }
            });
        let evicted = future::join_all(sweeps)
            .await
            .into_iter()
            .filter(|deleted| *deleted)
            .count();

        let claimed = self.clients.write().await.claim();
        for client_id in claimed {
            self.emit(WorkerEvent::ControllerChange { client_id });
        }

        self.set_state(WorkerState::Activated).await;
        info!(evicted, "Activation complete");
        Ok(evicted)
    }

    /// Fetch: cache-first with network fallback, GET only.
    ///
    /// A hit is served without touching the network. A miss falls back to the
    /// network; the response is duplicated into the store as a best-effort
    /// write-back whose failure never reaches the caller.
    pub async fn handle_fetch(&self, request: FetchRequest) -> FetchOutcome {
        if !request.is_get() {
            trace!(url = %request.url, method = %request.method, "Passing through non-GET request");
            return FetchOutcome::Passthrough;
        }

        match self.store.get(&self.config.version_tag, &request.url).await {
            Ok(Some(entry)) => match FetchResponse::from_entry(&entry) {
                Ok(response) => {
                    debug!(url = %request.url, "Cache hit");
                    return FetchOutcome::Served(response);
                }
                // A corrupt entry degrades to a miss; the network copy
                // replaces it.
                Err(e) => {
                    warn!(url = %request.url, error = %e, "Discarding corrupt cache entry")
                }
            },
            Ok(None) => {}
            // A broken lookup degrades to a miss.
            Err(e) => warn!(url = %request.url, error = %e, "Cache lookup failed"),
        }

        debug!(url = %request.url, "Cache miss, fetching from network");
        match self.fetcher.fetch(&request).await {
            Ok(response) => {
                self.write_back(&request, &response);
                FetchOutcome::Served(response)
            }
            Err(e) => {
                error!(url = %request.url, error = %e, "Fetch failed");
                FetchOutcome::Failed(e)
            }
        }
    }

    /// Persist a network response into the current store. Detached and
    /// best-effort: the response path does not wait for it, and a failure is
    /// logged, never propagated. `CacheUpdated` signals when the copy landed.
    fn write_back(&self, request: &FetchRequest, response: &FetchResponse) {
        let entry = CacheEntry::from_response(&request.url, response);
        let store = Arc::clone(&self.store);
        let name = self.config.version_tag.clone();
        let url = request.url.clone();
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            match store.put(&name, entry).await {
                Ok(()) => {
                    let _ = event_tx.send(WorkerEvent::CacheUpdated { url });
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to cache network response");
                }
            }
        });
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
        self.emit(WorkerEvent::StateChange { state });
    }

    fn emit(&self, event: WorkerEvent) {
        let _ = self.event_tx.send(event);
    }
}

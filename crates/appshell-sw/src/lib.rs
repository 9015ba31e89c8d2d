//! # AppShell SW
//!
//! Offline app-shell cache worker: the caching policy of a service worker,
//! reframed as an embeddable component.
//!
//! ## Features
//!
//! - **Install**: pre-caches a fixed asset list into a versioned cache store
//! - **Activate**: evicts stale store generations, then claims open clients
//! - **Fetch**: cache-first with network fallback for GET requests,
//!   opportunistically writing network responses back into the store
//!
//! ## Architecture
//!
//! ```text
//! OfflineCacheManager
//!     ├── WorkerConfig { version_tag, precache_urls }
//!     ├── dyn CacheStore   (MemoryCacheStore, or a substitutable fake)
//!     ├── dyn Fetch        (HttpFetcher, or a substitutable fake)
//!     └── Clients          (controlled pages)
//!
//! CacheStore
//!     └── Cache (one per version tag)
//!             └── URL → CacheEntry
//! ```

use thiserror::Error;

pub mod cache;
pub mod clients;
pub mod config;
pub mod fetch;
pub mod worker;

pub use cache::{Cache, CacheEntry, CacheStore, MemoryCacheStore};
pub use clients::{Client, Clients};
pub use config::WorkerConfig;
pub use fetch::{Fetch, FetchRequest, FetchResponse, HttpFetcher, HttpFetcherConfig};
pub use worker::{FetchOutcome, OfflineCacheManager, WorkerEvent, WorkerState};

/// Errors that can occur in worker operations.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Install failed: {0}")]
    Install(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("State error: {0}")]
    State(String),
}

impl WorkerError {
    /// Get the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            WorkerError::Install(_) => "install",
            WorkerError::Network(_) => "network",
            WorkerError::Cache(_) => "cache",
            WorkerError::Config(_) => "config",
            WorkerError::InvalidUrl(_) => "invalid_url",
            WorkerError::State(_) => "state",
        }
    }
}

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

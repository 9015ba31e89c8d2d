//! Worker configuration.
//!
//! The version tag and the precache asset list are the whole configuration
//! surface: no CLI, no environment variables.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Result, WorkerError};

/// Configuration for the offline cache worker.
///
/// The version tag names the current cache store generation; bumping it
/// invalidates every prior store at the next activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Cache store generation, e.g. `"app-shell-v2"`.
    pub version_tag: String,

    /// Assets pre-cached at install time. Absolute URLs, or paths relative
    /// to the scope the embedder serves the shell from.
    pub precache_urls: Vec<String>,
}

impl WorkerConfig {
    /// Create a new configuration.
    pub fn new(
        version_tag: impl Into<String>,
        precache_urls: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            version_tag: version_tag.into(),
            precache_urls: precache_urls.into_iter().map(Into::into).collect(),
        }
    }

    /// Load a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| WorkerError::Config(e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// The version tag must be non-empty and every precache entry must be a
    /// parseable URL. Relative entries are accepted; the network collaborator
    /// is responsible for resolving them against its scope.
    pub fn validate(&self) -> Result<()> {
        if self.version_tag.trim().is_empty() {
            return Err(WorkerError::Config("version_tag must not be empty".into()));
        }

        for raw in &self.precache_urls {
            if raw.trim().is_empty() {
                return Err(WorkerError::InvalidUrl("empty precache entry".into()));
            }
            match Url::parse(raw) {
                Ok(_) => {}
                // Relative asset paths are resolved by the embedder.
                Err(url::ParseError::RelativeUrlWithoutBase) => {}
                Err(e) => {
                    return Err(WorkerError::InvalidUrl(format!("{raw}: {e}")));
                }
            }
        }

        Ok(())
    }
}

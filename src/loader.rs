use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::lanyard::{FetchError, StatusSource};
use crate::snapshot::StatusSnapshot;

/// How long a server-side snapshot is served before the next page request
/// triggers a refetch.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(10);

struct CachedSnapshot {
    fetched_at: Instant,
    snapshot: Arc<StatusSnapshot>,
}

/// Produces the snapshot a page is first rendered with.
pub struct InitialSnapshotLoader {
    source: Arc<dyn StatusSource>,
    id: String,
    window: Duration,
    cached: Mutex<Option<CachedSnapshot>>,
}

impl InitialSnapshotLoader {
    pub fn new(source: Arc<dyn StatusSource>, id: impl Into<String>) -> Self {
        Self::with_window(source, id, FRESHNESS_WINDOW)
    }

    pub fn with_window(source: Arc<dyn StatusSource>, id: impl Into<String>, window: Duration) -> Self {
        Self {
            source,
            id: id.into(),
            window,
            cached: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> Arc<dyn StatusSource> {
        self.source.clone()
    }

    /// Return the cached snapshot while it is fresh, otherwise fetch a new one.
    ///
    /// A failed fetch is returned as is. Callers that queued behind a refresh
    /// reuse its result instead of fetching again.
    pub async fn load(&self) -> Result<Arc<StatusSnapshot>, FetchError> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.window {
                return Ok(entry.snapshot.clone());
            }
        }

        match self.source.fetch(&self.id).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                info!(
                    "Loaded initial snapshot for {} ({:?})",
                    self.id, snapshot.presence
                );
                *cached = Some(CachedSnapshot {
                    fetched_at: Instant::now(),
                    snapshot: snapshot.clone(),
                });
                Ok(snapshot)
            }
            Err(err) => {
                warn!("Initial snapshot load for {} failed: {}", self.id, err);
                Err(err)
            }
        }
    }
}

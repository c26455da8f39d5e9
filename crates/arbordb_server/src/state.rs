//! Shared handler state.

use crate::error::{ServerError, ServerResult};
use arbordb_core::{CoreResult, DynamicDatabaseService, RequestProcessor, ServiceState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// State shared by all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Realm data service.
    pub service: Arc<DynamicDatabaseService>,
    /// Access keys and realm rules.
    pub state: Arc<ServiceState>,
    /// Authorizer over `state`.
    pub processor: RequestProcessor,
    state_path: Option<PathBuf>,
    persist_lock: Arc<Mutex<()>>,
}

impl AppState {
    /// Creates handler state. `state_path` is where mutations of `state`
    /// are saved; `None` keeps them in memory only.
    pub fn new(
        service: Arc<DynamicDatabaseService>,
        state: Arc<ServiceState>,
        state_path: Option<PathBuf>,
    ) -> Self {
        Self {
            service,
            processor: RequestProcessor::new(Arc::clone(&state)),
            state,
            state_path,
            persist_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Applies `mutate` to keys and rules and saves the result to the state
    /// file, if one is configured.
    ///
    /// Commits are serialized so the last mutation always wins on disk. If
    /// the save fails the mutation is rolled back, though requests running
    /// concurrently may have observed it.
    ///
    /// # Errors
    ///
    /// Fails if `mutate` fails or the state file cannot be written.
    pub async fn commit<T, F>(&self, mutate: F) -> ServerResult<T>
    where
        F: FnOnce(&ServiceState) -> CoreResult<T>,
    {
        let Some(path) = self.state_path.clone() else {
            return Ok(mutate(&self.state)?);
        };
        let _guard = self.persist_lock.lock().await;
        let before = self.state.snapshot();
        let out = mutate(&self.state)?;
        let state = Arc::clone(&self.state);
        if let Err(err) = run_blocking(move || state.save(&path)).await {
            warn!(%err, "state save failed, rolling back");
            self.state.restore(before);
            return Err(err);
        }
        debug!("persisted service state");
        Ok(out)
    }
}

/// Runs a blocking core operation off the async runtime.
pub(crate) async fn run_blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> arbordb_core::CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
        .map_err(ServerError::from)
}

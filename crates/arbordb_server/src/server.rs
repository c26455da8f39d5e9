//! Router construction and server lifecycle.

use crate::config::{ServerConfig, StorageConfig};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;
use crate::{io, management};
use arbordb_core::{AccessKey, CoreConfig, CoreError, DynamicDatabaseService, ServiceState};
use arbordb_storage::{FileStore, InMemoryStore, KeyValueStore};
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tower_http::cors::{self, AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Builds the router with CORS, tracing and timeout layers.
///
/// # Errors
///
/// Returns [`ServerError::Config`] if a configured CORS origin is not a valid
/// header value.
pub fn create_app(state: AppState, config: &ServerConfig) -> ServerResult<Router> {
    let origins = if config.cors_origins.is_empty() {
        AllowOrigin::from(cors::Any)
    } else {
        let origins = config
            .cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .map_err(|_| ServerError::Config(format!("invalid CORS origin {origin:?}")))
            })
            .collect::<ServerResult<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers(cors::Any)
        .allow_origin(origins);

    let router = Router::new()
        .route(
            "/io/{dbid}/{*path}",
            get(io::get)
                .put(io::put)
                .patch(io::patch)
                .post(io::post)
                .delete(io::delete),
        )
        .route(
            "/rsec/rules",
            post(management::create_rule)
                .get(management::list_rules)
                .delete(management::remove_rules),
        )
        .route(
            "/rsec/rules/{id}",
            get(management::get_rule).delete(management::remove_rule),
        )
        .route("/rsec/keys", post(management::create_key))
        .route(
            "/rsec/keys/{keyid}",
            get(management::get_key).delete(management::delete_key),
        )
        .route("/healthcheck", get(|| async { "OK" }))
        .with_state(state);

    Ok(router
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Opened backends and loaded state for a config.
struct Bootstrap {
    state: AppState,
    journal: Option<Arc<FileStore>>,
}

/// Opens the store, loads keys and rules, and ensures the configured admin
/// keys exist.
fn bootstrap(config: &ServerConfig) -> ServerResult<Bootstrap> {
    let (store, journal) = match &config.storage {
        StorageConfig::Memory => (
            Arc::new(InMemoryStore::new()) as Arc<dyn KeyValueStore>,
            None,
        ),
        StorageConfig::File { data_path } => {
            let journal = Arc::new(
                FileStore::open(data_path, config.sync_writes).map_err(CoreError::from)?,
            );
            info!(path = %data_path.display(), "opened journal");
            (Arc::clone(&journal) as Arc<dyn KeyValueStore>, Some(journal))
        }
    };

    let service_state = match &config.state_path {
        Some(path) => ServiceState::load(path)?,
        None => ServiceState::new(),
    };
    let mut created = false;
    for admin in &config.admin_keys {
        let key = AccessKey::new(admin.key.as_str(), admin.realms.iter().cloned()).with_admin(true);
        if service_state.ensure_key(key) {
            info!(key = %admin.key, "created configured admin key");
            created = true;
        }
    }
    if created {
        if let Some(path) = &config.state_path {
            service_state.save(path)?;
        }
    }

    let core_config = CoreConfig::new().domain_prefix(config.domain_prefix.as_str());
    let service = DynamicDatabaseService::new(store, core_config);
    Ok(Bootstrap {
        state: AppState::new(
            Arc::new(service),
            Arc::new(service_state),
            config.state_path.clone(),
        ),
        journal,
    })
}

/// Spawn the server and run until the `Ctrl-C` signal is received, then shutdown.
///
/// # Errors
///
/// Fails if the server cannot start or does not shut down cleanly.
pub async fn run_with_config_until_ctrl_c(config: ServerConfig) -> ServerResult<()> {
    let server = Server::spawn(config).await?;
    tokio::signal::ctrl_c().await?;
    info!("shutdown");
    server.shutdown().await
}

/// A running ArborDB HTTP server.
pub struct Server {
    tasks: JoinSet<std::io::Result<()>>,
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    state: AppState,
    journal: Option<Arc<FileStore>>,
}

impl Server {
    /// Opens the configured backends and starts serving.
    ///
    /// # Errors
    ///
    /// Fails if the store or state cannot be opened, or the address cannot be
    /// bound.
    pub async fn spawn(config: ServerConfig) -> ServerResult<Self> {
        let boot_config = config.clone();
        let Bootstrap { state, journal } = tokio::task::spawn_blocking(move || bootstrap(&boot_config))
            .await
            .map_err(|e| ServerError::Internal(format!("bootstrap task failed: {e}")))??;
        let app = create_app(state.clone(), &config)?;

        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();

        let mut tasks = JoinSet::new();
        tasks.spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    rx.await.ok();
                })
                .await
        });
        info!("HTTP server listening on {local_addr}");

        Ok(Self {
            tasks,
            local_addr,
            shutdown: Some(tx),
            state,
            journal,
        })
    }

    /// Get the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handler state of the running server.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Stop accepting connections, wait for in-flight requests and sync the
    /// journal.
    ///
    /// # Errors
    ///
    /// Fails if the serve task failed or the journal cannot be synced.
    pub async fn shutdown(mut self) -> ServerResult<()> {
        if let Some(tx) = self.shutdown.take() {
            tx.send(()).ok();
        }
        let journal = self.journal.take();
        self.run_until_done().await?;
        if let Some(journal) = journal {
            tokio::task::spawn_blocking(move || journal.sync())
                .await
                .map_err(|e| ServerError::Internal(format!("sync task failed: {e}")))?
                .map_err(CoreError::from)?;
        }
        Ok(())
    }

    /// Wait for the serve task to complete.
    ///
    /// Runs forever unless the task fails or [`Self::shutdown`] is called.
    ///
    /// # Errors
    ///
    /// Fails if the serve task failed or panicked.
    pub async fn run_until_done(mut self) -> ServerResult<()> {
        let mut final_res: ServerResult<()> = Ok(());
        while let Some(res) = self.tasks.join_next().await {
            match res {
                Ok(Ok(())) => {}
                Err(err) if err.is_cancelled() => {}
                Ok(Err(err)) => {
                    warn!(?err, "task failed");
                    final_res = Err(err.into());
                }
                Err(err) => {
                    warn!(?err, "task panicked");
                    final_res = Err(ServerError::Internal(err.to_string()));
                }
            }
        }
        final_res
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

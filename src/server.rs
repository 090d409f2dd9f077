//! HTTP server lifecycle: open the store, serve, shut down cleanly.

use crate::api::{self, AppState};
use crate::config::ServerConfig;
use crate::store::TaskStore;
use axum::Router;
use eyre::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// The taskboard server.
pub struct Server {
    config: ServerConfig,
    store: TaskStore,
    shutdown: Arc<Notify>,
}

impl Server {
    /// Create a server, opening (and if needed initializing) its database.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let store = TaskStore::open(&config.database).context("Failed to open store")?;

        Ok(Self {
            config,
            store,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle that stops the server when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Router wired to this server's store.
    pub fn router(&self) -> Router {
        let state = AppState::new(self.store.clone(), self.config.port);
        api::router(state, &self.config.allowed_origins)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C, SIGTERM or the
    /// shutdown handle fires, then release the store.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr().context("Failed to read listener address")?;
        log::info!("Taskboard listening on http://{} (database: {})", local_addr, self.store.location());

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(Arc::clone(&self.shutdown)))
            .await
            .context("Server error")?;

        log::info!("Server shutting down");
        self.store.close()
    }
}

async fn shutdown_signal(handle: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl-C"),
        _ = terminate => log::info!("Received SIGTERM"),
        _ = handle.notified() => log::debug!("Shutdown requested"),
    }
}

//! Process lifecycle: bind, serve, and bounded graceful shutdown
//!
//! `start` and `stop` are meant to run as independent tasks. `stop` waits for
//! an interrupt and then flips the shutdown channel; `start` serves until that
//! happens, gives in-flight requests [`SHUTDOWN_GRACE`] to finish, and returns.

use crate::builder::{AccessTokenBuilder, TokenBuilder};
use crate::config::ServiceConfig;
use crate::dispatch::Dispatcher;
use crate::server::routes::build_router;
use axum::Router;
use std::future::IntoFuture;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// How long in-flight requests may run after shutdown begins
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Listening,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] io::Error),
}

/// Triggers shutdown of a running [`TokenService`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// The HTTP service and its lifecycle state
pub struct TokenService {
    config: Arc<ServiceConfig>,
    router: Router,
    state: watch::Sender<LifecycleState>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl TokenService {
    /// Service issuing real access tokens for the configured app
    pub fn new(config: ServiceConfig) -> Self {
        let builder = Arc::new(AccessTokenBuilder::from_config(&config));
        Self::with_builder(config, builder)
    }

    pub fn with_builder(config: ServiceConfig, builder: Arc<dyn TokenBuilder>) -> Self {
        let router = build_router(Dispatcher::new(builder), config.allowed_origins().clone());
        let (state, _) = watch::channel(LifecycleState::Created);
        let (shutdown, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            router,
            state,
            shutdown: Arc::new(shutdown),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    /// Bind `0.0.0.0` on the configured port and serve until shutdown
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let port = self.config.listen_port();
        let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))
            .await
            .map_err(|source| LifecycleError::Bind { port, source })?;

        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown completes.
    ///
    /// Errors before shutdown begins are returned; errors while draining are
    /// logged and the service still ends up [`LifecycleState::Stopped`].
    pub async fn serve(&self, listener: TcpListener) -> Result<(), LifecycleError> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Token service listening");
        self.state.send_replace(LifecycleState::Listening);

        let server = axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(triggered(self.shutdown.subscribe()))
            .into_future();
        tokio::pin!(server);

        let result = tokio::select! {
            result = &mut server => result.map_err(LifecycleError::Serve),
            _ = triggered(self.shutdown.subscribe()) => {
                info!(grace_secs = SHUTDOWN_GRACE.as_secs(), "Shutting down");
                self.state.send_replace(LifecycleState::ShuttingDown);

                match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "Error during shutdown"),
                    Err(_) => warn!("Graceful shutdown timed out, dropping remaining connections"),
                }
                Ok(())
            }
        };

        self.state.send_replace(LifecycleState::Stopped);
        info!("Token service stopped");
        result
    }

    /// Wait for an interrupt or termination signal, then begin shutdown
    pub async fn stop(&self) {
        shutdown_signal().await;
        info!("Shutdown signal received");
        self.shutdown.send_replace(true);
    }
}

/// Resolves once shutdown has been requested
async fn triggered(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

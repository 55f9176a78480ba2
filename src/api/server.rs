//! API server strategies.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::api::{router, ApiState};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API server already started")]
    AlreadyStarted,

    #[error("API server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API server task failed: {0}")]
    Task(String),
}

#[async_trait]
pub trait ApiServer: Send + Sync {
    fn start(&self) -> Result<(), ApiError>;

    /// Stop serving and wait for in-flight requests to finish.
    async fn stop(&self) -> Result<(), ApiError>;

    fn local_addr(&self) -> Option<SocketAddr>;
}

/// Serve the API on `listener`, or nothing when the API is disabled.
pub fn api_server_for(
    listener: Option<TcpListener>,
    state: ApiState,
) -> Result<Arc<dyn ApiServer>, ApiError> {
    match listener {
        Some(listener) => Ok(Arc::new(HttpApiServer::new(listener, router(state))?)),
        None => Ok(Arc::new(NoopApiServer)),
    }
}

/// Axum server on a listener bound earlier in bootstrap.
pub struct HttpApiServer {
    addr: SocketAddr,
    pending: Mutex<Option<(TcpListener, Router)>>,
    stop_tx: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
}

impl HttpApiServer {
    pub fn new(listener: TcpListener, router: Router) -> Result<Self, ApiError> {
        let (stop_tx, _) = broadcast::channel(1);
        Ok(Self {
            addr: listener.local_addr()?,
            pending: Mutex::new(Some((listener, router))),
            stop_tx,
            task: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ApiServer for HttpApiServer {
    fn start(&self) -> Result<(), ApiError> {
        let (listener, router) = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ApiError::AlreadyStarted)?;

        let mut stop_rx = self.stop_tx.subscribe();
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = stop_rx.recv().await;
        });

        tracing::info!(address = %self.addr, "API server starting");
        let handle = tokio::spawn(async move { serve.await });
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    async fn stop(&self) -> Result<(), ApiError> {
        // Never started: dropping the listener releases the port.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();

        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = handle else {
            return Ok(());
        };

        let _ = self.stop_tx.send(());
        match handle.await {
            Ok(result) => {
                tracing::info!(address = %self.addr, "API server stopped");
                Ok(result?)
            }
            Err(e) => Err(ApiError::Task(e.to_string())),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.addr)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopApiServer;

#[async_trait]
impl ApiServer for NoopApiServer {
    fn start(&self) -> Result<(), ApiError> {
        tracing::info!("API disabled, not serving");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ApiError> {
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

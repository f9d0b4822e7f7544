// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server runtime
//!
//! `Unstarted -> Serving` once the listener is bound and accepting,
//! `Serving -> Stopped` when the shutdown future resolves or serving fails.
//! In-flight requests finish before `serve` returns.

use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use super::http_server::{create_router, AppState};
use super::pool::WorkerPool;
use crate::embeddings::EmbeddingService;
use crate::monitoring::InferenceMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Serving,
    Stopped,
}

pub struct InferenceServer {
    listener: tokio::net::TcpListener,
    addr: SocketAddr,
    state: AppState,
    state_tx: watch::Sender<ServerState>,
}

impl InferenceServer {
    /// Bind the listener; the server stays `Unstarted` until `serve`
    pub async fn bind(addr: SocketAddr, service: EmbeddingService, pool: WorkerPool) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let actual_addr = listener.local_addr()?;

        let metrics = Arc::new(InferenceMetrics::new()?);
        let (state_tx, _) = watch::channel(ServerState::Unstarted);

        Ok(Self {
            listener,
            addr: actual_addr,
            state: AppState::new(service, pool, metrics),
            state_tx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Subscribe to lifecycle transitions
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state_tx.subscribe()
    }

    pub fn metrics(&self) -> Arc<InferenceMetrics> {
        self.state.metrics.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn serve<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            addr,
            state,
            state_tx,
        } = self;

        let pool = state.pool.clone();
        let app = create_router(state);

        state_tx.send_replace(ServerState::Serving);
        info!("Inference server listening on {}", addr);

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        pool.close();
        state_tx.send_replace(ServerState::Stopped);

        match result {
            Ok(()) => {
                info!("Inference server stopped");
                Ok(())
            }
            Err(e) => {
                error!("Inference server failed: {}", e);
                Err(e).context("Server error")
            }
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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

    info!("Shutdown signal received");
}

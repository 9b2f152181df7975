//! WebSocket front end
//!
//! Each connection reads one request at a time and answers it before reading
//! the next, so responses on a connection follow request order.

mod connection;

pub use connection::{handle_connection, CLOSE_ACK};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use crate::core::{RequestCoordinator, SimulationBackend};
use crate::utils::Result;

pub struct FeeServer {
    listener: TcpListener,
}

impl FeeServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires, then wait for open
    /// connections to close.
    pub async fn serve<B>(
        self,
        coordinator: Arc<RequestCoordinator<B>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()>
    where
        B: SimulationBackend + 'static,
    {
        tracing::info!("🌐 Listening on ws://{}", self.local_addr()?);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!("accept failed: {}", e);
                            continue;
                        }
                    };

                    let coordinator = coordinator.clone();
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        let ws = match tokio_tungstenite::accept_async(stream).await {
                            Ok(ws) => ws,
                            Err(e) => {
                                tracing::warn!(%peer, "WebSocket handshake failed: {}", e);
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(ws, peer, coordinator, shutdown).await {
                            tracing::warn!(%peer, "connection ended with error: {}", e);
                        }
                    });
                }
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = finished {
                        tracing::error!("connection task panicked: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("shutting down, {} connection(s) open", connections.len());
        while connections.join_next().await.is_some() {}
        Ok(())
    }
}

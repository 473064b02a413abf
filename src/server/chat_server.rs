//! TCP chat server
//!
//! This module provides the listener that accepts connections and wires the
//! shared registry, router and store into one handler task per client.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ServerConfig;
use crate::error::Result;
use crate::protocol::replies;
use crate::server::connection_handler::ConnectionHandler;
use crate::server::registry::ClientRegistry;
use crate::server::router::MessageRouter;
use crate::store::MessageStore;

/// Line-oriented chat server
pub struct ChatServer {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Bound listener
    listener: TcpListener,
    /// Shared services handed to every connection
    router: MessageRouter,
    /// Cancelled to stop accepting and disconnect everyone
    shutdown: CancellationToken,
}

impl ChatServer {
    /// Bind the listening socket. The store is opened by the caller so a
    /// bad database path fails before the port is taken.
    pub async fn bind(config: ServerConfig, store: MessageStore) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        let registry = Arc::new(ClientRegistry::new(config.max_clients));
        info!(
            "Server listening on {} ({} client slots)",
            listener.local_addr()?,
            registry.capacity()
        );

        let router = MessageRouter::new(registry, Arc::new(store));

        Ok(Self {
            config: Arc::new(config),
            listener,
            router,
            shutdown: CancellationToken::new(),
        })
    }

    /// Address actually bound; differs from the configured one for port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the server when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        self.router.registry()
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        self.router.store()
    }

    /// Accept connections until the shutdown token fires, then notify and
    /// disconnect every client, wait for their tasks and close the store.
    pub async fn run(self) -> Result<()> {
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!("set_nodelay failed for {}: {}", peer, e);
                        }
                        let handler = ConnectionHandler::new(
                            peer,
                            self.router.clone(),
                            Arc::clone(&self.config),
                            self.shutdown.clone(),
                        );
                        sessions.spawn(async move {
                            if let Err(e) = handler.run(stream).await {
                                warn!("Connection {} ended: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                Some(finished) = sessions.join_next() => {
                    if let Err(e) = finished {
                        error!("Connection task failed: {}", e);
                    }
                }
            }
        }

        info!("Shutting down");
        let notified = self
            .router
            .registry()
            .broadcast_and_clear(replies::SHUTDOWN_NOTICE)
            .await;
        drop(self.listener);

        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("Connection task failed: {}", e);
            }
        }

        self.router.store().close().await;
        info!("Server stopped ({} clients notified)", notified);
        Ok(())
    }
}

//! Message routing
//!
//! Private and group messages are persisted first and delivered live second;
//! broadcasts are live only.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::server::registry::ClientRegistry;
use crate::store::MessageStore;

/// What happened to a private message after it was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Written to the recipient's connection
    Delivered,
    /// Recipient offline or unreachable; the stored copy is all there is
    Stored,
}

/// Routes messages between users via the registry and the store
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<ClientRegistry>,
    store: Arc<MessageStore>,
}

/// Strip trailing CR/LF so stored and re-delivered text never double up
/// newlines
pub fn clean_text(text: &str) -> &str {
    text.trim_end_matches(['\r', '\n'])
}

/// Wire format of a live private message
pub fn format_private(from: &str, to: &str, text: &str) -> String {
    format!("{} -> {}: {}", from, to, text)
}

/// Wire format of a broadcast line
pub fn format_broadcast(from: &str, text: &str) -> String {
    format!("[Broadcast] {}: {}", from, text)
}

impl MessageRouter {
    pub fn new(registry: Arc<ClientRegistry>, store: Arc<MessageStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<MessageStore> {
        &self.store
    }

    /// Persist `text` from `from` to `to`, then deliver it if `to` is online.
    ///
    /// Only a storage failure is an error. A failed live write leaves the
    /// stored row in place and reports [`Delivery::Stored`].
    pub async fn send_private(&self, from: &str, to: &str, text: &str) -> Result<Delivery> {
        let text = clean_text(text);
        self.store.insert(from, to, text).await?;

        let Some(handle) = self.registry.lookup(to).await else {
            info!("{} sent message to {} (stored - offline)", from, to);
            return Ok(Delivery::Stored);
        };

        match handle.send_line(format_private(from, to, text)) {
            Ok(()) => {
                info!("{} sent message to {} (delivered)", from, to);
                Ok(Delivery::Delivered)
            }
            Err(e) => {
                warn!("Live delivery {} -> {} failed: {}", from, to, e);
                Ok(Delivery::Stored)
            }
        }
    }

    /// Write `text` to every active client, sender included. Nothing is
    /// persisted. Returns how many clients accepted the line.
    pub async fn broadcast(&self, from: &str, text: &str) -> usize {
        let line = format_broadcast(from, clean_text(text));
        let mut delivered = 0;

        for client in self.registry.clients().await {
            match client.handle.send_line(line.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Broadcast to {} failed: {}", client.username, e),
            }
        }

        delivered
    }

    /// `send_private` to each member independently
    pub async fn send_group(
        &self,
        from: &str,
        members: &[String],
        text: &str,
    ) -> Vec<(String, Result<Delivery>)> {
        let mut outcomes = Vec::with_capacity(members.len());
        for member in members {
            let outcome = self.send_private(from, member, text).await;
            if let Err(e) = &outcome {
                warn!("Group message {} -> {} failed: {}", from, member, e);
            }
            outcomes.push((member.clone(), outcome));
        }
        outcomes
    }
}

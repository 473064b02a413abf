//! Registry of logged-in clients
//!
//! Tracks which usernames are online and how to reach them. Capacity is fixed
//! at construction; a full registry rejects logins instead of queueing them.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::current_timestamp;
use crate::error::{ChatError, Result};
use crate::transport::{ClientHandle, ConnectionId};

/// An occupied registry slot
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// Display name, unique among active clients
    pub username: String,
    /// Outbound queue of the client's connection
    pub handle: ClientHandle,
    /// When the client logged in
    pub connected_at: u64,
}

#[derive(Debug)]
struct RegistryInner {
    /// Fixed-size slot table; `None` is a free slot
    slots: Vec<Option<RegisteredClient>>,
    /// Username to slot index
    by_name: HashMap<String, usize>,
    /// Set once the registry has been drained for shutdown
    closed: bool,
}

/// Shared table of active sessions.
///
/// Every operation takes the one lock for the duration of a table lookup or
/// mutation. Writes to clients only enqueue onto their connection, so the
/// lock never spans socket I/O.
#[derive(Debug)]
pub struct ClientRegistry {
    inner: Mutex<RegistryInner>,
    capacity: usize,
}

impl ClientRegistry {
    /// Create a registry with `capacity` slots
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                slots: vec![None; capacity],
                by_name: HashMap::with_capacity(capacity),
                closed: false,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Claim a slot for `username`.
    ///
    /// The uniqueness check and the insert happen under a single lock
    /// acquisition, so two logins racing for one name cannot both win.
    pub async fn register(&self, username: &str, handle: ClientHandle) -> Result<()> {
        let mut inner = self.inner.lock().await;

        if inner.closed {
            return Err(ChatError::RegistryClosed);
        }
        if inner.by_name.contains_key(username) {
            return Err(ChatError::UsernameTaken(username.to_string()));
        }
        let Some(slot) = inner.slots.iter().position(Option::is_none) else {
            return Err(ChatError::CapacityExceeded {
                capacity: self.capacity,
            });
        };

        inner.slots[slot] = Some(RegisteredClient {
            username: username.to_string(),
            handle,
            connected_at: current_timestamp(),
        });
        inner.by_name.insert(username.to_string(), slot);

        info!("Client registered: {} (slot {})", username, slot);
        Ok(())
    }

    /// Drop the entry owned by connection `id`; no-op if there is none
    pub async fn unregister(&self, id: ConnectionId) -> Option<String> {
        let mut inner = self.inner.lock().await;

        let slot = inner
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|c| c.handle.id() == id))?;
        let client = inner.slots[slot].take()?;
        inner.by_name.remove(&client.username);

        debug!(
            "Client unregistered: {} (slot {}, online {} ms)",
            client.username,
            slot,
            current_timestamp().saturating_sub(client.connected_at)
        );
        Some(client.username)
    }

    /// Handle for the active client named `username`
    pub async fn lookup(&self, username: &str) -> Option<ClientHandle> {
        let inner = self.inner.lock().await;
        inner
            .by_name
            .get(username)
            .and_then(|&slot| inner.slots[slot].as_ref())
            .map(|c| c.handle.clone())
    }

    /// Whether `username` is currently logged in
    pub async fn exists(&self, username: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.by_name.contains_key(username)
    }

    /// Usernames of all active clients, in slot order
    pub async fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner
            .slots
            .iter()
            .flatten()
            .map(|c| c.username.clone())
            .collect()
    }

    /// Active clients, in slot order
    pub async fn clients(&self) -> Vec<RegisteredClient> {
        let inner = self.inner.lock().await;
        inner.slots.iter().flatten().cloned().collect()
    }

    /// Number of active clients
    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.by_name.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Send `notice` to every client, close their connections and empty the
    /// table. Later registrations fail with [`ChatError::RegistryClosed`].
    pub async fn broadcast_and_clear(&self, notice: &str) -> usize {
        let mut inner = self.inner.lock().await;
        inner.closed = true;

        let mut closed = 0;
        for client in inner.slots.iter_mut().filter_map(Option::take) {
            let _ = client.handle.send_line(notice);
            client.handle.close("server shutdown");
            closed += 1;
        }
        inner.by_name.clear();

        info!("Disconnected {} clients for shutdown", closed);
        closed
    }
}

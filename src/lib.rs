//! Line-oriented multi-user chat server
//!
//! Clients connect over TCP, log in with a display name and exchange text
//! messages: privately with one user, fanned out to a small group, or
//! broadcast to everyone online. Private and group messages are persisted in
//! SQLite so offline users can read them later.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;
pub mod transport;

pub use client::ChatClient;
pub use error::{ChatError, Result};
pub use server::ChatServer;
pub use store::{MessageStore, StoredMessage};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Chat server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server listen address
    pub bind_addr: SocketAddr,
    /// SQLite database file holding the message log
    pub database: PathBuf,
    /// Maximum number of simultaneously logged-in clients
    pub max_clients: usize,
    /// Maximum number of partners in a semi-closed group
    pub max_group_size: usize,
    /// Longest accepted input line in bytes
    pub max_line_length: usize,
    /// Usernames are truncated to this many characters
    pub max_username_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5555)),
            database: PathBuf::from("chat.db"),
            max_clients: 10,
            max_group_size: 5,
            max_line_length: 1024,
            max_username_len: 31,
        }
    }
}

impl ServerConfig {
    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_clients == 0 {
            return Err(ChatError::config("max_clients must be at least 1"));
        }
        if self.max_group_size == 0 {
            return Err(ChatError::config("max_group_size must be at least 1"));
        }
        if self.max_line_length == 0 || self.max_username_len == 0 {
            return Err(ChatError::config("line and username limits must be non-zero"));
        }
        Ok(())
    }
}

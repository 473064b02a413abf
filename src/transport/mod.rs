//! Transport layer for client connections
//!
//! This module provides the outbound queue and writer task that sit between
//! chat logic and a TCP socket.

pub mod connection;

// Re-export commonly used types
pub use connection::{ClientHandle, ConnectionCommand, ConnectionId, ConnectionWriter};

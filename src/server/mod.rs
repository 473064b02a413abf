//! Chat server
//!
//! ## Layout
//!
//! - **Registry**: who is online, one slot per logged-in client
//! - **Router**: live delivery vs. store-only, broadcast and group fan-out
//! - **Session**: per-connection mode state machine (OPEN, CLOSED, SEMI_CLOSED)
//! - **Browser**: chatroom menu and broadcast room, screens of a session
//! - **Connection handler**: login exchange and read loop for one socket
//! - **Chat server**: listener, accept loop and shutdown

mod browser;
pub mod chat_server;
pub mod connection_handler;
pub mod registry;
pub mod router;
pub mod session;

pub use chat_server::ChatServer;
pub use connection_handler::ConnectionHandler;
pub use registry::{ClientRegistry, RegisteredClient};
pub use router::{Delivery, MessageRouter};
pub use session::{ChatMode, Flow, Session};

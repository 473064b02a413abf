//! Outbound side of a client connection
//!
//! Anything that wants to write to a client (its own session, another
//! session's router call, the shutdown path) goes through a [`ClientHandle`].
//! The handle only enqueues; a dedicated writer task owns the socket's write
//! half, so no lock is ever held across socket I/O.

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// Identifies one accepted connection for its whole lifetime
pub type ConnectionId = Uuid;

/// Commands that can be sent to a connection's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionCommand {
    /// Write one line; the codec appends the newline
    SendLine(String),
    /// Flush everything queued so far, then close the socket
    Close(String),
}

/// Cheap, cloneable handle for writing to a connection
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    closed: CancellationToken,
}

impl ClientHandle {
    /// Create a handle plus the writer that drains it
    pub fn new() -> (Self, ConnectionWriter) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        let handle = Self {
            id: Uuid::new_v4(),
            command_tx,
            closed: closed.clone(),
        };
        let writer = ConnectionWriter {
            id: handle.id,
            command_rx,
            closed,
        };
        (handle, writer)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue one line for the client
    pub fn send_line(&self, line: impl Into<String>) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(ChatError::network("connection closed"));
        }
        self.command_tx
            .send(ConnectionCommand::SendLine(line.into()))
            .map_err(|_| ChatError::network("connection writer gone"))
    }

    /// Queue several lines, stopping at the first failure
    pub fn send_lines<I, S>(&self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.send_line(line)?;
        }
        Ok(())
    }

    /// Ask the writer to flush and close, and wake the reader.
    ///
    /// Lines queued before this call are still delivered.
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.command_tx.send(ConnectionCommand::Close(reason.into()));
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection has been closed from either side
    pub async fn closed(&self) {
        self.closed.cancelled().await
    }
}

/// Owns the receiving end of a [`ClientHandle`] queue
pub struct ConnectionWriter {
    id: ConnectionId,
    command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    closed: CancellationToken,
}

impl ConnectionWriter {
    /// Drain queued commands into `writer` until closed.
    ///
    /// Runs until a `Close` command, a write error, or every handle is
    /// dropped. The connection is marked closed on the way out so a reader
    /// blocked on the same socket gives up too.
    pub async fn run<W>(mut self, writer: W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut sink = FramedWrite::new(writer, LinesCodec::new());

        let result = loop {
            match self.command_rx.recv().await {
                Some(ConnectionCommand::SendLine(line)) => {
                    if let Err(e) = sink.send(line).await {
                        break Err(ChatError::from(e));
                    }
                }
                Some(ConnectionCommand::Close(reason)) => {
                    debug!("Closing connection {}: {}", self.id, reason);
                    break SinkExt::<String>::close(&mut sink).await.map_err(ChatError::from);
                }
                None => break SinkExt::<String>::close(&mut sink).await.map_err(ChatError::from),
            }
        };

        self.closed.cancel();
        self.command_rx.close();
        result
    }

    /// Pull the next queued command without a socket; used by tests that
    /// inspect what a session wrote
    pub async fn next_command(&mut self) -> Option<ConnectionCommand> {
        self.command_rx.recv().await
    }

    /// Drain every line queued so far without waiting
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(cmd) = self.command_rx.try_recv() {
            if let ConnectionCommand::SendLine(line) = cmd {
                lines.extend(line.split('\n').map(str::to_string));
            }
        }
        lines
    }
}

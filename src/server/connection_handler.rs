//! Connection handler for one client socket
//!
//! This module drives a single connection from greeting to teardown: it
//! splits the socket, runs the login exchange, then feeds each input line to
//! the client's [`Session`] until the client leaves, the socket fails or the
//! server shuts down.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf};
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ServerConfig;
use crate::error::{ChatError, Result};
use crate::protocol::command::parse_login;
use crate::protocol::replies;
use crate::server::router::MessageRouter;
use crate::server::session::{Flow, Session};
use crate::transport::ClientHandle;

type LineReader<S> = FramedRead<ReadHalf<S>, LinesCodec>;

/// State of the login exchange
#[derive(Debug, Clone, PartialEq, Eq)]
enum LoginOutcome {
    /// Registered under this name
    Accepted(String),
    /// Refused with an error line, or the peer left first
    Rejected,
}

/// Per-connection handler
pub struct ConnectionHandler {
    /// Remote address, for logging only
    peer: SocketAddr,
    /// Shared routing services
    router: MessageRouter,
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Process-wide shutdown signal
    shutdown: CancellationToken,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(
        peer: SocketAddr,
        router: MessageRouter,
        config: Arc<ServerConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            peer,
            router,
            config,
            shutdown,
        }
    }

    /// Run the connection to completion.
    ///
    /// Whatever ends the session, the registry entry is removed and queued
    /// output is flushed before the socket closes.
    pub async fn run<S>(self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut lines = FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(self.config.max_line_length),
        );

        let (handle, writer) = ClientHandle::new();
        let writer_task = tokio::spawn(writer.run(write_half));

        let result = self.serve(&handle, &mut lines).await;

        if let Some(username) = self.router.registry().unregister(handle.id()).await {
            // Still registered means the shutdown broadcast has not reached us.
            if self.shutdown.is_cancelled() {
                let _ = handle.send_line(replies::SHUTDOWN_NOTICE);
            }
            info!("Client disconnected: {} ({})", username, self.peer);
        }
        handle.close("session ended");

        match writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Writer for {} ended with error: {}", self.peer, e),
            Err(e) => error!("Writer task for {} failed: {}", self.peer, e),
        }

        result
    }

    async fn serve<S>(&self, handle: &ClientHandle, lines: &mut LineReader<S>) -> Result<()>
    where
        S: AsyncRead,
    {
        let username = match self.login(handle, lines).await? {
            LoginOutcome::Accepted(username) => username,
            LoginOutcome::Rejected => return Ok(()),
        };
        info!("Client connected: {} ({})", username, self.peer);

        let mut session = Session::new(
            username,
            handle.clone(),
            self.router.clone(),
            self.config.max_group_size,
        );
        session.greet()?;

        while !self.shutdown.is_cancelled() {
            let Some(line) = self.next_line(handle, lines).await? else {
                break;
            };
            if session.handle_line(&line).await? == Flow::Exit {
                break;
            }
        }

        Ok(())
    }

    async fn login<S>(&self, handle: &ClientHandle, lines: &mut LineReader<S>) -> Result<LoginOutcome>
    where
        S: AsyncRead,
    {
        handle.send_lines(replies::GREETING)?;

        let Some(line) = self.next_line(handle, lines).await? else {
            return Ok(LoginOutcome::Rejected);
        };
        let username = parse_login(&line, self.config.max_username_len);
        if username.is_empty() {
            handle.send_line(replies::ERR_EMPTY_USERNAME)?;
            return Ok(LoginOutcome::Rejected);
        }

        let refusal = match self.router.registry().register(&username, handle.clone()).await {
            Ok(()) => return Ok(LoginOutcome::Accepted(username)),
            Err(ChatError::UsernameTaken(_)) => replies::ERR_USERNAME_TAKEN,
            Err(ChatError::CapacityExceeded { capacity }) => {
                warn!("Rejecting {} from {}: {} clients online", username, self.peer, capacity);
                replies::ERR_SERVER_FULL
            }
            Err(ChatError::RegistryClosed) => replies::ERR_SHUTTING_DOWN,
            Err(e) => return Err(e),
        };
        debug!("Login refused for {:?} from {}: {}", username, self.peer, refusal);
        handle.send_line(refusal)?;
        Ok(LoginOutcome::Rejected)
    }

    /// Next input line, or `None` once the peer, the shutdown path or a
    /// forced close ends the connection
    async fn next_line<S>(
        &self,
        handle: &ClientHandle,
        lines: &mut LineReader<S>,
    ) -> Result<Option<String>>
    where
        S: AsyncRead,
    {
        tokio::select! {
            _ = self.shutdown.cancelled() => Ok(None),
            _ = handle.closed() => Ok(None),
            line = lines.next() => line.transpose().map_err(ChatError::from),
        }
    }
}

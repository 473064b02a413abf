//! Line-oriented chat client
//!
//! A thin TCP client that speaks the server's text protocol one line at a
//! time. The integration tests drive the server through it.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};
use tracing::{debug, info};

use crate::error::{ChatError, Result};

/// Chat client configuration
#[derive(Clone, Debug)]
pub struct ChatClientConfig {
    /// Server address to connect to
    pub server_addr: SocketAddr,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// How long `read_line` waits for the server
    pub read_timeout: Duration,
    /// Longest line accepted from the server
    pub max_line_length: usize,
}

impl ChatClientConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            connect_timeout_secs: 10,
            read_timeout: Duration::from_secs(5),
            max_line_length: 64 * 1024,
        }
    }
}

/// Connected line client
pub struct ChatClient {
    config: ChatClientConfig,
    reader: FramedRead<OwnedReadHalf, LinesCodec>,
    writer: FramedWrite<OwnedWriteHalf, LinesCodec>,
}

impl ChatClient {
    /// Connect with default settings
    pub async fn connect(server_addr: SocketAddr) -> Result<Self> {
        Self::connect_with(ChatClientConfig::new(server_addr)).await
    }

    /// Connect to the chat server using `config`
    pub async fn connect_with(config: ChatClientConfig) -> Result<Self> {
        info!("Connecting to chat server at {}", config.server_addr);

        let stream = tokio::time::timeout(
            Duration::from_secs(config.connect_timeout_secs),
            TcpStream::connect(config.server_addr),
        )
        .await
        .map_err(|_| ChatError::network("connection timeout"))??;

        let (read_half, write_half) = stream.into_split();
        let reader = FramedRead::new(
            read_half,
            LinesCodec::new_with_max_length(config.max_line_length),
        );
        let writer = FramedWrite::new(write_half, LinesCodec::new());

        Ok(Self {
            config,
            reader,
            writer,
        })
    }

    /// Send one line; the newline is added here
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        debug!("-> {}", line);
        self.writer.send(line).await?;
        Ok(())
    }

    /// Next line from the server, or `None` once it closes the connection.
    /// Fails if nothing arrives within the read timeout.
    pub async fn read_line(&mut self) -> Result<Option<String>> {
        let next = tokio::time::timeout(self.config.read_timeout, self.reader.next())
            .await
            .map_err(|_| ChatError::network("read timeout"))?;
        let line = next.transpose()?;
        if let Some(line) = &line {
            debug!("<- {}", line);
        }
        Ok(line)
    }

    /// Read lines until one satisfies `predicate`; returns every line read,
    /// the matching one last
    pub async fn read_until<F>(&mut self, mut predicate: F) -> Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut seen = Vec::new();
        loop {
            let Some(line) = self.read_line().await? else {
                return Err(ChatError::network(format!(
                    "connection closed after {} lines",
                    seen.len()
                )));
            };
            let done = predicate(&line);
            seen.push(line);
            if done {
                return Ok(seen);
            }
        }
    }

    /// Answer the login prompt and wait for the end of the help text.
    ///
    /// Returns the first reply line after the login, which is either the
    /// welcome banner or an `ERROR:` line.
    pub async fn login(&mut self, username: &str) -> Result<String> {
        self.read_until(|l| l.starts_with("Type: login")).await?;
        self.send_line(&format!("login {}", username)).await?;

        let first = self
            .read_line()
            .await?
            .ok_or_else(|| ChatError::network("connection closed during login"))?;
        if !first.starts_with("ERROR") {
            self.read_until(|l| l == " - exit").await?;
        }
        Ok(first)
    }

    /// Close the write side; the server sees end of input
    pub async fn disconnect(mut self) -> Result<()> {
        SinkExt::<&str>::close(&mut self.writer).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_line_exchange() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read, mut write) = stream.into_split();
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"hello\r\nworld\n").await.unwrap();
            let got = lines.next_line().await.unwrap();
            write.shutdown().await.unwrap();
            got
        });

        let mut client = ChatClient::connect(addr).await.unwrap();
        assert_eq!(client.read_line().await.unwrap().as_deref(), Some("hello"));
        client.send_line("ping").await.unwrap();
        assert_eq!(
            client.read_until(|l| l == "world").await.unwrap(),
            vec!["world"]
        );
        assert_eq!(client.read_line().await.unwrap(), None);
        assert_eq!(server.await.unwrap().as_deref(), Some("ping"));
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let accepted = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
            drop(accepted);
        });

        let mut config = ChatClientConfig::new(addr);
        config.read_timeout = Duration::from_millis(50);
        let mut client = ChatClient::connect_with(config).await.unwrap();

        let err = client.read_line().await.unwrap_err();
        assert!(matches!(err, ChatError::Network(_)));
    }
}

//! Parlor chat server
//!
//! Usage:
//!   parlor                         # port 5555, database chat.db
//!   parlor 6000 /var/lib/chat.db   # explicit port and database
//!   parlor --max-clients 20        # more simultaneous users

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use parlor::{ChatServer, MessageStore, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "parlor", version, about = "Line-oriented multi-user chat server")]
struct Cli {
    /// TCP port to listen on
    #[arg(env = "CHAT_PORT", default_value_t = 5555)]
    port: u16,

    /// SQLite database file for stored messages
    #[arg(env = "CHAT_DATABASE", default_value = "chat.db")]
    database: PathBuf,

    /// Address to bind
    #[arg(long, env = "CHAT_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Maximum number of simultaneously logged-in clients
    #[arg(long, env = "CHAT_MAX_CLIENTS", default_value_t = 10)]
    max_clients: usize,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            database: self.database,
            max_clients: self.max_clients,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Cli::parse().into_config();

    info!("Configuration:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Database: {}", config.database.display());
    info!("  - Max clients: {}", config.max_clients);

    let store = MessageStore::open(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    let bind_addr = config.bind_addr;
    let server = ChatServer::bind(config, store)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    server.run().await.context("server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_arguments() {
        let cli = Cli::try_parse_from(["parlor", "6000", "/tmp/x.db", "--max-clients", "3"]).unwrap();
        let config = cli.into_config();
        assert_eq!(config.bind_addr.port(), 6000);
        assert_eq!(config.database, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.max_clients, 3);
        assert_eq!(config.max_group_size, 5);
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Cli::try_parse_from(["parlor", "not-a-port"]).is_err());
    }
}

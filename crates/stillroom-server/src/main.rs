use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use stillroom_core::storage::{open_backend, Config, StorageBackend};
use stillroom_server::AppState;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    Memory,
    Sqlite,
}

impl From<Backend> for StorageBackend {
    fn from(b: Backend) -> Self {
        match b {
            Backend::Memory => StorageBackend::Memory,
            Backend::Sqlite => StorageBackend::Sqlite,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stillroom-server", version, about = "Stillroom REST backend")]
struct Args {
    /// Address to bind (overrides server.host)
    #[arg(long, env = "STILLROOM_HOST")]
    host: Option<String>,
    /// Port to listen on (overrides server.port)
    #[arg(long, short, env = "STILLROOM_PORT")]
    port: Option<u16>,
    /// Storage backend (overrides storage.backend)
    #[arg(long, value_enum, env = "STILLROOM_BACKEND")]
    backend: Option<Backend>,
    /// SQLite file name inside the data directory (overrides storage.database_file)
    #[arg(long, env = "STILLROOM_DATABASE")]
    database: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::load_or_default();
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(backend) = args.backend {
        config.storage.backend = backend.into();
    }
    if let Some(database) = args.database {
        config.storage.database_file = database;
    }

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address '{}'", config.server_addr()))?;

    let store = open_backend(&config.storage).context("failed to open session store")?;
    tracing::info!(backend = ?config.storage.backend, "session store ready");

    stillroom_server::serve(addr, AppState::new(store)).await
}

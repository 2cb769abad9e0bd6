use anyhow::Result;
use chunkdrop::config::ServerConfig;
use chunkdrop::logging::{LogConfig, init_logging};
use chunkdrop::server::{ServerState, create_router};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging(LogConfig::default())?;

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load(Path::new(&path))?,
        None => ServerConfig::default(),
    };

    tokio::fs::create_dir_all(&config.upload_dir).await?;
    tokio::fs::create_dir_all(config.tmp_dir()).await?;

    let listen_addr = config.listen_addr;
    let router = create_router(Arc::new(ServerState::new(config)));

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(target: "main", addr = %listen_addr, "Upload server listening");
    axum::serve(listener, router).await?;

    Ok(())
}

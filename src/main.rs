mod config;
mod dataset;
mod export;
mod proximity;
mod server;
mod session;
mod timing;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use config::{Config, DEFAULT_CONFIG_PATH};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use server::server::Server;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load(&config_path).map_err(anyhow::Error::msg)?;

    let dataset = dataset::loader::load_from_config(&config)
        .await
        .with_context(|| format!("loading {}", config.data_source))?;
    if dataset.is_empty() {
        log::warn!("Closure table has no usable rows");
    }
    let server = Server::setup(Arc::new(dataset), &config)?;

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("binding {}", config.bind_address))?;
    log::info!("Listening on {}", config.bind_address);

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(connection) => connection,
            Err(err) => {
                log::warn!("Could not accept connection: {}", err);
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let server_clone = server.clone();
        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new()
                .serve_connection(io, server_clone)
                .await
            {
                log::warn!("Connection from {} failed: {}", peer, err);
            }
        });
    }
}

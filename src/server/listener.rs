use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{Instrument, info};

use crate::config::Config;
use crate::http::connection::Connection;
use crate::static_files::StaticFileHandler;

/// Accepts connections and serves each one on its own task.
pub struct Listener {
    listener: TcpListener,
    handler: Arc<StaticFileHandler>,
    read_timeout: Duration,
}

impl Listener {
    /// Binds the configured address and prepares the file root.
    pub async fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let handler = StaticFileHandler::from_config(&cfg.static_files).with_context(|| {
            format!(
                "invalid static file root {}",
                cfg.static_files.root.display()
            )
        })?;

        let listener = TcpListener::bind(&cfg.server.listen_addr)
            .await
            .with_context(|| format!("failed to bind {}", cfg.server.listen_addr))?;

        Ok(Self {
            listener,
            handler: Arc::new(handler),
            read_timeout: cfg.server.read_timeout(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop. Only returns if the process is shutting down.
    pub async fn serve(self) -> anyhow::Result<()> {
        info!(
            addr = %self.local_addr()?,
            root = %self.handler.resolver().root().display(),
            "Listening"
        );

        loop {
            let (socket, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // Typically EMFILE or a connection reset before accept.
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            tracing::debug!("Accepted connection from {}", peer);

            let handler = Arc::clone(&self.handler);
            let read_timeout = self.read_timeout;
            let span = tracing::info_span!("conn", %peer);

            tokio::spawn(
                async move {
                    let mut conn = Connection::new(socket, handler, read_timeout);
                    if let Err(e) = conn.run().await {
                        tracing::error!("Connection error from {}: {}", peer, e);
                    }
                }
                .instrument(span),
            );
        }
    }
}

pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    Listener::bind(cfg).await?.serve().await
}

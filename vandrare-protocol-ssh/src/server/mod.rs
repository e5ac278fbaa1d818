//! SSH listener bootstrap: on accept, instantiate one `Handler` per
//! connection. Grounded on the `run_server`/`_run_stream` pair in
//! `warpgate-protocol-ssh/src/server/mod.rs`: same `Config`
//! construction and `russh::server::run_stream` entry point, stripped of
//! session registration/tracking (`services.state`) since this gateway
//! tracks nothing beyond what `GatewayState`/`CleanupStack` already hold.

mod handler;

use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use russh::keys::PrivateKey;
use russh::MethodSet;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::error;

use crate::state::GatewayState;
use handler::GatewayHandler;

/// Accepts connections on `bind` until `shutdown` is notified, instantiating
/// a fresh [`GatewayHandler`] per connection.
pub async fn run_server(
    state: Arc<GatewayState>,
    host_key: PrivateKey,
    bind: SocketAddr,
    shutdown: Arc<Notify>,
) -> Result<()> {
    let config = Arc::new(russh::server::Config {
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        methods: MethodSet::PUBLICKEY,
        keys: vec![host_key],
        ..Default::default()
    });

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding SSH listener on {bind}"))?;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                return Ok(());
            }
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted.context("accepting SSH connection")?;
                let config = config.clone();
                let handler = GatewayHandler::new(state.clone(), Some(peer_addr));
                tokio::spawn(async move {
                    if let Err(error) = run_stream(config, stream, handler).await {
                        error!(%error, %peer_addr, "SSH connection failed");
                    }
                });
            }
        }
    }
}

async fn run_stream<R>(
    config: Arc<russh::server::Config>,
    stream: R,
    handler: GatewayHandler,
) -> Result<()>
where
    R: AsyncRead + AsyncWrite + Unpin + Debug + Send + 'static,
{
    let session = russh::server::run_stream(config, stream, handler).await?;
    session.await?;
    Ok(())
}

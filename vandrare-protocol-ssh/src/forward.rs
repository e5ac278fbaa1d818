//! Reverse-tunnel bridge, grounded on
//! `warpgate-protocol-ssh`'s `RCEvent::ForwardedTcpIp` handling in
//! `server/session.rs`: for each
//! `connData` a bound exposer's worker receives, open a `forwarded-tcpip`
//! channel back towards the exposer carrying the original peer/origin tuple,
//! then splice bytes in both directions; as soon as either direction's copy
//! finishes, both ends are closed, matching
//! `examples/original_source/gateway/ssh/reverse_tcp.go`'s
//! `copyAndClose(to, from)` (`defer to.Close(); defer from.Close()`). A
//! failed channel-open just drops the consumer side; it never tears down the
//! exposer's control connection.

use std::sync::Arc;

use russh::server::Handle;
use tokio::io::{copy, split, AsyncWriteExt};
use tracing::{debug, warn};
use vandrare_core::{ConnData, EndpointRegistry, Worker};

use crate::cleanup::CleanupToken;
use crate::common::BoxedIo;

/// Runs until `cleanup` fires (transport drop or `cancel-tcpip-forward`) or
/// the worker's channel closes, then removes the worker from `registry` and
/// fires `cleanup` itself so the once-only guard is satisfied either way.
pub fn spawn_forward_worker(
    registry: Arc<EndpointRegistry<ConnData<BoxedIo>>>,
    mut worker: Worker<ConnData<BoxedIo>>,
    handle: Handle,
    cleanup: CleanupToken,
) {
    tokio::spawn(async move {
        let endpoint = worker.endpoint().to_string();
        loop {
            tokio::select! {
                _ = cleanup.cancelled() => break,
                conn = worker.recv() => match conn {
                    Some(conn) => {
                        tokio::spawn(bridge_one(handle.clone(), conn));
                    }
                    None => break,
                },
            }
        }
        registry.remove_worker(&worker).await;
        cleanup.fire();
        debug!(%endpoint, "forward worker torn down");
    });
}

async fn bridge_one(handle: Handle, conn: ConnData<BoxedIo>) {
    let channel = match handle
        .channel_open_forwarded_tcpip(
            conn.to_host.clone(),
            conn.to_port,
            conn.from_host.clone(),
            conn.from_port,
        )
        .await
    {
        Ok(channel) => channel,
        Err(error) => {
            warn!(
                to_host = %conn.to_host, to_port = conn.to_port,
                ?error, "failed to open forwarded-tcpip back-channel"
            );
            return;
        }
    };

    let (mut back_r, mut back_w) = split(channel.into_stream());
    let (mut consumer_r, mut consumer_w) = split(conn.io);

    let to_exposer = copy(&mut consumer_r, &mut back_w);
    let to_consumer = copy(&mut back_r, &mut consumer_w);
    tokio::select! {
        _ = to_exposer => {}
        _ = to_consumer => {}
    }
    // Either direction finishing closes both ends of both streams, mirroring
    // `copyAndClose`'s `defer to.Close(); defer from.Close()` — the other
    // direction's copy is abandoned by dropping its halves here too.
    let _ = back_w.shutdown().await;
    let _ = consumer_w.shutdown().await;
    drop(back_r);
    drop(back_w);
    drop(consumer_r);
    drop(consumer_w);
}

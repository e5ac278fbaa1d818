//! Supervisor: issues the process host key/certificate once, then runs the
//! SSH and HTTP listeners as peer tasks sharing one shutdown signal
//! Grounded on `warpgate/src/commands/run.rs`'s
//! `FuturesUnordered` of protocol-server futures plus ctrl_c handling,
//! trimmed to this gateway's two listeners (no MySQL/Postgres/Kubernetes
//! protocol servers, no config-file watcher, no systemd notify socket).

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use russh::keys::PublicKey;
use tokio::sync::Notify;
use tracing::{error, info};
use vandrare_common::config::CA_SEED_ENV_VAR;
use vandrare_common::GatewayConfig;
use vandrare_core::ca::CA_SEED_LEN;
use vandrare_core::Services;
use vandrare_protocol_http::HttpState;
use vandrare_protocol_ssh::keys::{certificate_openssh, issue_host_key};
use vandrare_protocol_ssh::GatewayState;

pub async fn run(config: GatewayConfig) -> Result<()> {
    let ca_seed = take_ca_seed()?;
    let services = Services::new(config.clone(), &ca_seed).await?;

    let admin_key = load_admin_key(&config.admin_key_file)?;
    let host_key = issue_host_key(&services.ca, &config.self_domains)
        .context("issuing process host key")?;
    let host_certificate_openssh =
        certificate_openssh(&host_key).context("rendering host certificate")?;

    let ssh_state = GatewayState::new(services.clone(), admin_key);
    let http_state = Arc::new(HttpState {
        services: services.clone(),
        host_certificate_openssh,
    });

    let shutdown = Arc::new(Notify::new());

    let mut listeners: FuturesUnordered<std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>>> =
        FuturesUnordered::new();
    listeners.push(Box::pin(vandrare_protocol_ssh::run_server(
        ssh_state,
        host_key,
        config.ssh_bind.addr(),
        shutdown.clone(),
    )));
    listeners.push(Box::pin(vandrare_protocol_http::run_server(
        http_state,
        config.http_bind.addr(),
        shutdown.clone(),
    )));

    info!(
        ssh = ?config.ssh_bind.addr(),
        http = ?config.http_bind.addr(),
        "vandrare is now running"
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
            shutdown.notify_waiters();
        }
        Some(result) = listeners.next() => {
            if let Err(error) = result {
                error!(%error, "listener failed");
            }
            shutdown.notify_waiters();
        }
    }

    while let Some(result) = listeners.next().await {
        if let Err(error) = result {
            error!(%error, "listener failed during shutdown");
        }
    }

    info!("Exiting");
    Ok(())
}

/// Reads the hex-encoded 32-byte CA seed from its environment variable and
/// clears it from the process environment immediately, so it
/// doesn't leak into child processes or `/proc/self/environ` any longer
/// than startup requires.
fn take_ca_seed() -> Result<[u8; CA_SEED_LEN]> {
    let raw = std::env::var(CA_SEED_ENV_VAR)
        .with_context(|| format!("{CA_SEED_ENV_VAR} is not set"))?;
    std::env::remove_var(CA_SEED_ENV_VAR);
    decode_ca_seed(&raw)
}

fn decode_ca_seed(raw: &str) -> Result<[u8; CA_SEED_LEN]> {
    let bytes = hex::decode(raw.trim()).context("CA seed is not valid hex")?;
    if bytes.len() != CA_SEED_LEN {
        bail!("CA seed must be {CA_SEED_LEN} bytes, got {}", bytes.len());
    }
    let mut seed = [0u8; CA_SEED_LEN];
    seed.copy_from_slice(&bytes);
    Ok(seed)
}

fn load_admin_key(path: &Path) -> Result<PublicKey> {
    let line = std::fs::read_to_string(path)
        .with_context(|| format!("reading admin key file {}", path.display()))?;
    PublicKey::from_openssh(line.trim()).context("parsing admin public key")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ca_seed_accepts_32_bytes() {
        let hex_seed = hex::encode([7u8; CA_SEED_LEN]);
        let seed = decode_ca_seed(&hex_seed).expect("valid seed");
        assert_eq!(seed, [7u8; CA_SEED_LEN]);
    }

    #[test]
    fn decode_ca_seed_rejects_wrong_length() {
        let hex_seed = hex::encode([7u8; 16]);
        assert!(decode_ca_seed(&hex_seed).is_err());
    }

    #[test]
    fn decode_ca_seed_rejects_non_hex() {
        assert!(decode_ca_seed("not hex").is_err());
    }
}

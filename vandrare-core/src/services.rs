use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use vandrare_common::GatewayConfig;
use vandrare_db::Store;

use crate::ca::CaKey;

/// Struct-of-`Arc` service aggregator, grounded on
/// `warpgate-core/src/services.rs`'s assembly pattern, trimmed to what
/// this gateway actually needs: config, the persistence store, and the
/// process-private CA. The endpoint registry is owned by
/// `vandrare-protocol-ssh` instead, since its `Worker` payload type is
/// protocol-specific and would otherwise force this crate to depend on
/// `russh`.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<GatewayConfig>,
    pub store: Arc<Mutex<Store>>,
    pub ca: Arc<CaKey>,
}

impl Services {
    pub async fn new(config: GatewayConfig, ca_seed: &[u8]) -> Result<Self> {
        let store = Store::open(&config.store_dir).await?;
        let ca = CaKey::from_seed(ca_seed)?;
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            ca: Arc::new(ca),
        })
    }

    /// Used by integration tests: an in-memory store, no on-disk footprint.
    pub async fn new_in_memory(config: GatewayConfig, ca_seed: &[u8]) -> Result<Self> {
        let store = Store::open_memory().await?;
        let ca = CaKey::from_seed(ca_seed)?;
        Ok(Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(store)),
            ca: Arc::new(ca),
        })
    }
}

//! Config file loading, grounded on `vandrare-common/src/config.rs`'s
//! `GatewayConfig::load` (YAML + `VANDRARE_`-prefixed env layering,
//! `warpgate-common`'s `Environment::with_prefix("WARPGATE")` convention
//! renamed). This module only adds the CLI-facing path resolution and
//! startup log line `warpgate/src/config.rs` prints.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use vandrare_common::GatewayConfig;

pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig> {
    let config = GatewayConfig::load(path)
        .with_context(|| format!("loading config from {:?}", path.map(Path::display)))?;
    info!(
        ssh_bind = ?config.ssh_bind.addr(),
        http_bind = ?config.http_bind.addr(),
        store_dir = %config.store_dir.display(),
        "Using config"
    );
    Ok(config)
}

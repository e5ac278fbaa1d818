use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domains::wrap_ip;
use crate::types::ListenEndpoint;
use crate::GatewayError;

/// Environment variable the CA seed is read from once at startup and then
/// cleared from the process environment.
pub const CA_SEED_ENV_VAR: &str = "VANDRARE_CA_SEED";

/// The gateway's configuration surface: everything named in
/// "Configuration inputs (gateway)".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the SSH frontend (exposers + consumers) binds to.
    pub ssh_bind: ListenEndpoint,

    /// Address the HTTP companion binds to.
    pub http_bind: ListenEndpoint,

    /// Authorized-keys-format file containing the admin public key.
    pub admin_key_file: PathBuf,

    /// Directory the SQLite store and its migrations live in.
    pub store_dir: PathBuf,

    /// Self-domains used as host certificate principals, e.g.
    /// `gateway.example.com:22`. Normalized at load time.
    #[serde(default)]
    pub self_domains: Vec<String>,

    /// Subdomains the CA should also be trusted for via wildcard
    /// `@cert-authority *.<domain>` lines. Normalized at load time.
    #[serde(default)]
    pub subdomains: Vec<String>,
}

impl GatewayConfig {
    /// Load configuration from an optional YAML file, then layer
    /// `VANDRARE_`-prefixed environment variables on top, matching
    /// `warpgate-common`'s `Environment::with_prefix` convention.
    pub fn load(config_file: Option<&std::path::Path>) -> Result<Self, GatewayError> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_file {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VANDRARE")
                .separator("__")
                .try_parsing(true),
        );
        let raw = builder.build()?;
        let mut cfg: Self = raw.try_deserialize()?;
        cfg.normalize();
        Ok(cfg)
    }

    fn normalize(&mut self) {
        self.self_domains = wrap_ip(&self.self_domains);
        self.subdomains = wrap_ip(&self.subdomains);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_wraps_host_port_entries() {
        let mut cfg = GatewayConfig {
            ssh_bind: std::net::SocketAddr::from(([0, 0, 0, 0], 22)).into(),
            http_bind: std::net::SocketAddr::from(([0, 0, 0, 0], 8080)).into(),
            admin_key_file: PathBuf::from("/etc/vandrare/admin.pub"),
            store_dir: PathBuf::from("/var/lib/vandrare"),
            self_domains: vec!["gateway.example.com:22".into()],
            subdomains: vec!["tunnels.example.com:22".into()],
        };
        cfg.normalize();
        assert_eq!(cfg.self_domains, vec!["[gateway.example.com]:22".to_string()]);
        assert_eq!(cfg.subdomains, vec!["[tunnels.example.com]:22".to_string()]);
    }
}

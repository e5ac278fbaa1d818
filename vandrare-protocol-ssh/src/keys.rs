//! Host-key setup for a single gateway process: on startup, generate a fresh
//! Ed25519 key, wrap it as a host certificate signed by the process's CA key,
//! and install the resulting cert-signer as the only host key.
//!
//! Unlike `warpgate-protocol-ssh`, which persists Ed25519 and RSA host keys
//! to disk so they survive restarts, this gateway never persists a host
//! key — the CA is the thing that has to survive restarts (deterministically,
//! from its seed), and a fresh host key signed by it every launch is
//! indistinguishable to clients since they pin the CA, not the host key.

use russh::keys::PrivateKey;
use vandrare_core::{ca::host_certificate_principals, CaKey};

use crate::error::SshError;

/// Generate the process's one host key: a fresh Ed25519 keypair signed as a
/// host certificate with principals derived from `self_domains`.
pub fn issue_host_key(ca: &CaKey, self_domains: &[String]) -> Result<PrivateKey, SshError> {
    let principals = host_certificate_principals(self_domains);
    Ok(ca.issue_host_certificate(&principals)?)
}

/// Authorized-keys-format rendering of the certificate embedded in
/// `host_key`, for `GET /gateway/ssh/certificates/self` —
/// the same certificate this process's SSH listener presents, not a
/// freshly-issued one, since `issue_host_certificate` mints a new Ed25519
/// key and signature on every call.
pub fn certificate_openssh(host_key: &PrivateKey) -> Result<String, SshError> {
    let cert = host_key
        .certificate()
        .ok_or_else(|| SshError::KeyParse("host key carries no certificate".to_string()))?;
    cert.to_openssh()
        .map_err(|e| SshError::KeyParse(e.to_string()))
}

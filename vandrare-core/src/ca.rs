//! Process-private CA key and host certificate issuance.
//!
//! `warpgate-ca` issues X.509 certificates for TLS — the wrong primitive
//! here, since consumers trust the gateway over SSH. This is new
//! functionality grounded on the `ssh-key` crate's
//! certificate builder, standing in for the Go original's
//! `golang.org/x/crypto/ssh` `Certificate`/`CertChecker` pair.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use ssh_key::certificate::{Builder, CertType};
use ssh_key::{Algorithm, Certificate, PrivateKey, PublicKey};

use crate::error::CaError;

pub const CA_SEED_LEN: usize = 32;
const HOST_CERT_LIFETIME: Duration = Duration::from_secs(365 * 24 * 3600);

/// Deterministic Ed25519 signer derived from a 32-byte seed. Its lifetime is
/// the process's: it is never persisted, so redeploying with the same seed
/// reproduces the same CA identity and consumers never see a changed
/// fingerprint.
pub struct CaKey {
    signer: PrivateKey,
}

impl CaKey {
    pub fn from_seed(seed: &[u8]) -> Result<Self, CaError> {
        if seed.len() != CA_SEED_LEN {
            return Err(CaError::BadSeedLength(seed.len()));
        }
        let mut seed_arr = [0u8; CA_SEED_LEN];
        seed_arr.copy_from_slice(seed);
        let mut rng = ChaCha20Rng::from_seed(seed_arr);
        let signer = PrivateKey::random(&mut rng, Algorithm::Ed25519)
            .map_err(|e| CaError::KeyGeneration(e.to_string()))?;
        Ok(Self { signer })
    }

    pub fn public_key(&self) -> &PublicKey {
        self.signer.public_key()
    }

    /// `SHA256:...` fingerprint of the CA public key, used in the
    /// `known_hosts` header comment.
    pub fn fingerprint(&self) -> String {
        self.public_key().fingerprint(Default::default()).to_string()
    }

    /// Authorized-keys-format line for `GET /gateway/ssh/certificates/host_ca.pub`.
    pub fn public_key_openssh(&self) -> Result<String, CaError> {
        self.public_key()
            .to_openssh()
            .map_err(|e| CaError::Encode(e.to_string()))
    }

    /// Generate a fresh Ed25519 host key and sign it as a host certificate
    /// with `principals` as the `valid_principals` set (already sorted and
    /// deduplicated by the caller).
    pub fn issue_host_certificate(&self, principals: &[String]) -> Result<PrivateKey, CaError> {
        let mut rng = rand::rngs::OsRng;
        let mut host_key = PrivateKey::random(&mut rng, Algorithm::Ed25519)
            .map_err(|e| CaError::KeyGeneration(e.to_string()))?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let valid_after = now.as_secs().saturating_sub(1);
        let valid_before = now.as_secs() + HOST_CERT_LIFETIME.as_secs();
        let key_id = principals.first().cloned().unwrap_or_default();

        let mut builder = Builder::new_with_random_nonce(
            &mut rng,
            host_key.public_key().clone(),
            valid_after,
            valid_before,
        )
        .map_err(|e| CaError::CertBuild(e.to_string()))?;
        builder
            .cert_type(CertType::Host)
            .map_err(|e| CaError::CertBuild(e.to_string()))?;
        builder
            .key_id(key_id)
            .map_err(|e| CaError::CertBuild(e.to_string()))?;
        for principal in principals {
            builder
                .valid_principal(principal)
                .map_err(|e| CaError::CertBuild(e.to_string()))?;
        }
        let cert: Certificate = builder
            .sign(&self.signer)
            .map_err(|e| CaError::CertBuild(e.to_string()))?;

        host_key
            .set_certificate(cert)
            .map_err(|e| CaError::CertBuild(e.to_string()))?;
        Ok(host_key)
    }
}

/// `valid_principals = set(self_domains ∪ host-component-of-each-domain)`,
/// sorted lexicographically.
pub fn host_certificate_principals(self_domains: &[String]) -> Vec<String> {
    let mut set = std::collections::BTreeSet::new();
    for domain in self_domains {
        set.insert(domain.clone());
        if let Some(host) = host_component(domain) {
            set.insert(host);
        }
    }
    set.into_iter().collect()
}

fn host_component(entry: &str) -> Option<String> {
    if let Some(rest) = entry.strip_prefix('[') {
        return rest.find(']').map(|end| rest[..end].to_string());
    }
    entry.split_once(':').map(|(host, _)| host.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn principals_include_host_component_sorted() {
        let principals =
            host_certificate_principals(&["[gateway.example.com]:22".to_string(), "gw".to_string()]);
        assert_eq!(
            principals,
            vec![
                "[gateway.example.com]:22".to_string(),
                "gateway.example.com".to_string(),
                "gw".to_string(),
            ]
        );
    }

    #[test]
    fn ca_from_seed_is_deterministic() {
        let seed = [7u8; CA_SEED_LEN];
        let a = CaKey::from_seed(&seed).expect("a");
        let b = CaKey::from_seed(&seed).expect("b");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn rejects_wrong_seed_length() {
        assert!(CaKey::from_seed(&[0u8; 16]).is_err());
    }

    #[test]
    fn issued_certificate_carries_principals() {
        let ca = CaKey::from_seed(&[3u8; CA_SEED_LEN]).expect("ca");
        let principals = vec!["gateway.example.com".to_string()];
        let host_key = ca.issue_host_certificate(&principals).expect("issue");
        assert!(host_key.certificate().is_some());
    }
}

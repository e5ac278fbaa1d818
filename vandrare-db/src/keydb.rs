//! Key database: fingerprint-scoped validity windows, allowed hosts and a
//! permission overlay, stored as JSON blobs through the KV sub-API. The
//! retained Go snapshot's `static_keydb.go` only implements a trivial
//! `AllowAnyKey`; this is a fuller implementation of the same contract.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::json::{get_json, put_json};
use crate::store::Ops;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PermissionAction {
    Allow,
    Deny,
}

impl PermissionAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRule {
    pub operation: String,
    pub resource: String,
    pub action: PermissionAction,
}

/// A registered key's validity window and allowed hostnames. Stored as JSON
/// under `kdb:key:<fp>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyConfig {
    pub valid_from_unixms: i64,
    pub expires_at_unixms: i64,
    pub allowed_hosts: Vec<String>,
    pub description: String,
}

impl KeyConfig {
    pub fn is_active(&self, now_unixms: i64) -> bool {
        self.valid_from_unixms <= now_unixms && now_unixms <= self.expires_at_unixms
    }
}

/// A self-service registration request, stored under `kdb:key-reg:<fp>`.
/// Upserting this record does not by itself grant access — an operator
/// still has to call `register_key` to approve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRegistration {
    pub pubkey_openssh: String,
    pub requested_hosts: Vec<String>,
    pub note: String,
    pub requested_at_unixms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Ok,
    NotAuthorized,
}

fn key_key(fp: &str) -> String {
    format!("kdb:key:{fp}")
}
fn perm_key(fp: &str) -> String {
    format!("kdb:key-perm:{fp}")
}
fn reg_key(fp: &str) -> String {
    format!("kdb:key-reg:{fp}")
}

pub struct KeyDbOps<'a> {
    ops: &'a mut Ops,
}

impl<'a> KeyDbOps<'a> {
    pub fn new(ops: &'a mut Ops) -> Self {
        Self { ops }
    }

    pub async fn register_key(
        &mut self,
        fp: &str,
        valid_from_unixms: i64,
        expires_at_unixms: i64,
        allowed_hosts: Vec<String>,
        description: String,
    ) -> Result<(), StoreError> {
        let cfg = KeyConfig {
            valid_from_unixms,
            expires_at_unixms,
            allowed_hosts,
            description,
        };
        put_json(&mut self.ops.kv(), &key_key(fp), &cfg).await
    }

    pub async fn get_key(&mut self, fp: &str) -> Result<Option<KeyConfig>, StoreError> {
        get_json(&mut self.ops.kv(), &key_key(fp)).await
    }

    /// Upsert a permission overlay entry. Deny overrides allow for the same
    /// `(operation, resource)` pair; identical tuples are deduplicated.
    pub async fn set_permission(
        &mut self,
        fp: &str,
        operation: &str,
        resource: &str,
        action: PermissionAction,
    ) -> Result<(), StoreError> {
        let key = perm_key(fp);
        let mut rules: Vec<PermissionRule> =
            get_json(&mut self.ops.kv(), &key).await?.unwrap_or_default();
        if let Some(existing) = rules
            .iter_mut()
            .find(|r| r.operation == operation && r.resource == resource)
        {
            if existing.action == PermissionAction::Deny {
                // deny sticks regardless of what's being requested now
            } else {
                existing.action = action;
            }
        } else {
            rules.push(PermissionRule {
                operation: operation.to_string(),
                resource: resource.to_string(),
                action,
            });
        }
        put_json(&mut self.ops.kv(), &key, &rules).await
    }

    pub async fn permissions(&mut self, fp: &str) -> Result<Vec<PermissionRule>, StoreError> {
        Ok(get_json(&mut self.ops.kv(), &perm_key(fp))
            .await?
            .unwrap_or_default())
    }

    /// A key is active iff its config exists and `valid_from <= now <=
    /// expires_at`.
    pub async fn authn(&mut self, fp: &str, now_unixms: i64) -> Result<AuthResult, StoreError> {
        match self.get_key(fp).await? {
            Some(cfg) if cfg.is_active(now_unixms) => Ok(AuthResult::Ok),
            _ => Ok(AuthResult::NotAuthorized),
        }
    }

    /// Implemented only for `operation = "expose-endpoint"`: succeeds iff
    /// `resource` is in the key's `allowed_hosts`. All other operations are
    /// rejected. The permission overlay (`set_permission`/`permissions`) is a
    /// parallel mechanism and does not modify this outcome.
    pub async fn authz(
        &mut self,
        fp: &str,
        operation: &str,
        resource: &str,
    ) -> Result<AuthResult, StoreError> {
        if operation != "expose-endpoint" {
            return Ok(AuthResult::NotAuthorized);
        }
        let Some(cfg) = self.get_key(fp).await? else {
            return Ok(AuthResult::NotAuthorized);
        };
        Ok(if cfg.allowed_hosts.iter().any(|h| h == resource) {
            AuthResult::Ok
        } else {
            AuthResult::NotAuthorized
        })
    }

    /// Idempotent upsert of a self-service registration record.
    pub async fn request_key_registration(
        &mut self,
        fp: &str,
        registration: KeyRegistration,
    ) -> Result<(), StoreError> {
        put_json(&mut self.ops.kv(), &reg_key(fp), &registration).await
    }

    pub async fn get_key_registration(
        &mut self,
        fp: &str,
    ) -> Result<Option<KeyRegistration>, StoreError> {
        get_json(&mut self.ops.kv(), &reg_key(fp)).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::Store;

    #[tokio::test]
    async fn register_then_read_round_trips() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        {
            let mut kdb = KeyDbOps::new(&mut ops);
            kdb.register_key(
                "SHA256:abc",
                0,
                1_000_000,
                vec!["db.example:5432".into()],
                "test key".into(),
            )
            .await
            .expect("register");
            let cfg = kdb.get_key("SHA256:abc").await.expect("get").expect("some");
            assert_eq!(cfg.allowed_hosts, vec!["db.example:5432".to_string()]);
        }
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn authz_checks_allowed_hosts() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let mut kdb = KeyDbOps::new(&mut ops);
        kdb.register_key(
            "SHA256:abc",
            0,
            1_000_000,
            vec!["db.example:5432".into()],
            "".into(),
        )
        .await
        .expect("register");
        assert_eq!(
            kdb.authz("SHA256:abc", "expose-endpoint", "db.example:5432")
                .await
                .expect("authz"),
            AuthResult::Ok
        );
        assert_eq!(
            kdb.authz("SHA256:abc", "expose-endpoint", "other:1")
                .await
                .expect("authz"),
            AuthResult::NotAuthorized
        );
        assert_eq!(
            kdb.authz("SHA256:abc", "shell", "db.example:5432")
                .await
                .expect("authz"),
            AuthResult::NotAuthorized
        );
    }

    #[tokio::test]
    async fn set_permission_dedups_and_deny_sticks() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let mut kdb = KeyDbOps::new(&mut ops);
        kdb.register_key(
            "SHA256:abc",
            0,
            1_000_000,
            vec!["db.example:5432".into()],
            "".into(),
        )
        .await
        .expect("register");
        kdb.set_permission(
            "SHA256:abc",
            "expose-endpoint",
            "db.example:5432",
            PermissionAction::Deny,
        )
        .await
        .expect("set_permission");
        kdb.set_permission(
            "SHA256:abc",
            "expose-endpoint",
            "db.example:5432",
            PermissionAction::Allow,
        )
        .await
        .expect("set_permission");
        let rules = kdb.permissions("SHA256:abc").await.expect("perms");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].action, PermissionAction::Deny);
        // authz is driven solely by allowed_hosts; the overlay never affects it.
        assert_eq!(
            kdb.authz("SHA256:abc", "expose-endpoint", "db.example:5432")
                .await
                .expect("authz"),
            AuthResult::Ok
        );
    }

    #[tokio::test]
    async fn authn_checks_validity_window() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let mut kdb = KeyDbOps::new(&mut ops);
        kdb.register_key("SHA256:exp", 0, 100, vec![], "".into())
            .await
            .expect("register");
        assert_eq!(kdb.authn("SHA256:exp", 50).await.expect("authn"), AuthResult::Ok);
        assert_eq!(
            kdb.authn("SHA256:exp", 200).await.expect("authn"),
            AuthResult::NotAuthorized
        );
        assert_eq!(
            kdb.authn("SHA256:missing", 50).await.expect("authn"),
            AuthResult::NotAuthorized
        );
    }

    #[tokio::test]
    async fn key_registration_upsert_is_idempotent() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let mut kdb = KeyDbOps::new(&mut ops);
        let reg = KeyRegistration {
            pubkey_openssh: "ssh-ed25519 AAAA".into(),
            requested_hosts: vec!["svc:9000".into()],
            note: "please".into(),
            requested_at_unixms: 42,
        };
        kdb.request_key_registration("SHA256:new", reg.clone())
            .await
            .expect("request");
        kdb.request_key_registration("SHA256:new", reg)
            .await
            .expect("request again");
        let stored = kdb
            .get_key_registration("SHA256:new")
            .await
            .expect("get")
            .expect("some");
        assert_eq!(stored.requested_hosts, vec!["svc:9000".to_string()]);
    }
}

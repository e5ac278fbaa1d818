use std::sync::Arc;

use rhai::{Engine, EvalAltResult, Module};
use tokio::sync::Mutex;
use vandrare_db::{PermissionAction, Store};

use super::block_on;

fn fingerprint_of(pubkey_openssh: &str) -> Result<String, Box<EvalAltResult>> {
    let key = ssh_key::PublicKey::from_openssh(pubkey_openssh)
        .map_err(|e| format!("invalid public key: {e}"))?;
    Ok(key.fingerprint(Default::default()).to_string())
}

fn now_unixms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// `keyset::put(pubkey_openssh, valid_from_duration, expires_in_duration, hostname)`.
pub fn register(engine: &mut Engine, store: Arc<Mutex<Store>>) {
    let mut module = Module::new();

    let put_store = store.clone();
    module.set_native_fn(
        "put",
        move |pubkey: &str, valid_from: &str, expires_in: &str, hostname: &str| -> Result<(), Box<EvalAltResult>> {
            let fp = fingerprint_of(pubkey)?;
            let valid_from = humantime::parse_duration(valid_from)
                .map_err(|e| format!("invalid valid_from duration: {e}"))?;
            let expires_in = humantime::parse_duration(expires_in)
                .map_err(|e| format!("invalid expires_in duration: {e}"))?;
            if hostname.is_empty() {
                return Err("invalid hostname".into());
            }
            let now = now_unixms();
            let valid_from_unixms = now + valid_from.as_millis() as i64;
            let expires_at_unixms = now + expires_in.as_millis() as i64;

            let store = put_store.clone();
            block_on(async move {
                let store = store.lock().await;
                let mut ops = store.ops(true).await.map_err(|e| e.to_string())?;
                ops.keydb()
                    .register_key(&fp, valid_from_unixms, expires_at_unixms, vec![hostname.to_string()], String::new())
                    .await
                    .map_err(|e| e.to_string())?;
                ops.close().await.map_err(|e| e.to_string())
            })
            .map_err(|e: String| e.into())
        },
    );

    let perm_store = store;
    module.set_native_fn(
        "addPermission",
        move |pubkey: &str, operation: &str, resource: &str, action: &str| -> Result<(), Box<EvalAltResult>> {
            let fp = fingerprint_of(pubkey)?;
            let action = PermissionAction::parse(action)
                .ok_or_else(|| format!("invalid action: {action}"))?;
            let store = perm_store.clone();
            let operation = operation.to_string();
            let resource = resource.to_string();
            block_on(async move {
                let store = store.lock().await;
                let mut ops = store.ops(true).await.map_err(|e| e.to_string())?;
                ops.keydb()
                    .set_permission(&fp, &operation, &resource, action)
                    .await
                    .map_err(|e| e.to_string())?;
                ops.close().await.map_err(|e| e.to_string())
            })
            .map_err(|e: String| e.into())
        },
    );

    engine.register_static_module("keyset", module.into());
}

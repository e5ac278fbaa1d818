use std::sync::Arc;

use rhai::{Array, Dynamic, Engine, EvalAltResult, Module};
use tokio::sync::Mutex;
use vandrare_db::Store;

use super::block_on;

/// `tokenset::issue(owner, description, ttl_duration)`,
/// `tokenset::issueLifetime(owner, description)`,
/// `tokenset::listActive(owner)`, `tokenset::revoke(id)`.
pub fn register(engine: &mut Engine, store: Arc<Mutex<Store>>) {
    let mut module = Module::new();

    let issue_store = store.clone();
    module.set_native_fn(
        "issue",
        move |owner: &str, description: &str, ttl: &str| -> Result<String, Box<EvalAltResult>> {
            let ttl = humantime::parse_duration(ttl).map_err(|e| format!("invalid ttl: {e}"))?;
            if ttl.is_zero() {
                return Err("TTL must be positive, for lifetime access use issueLifetime".into());
            }
            let store = issue_store.clone();
            let owner = owner.to_string();
            let description = description.to_string();
            block_on(async move {
                let store = store.lock().await;
                let mut ops = store.ops(true).await.map_err(|e| e.to_string())?;
                let token = ops
                    .tokens()
                    .issue(&owner, &description, Some(ttl))
                    .await
                    .map_err(|e| e.to_string())?;
                ops.close().await.map_err(|e| e.to_string())?;
                Ok(token)
            })
            .map_err(|e: String| e.into())
        },
    );

    let lifetime_store = store.clone();
    module.set_native_fn(
        "issueLifetime",
        move |owner: &str, description: &str| -> Result<String, Box<EvalAltResult>> {
            let store = lifetime_store.clone();
            let owner = owner.to_string();
            let description = description.to_string();
            block_on(async move {
                let store = store.lock().await;
                let mut ops = store.ops(true).await.map_err(|e| e.to_string())?;
                let token = ops
                    .tokens()
                    .issue(&owner, &description, None)
                    .await
                    .map_err(|e| e.to_string())?;
                ops.close().await.map_err(|e| e.to_string())?;
                Ok(token)
            })
            .map_err(|e: String| e.into())
        },
    );

    let list_store = store.clone();
    module.set_native_fn(
        "listActive",
        move |owner: &str| -> Result<Array, Box<EvalAltResult>> {
            let store = list_store.clone();
            let owner = owner.to_string();
            let tokens = block_on(async move {
                let store = store.lock().await;
                let mut ops = store.ops(false).await.map_err(|e| e.to_string())?;
                let tokens = ops.tokens().list(&owner, true).await.map_err(|e| e.to_string())?;
                ops.close().await.map_err(|e| e.to_string())?;
                Ok(tokens)
            })
            .map_err(|e: String| e.into())?;
            Ok(tokens
                .into_iter()
                .map(|t| {
                    let mut map = rhai::Map::new();
                    map.insert("id".into(), Dynamic::from(t.id));
                    map.insert("description".into(), Dynamic::from(t.description));
                    map.insert(
                        "expiresAtUnixMs".into(),
                        t.expires_at_unixms.map(Dynamic::from).unwrap_or(Dynamic::UNIT),
                    );
                    Dynamic::from(map)
                })
                .collect())
        },
    );

    let revoke_store = store;
    module.set_native_fn("revoke", move |id: &str| -> Result<(), Box<EvalAltResult>> {
        let store = revoke_store.clone();
        let id = id.to_string();
        block_on(async move {
            let store = store.lock().await;
            let mut ops = store.ops(true).await.map_err(|e| e.to_string())?;
            ops.tokens().remove(&id).await.map_err(|e| e.to_string())?;
            ops.close().await.map_err(|e| e.to_string())
        })
        .map_err(|e: String| e.into())
    });

    engine.register_static_module("tokenset", module.into());
}

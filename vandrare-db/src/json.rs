use serde::{de::DeserializeOwned, Serialize};

use crate::error::StoreError;
use crate::kv::KvOps;

/// Read a JSON blob stored under `key`, returning `Ok(None)` if the key
/// doesn't exist (rather than the Go original's sentinel `errNotFound`,
/// which doesn't translate cleanly — `Option` is the idiomatic fit).
pub async fn get_json<T: DeserializeOwned>(
    kv: &mut KvOps<'_>,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match kv.get_bytes(key).await? {
        Some(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
        None => Ok(None),
    }
}

/// Serialize `val` to JSON and store it under `key`.
pub async fn put_json<T: Serialize>(
    kv: &mut KvOps<'_>,
    key: &str,
    val: &T,
) -> Result<(), StoreError> {
    let buf = serde_json::to_vec(val)?;
    kv.set_bytes(key, &buf).await
}

use std::collections::HashMap;

use crate::error::StoreError;
use crate::store::Ops;

/// Byte-keyed KV sub-API, scoped to one `Ops`. Reads are cached for the
/// lifetime of the handle so repeated lookups of the same key within one
/// transaction don't round-trip to sqlite, mirroring `kvops.cached` in the
/// Go original.
pub struct KvOps<'a> {
    ops: &'a mut Ops,
    cache: HashMap<String, Vec<u8>>,
}

impl<'a> KvOps<'a> {
    pub(crate) fn new(ops: &'a mut Ops) -> Self {
        Self { ops, cache: HashMap::new() }
    }

    pub async fn get_bytes(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(v) = self.cache.get(key) {
            return Ok(Some(v.clone()));
        }
        let tx = self.ops.tx_mut()?;
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("select item_val from dt_key_value where item_key = ?1")
                .bind(key)
                .fetch_optional(&mut **tx)
                .await?;
        match row {
            Some((val,)) => {
                self.cache.insert(key.to_string(), val.clone());
                Ok(Some(val))
            }
            None => Ok(None),
        }
    }

    pub async fn set_bytes(&mut self, key: &str, val: &[u8]) -> Result<(), StoreError> {
        let clock = self.ops.clock;
        let tx = self.ops.tx_mut()?;
        sqlx::query(
            "insert into dt_key_value (item_key, item_val, clk_updated_at_unixms, clk_trid)
             values (?1, ?2, ?3, ?4)
             on conflict (item_key) do update set
                item_val = excluded.item_val,
                clk_updated_at_unixms = excluded.clk_updated_at_unixms,
                clk_trid = excluded.clk_trid",
        )
        .bind(key)
        .bind(val)
        .bind(clock.ts_unixms)
        .bind(clock.trid)
        .execute(&mut **tx)
        .await?;
        self.cache.insert(key.to_string(), val.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::store::Store;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        {
            let mut kv = ops.kv();
            kv.set_bytes("hello", b"world").await.expect("set");
            let v = kv.get_bytes("hello").await.expect("get");
            assert_eq!(v.as_deref(), Some(&b"world"[..]));
        }
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let mut kv = ops.kv();
        assert!(kv.get_bytes("nope").await.expect("get").is_none());
    }
}

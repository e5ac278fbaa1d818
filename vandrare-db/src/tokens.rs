//! Bearer token sub-API, mirroring `internal/store/tokens.go`.

use data_encoding::{BASE64URL_NOPAD, BASE64_NOPAD};
use rand::RngCore;

use crate::error::StoreError;
use crate::store::Ops;

/// A token as listed by `list_active` / `list`: no secret material.
#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub id: String,
    pub description: String,
    pub expires_at_unixms: Option<i64>,
}

pub struct TokenOps<'a> {
    ops: &'a mut Ops,
}

fn now_unixms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Decode a plaintext token, trying url-safe base64 first then falling back
/// to standard, matching `tokendb.go`'s `Valid`.
fn decode_plaintext(token: &str) -> Result<Vec<u8>, StoreError> {
    BASE64URL_NOPAD
        .decode(token.trim_end_matches('=').as_bytes())
        .or_else(|_| BASE64_NOPAD.decode(token.trim_end_matches('=').as_bytes()))
        .map_err(|_| StoreError::InvalidToken)
}

impl<'a> TokenOps<'a> {
    pub(crate) fn new(ops: &'a mut Ops) -> Self {
        Self { ops }
    }

    /// Generate 32 random bytes; the first 8 become the lookup id, the
    /// remaining 24 are bcrypt-hashed at default cost and stored. `ttl` of
    /// zero or negative means no expiry. Returns the plaintext once.
    pub async fn issue(
        &mut self,
        owner: &str,
        description: &str,
        ttl: Option<std::time::Duration>,
    ) -> Result<String, StoreError> {
        let mut raw = [0u8; 32];
        rand::rng().fill_bytes(&mut raw);
        let id = BASE64URL_NOPAD.encode(&raw[0..8]);
        let secret = &raw[8..32];
        let hashed = bcrypt::hash(secret, bcrypt::DEFAULT_COST)?;

        let expires_at = ttl
            .filter(|d| !d.is_zero())
            .map(|d| now_unixms() + d.as_millis() as i64);

        let clock = self.ops.clock;
        let tx = self.ops.tx_mut()?;
        sqlx::query(
            "insert into dt_token_set
                (token_id, salted_token, user, description, expires_at_unixms,
                 clk_updated_at_unixms, clk_trid)
             values (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(&hashed)
        .bind(owner)
        .bind(description)
        .bind(expires_at)
        .bind(clock.ts_unixms)
        .bind(clock.trid)
        .execute(&mut **tx)
        .await?;

        Ok(BASE64URL_NOPAD.encode(&raw))
    }

    /// Validate a plaintext token, returning the owning user on success.
    /// Any failure — bad encoding, unknown id, expired, mismatched secret —
    /// collapses to `StoreError::InvalidToken`; only the caller's logging
    /// distinguishes the cases.
    pub async fn valid(&mut self, plaintext: &str) -> Result<(bool, String), StoreError> {
        let raw = decode_plaintext(plaintext)?;
        if raw.len() != 32 {
            return Ok((false, String::new()));
        }
        let id = BASE64URL_NOPAD.encode(&raw[0..8]);
        let secret = &raw[8..32];

        let tx = self.ops.tx_mut()?;
        let row: Option<(Vec<u8>, String, Option<i64>)> = sqlx::query_as(
            "select salted_token, user, expires_at_unixms from dt_token_set where token_id = ?1",
        )
        .bind(&id)
        .fetch_optional(&mut **tx)
        .await?;

        let Some((hashed, owner, expires_at)) = row else {
            tracing::warn!(lookup = %id, "invalid_token: no such token");
            return Ok((false, String::new()));
        };

        if let Some(expires_at) = expires_at {
            if now_unixms() > expires_at {
                tracing::warn!(lookup = %id, "invalid_token: expired");
                return Ok((false, String::new()));
            }
        }

        match bcrypt::verify(secret, &hashed) {
            Ok(true) => Ok((true, owner)),
            _ => {
                tracing::warn!(lookup = %id, "invalid_token: secret mismatch");
                Ok((false, String::new()))
            }
        }
    }

    /// List tokens owned by `owner`. With `only_active`, excludes expired
    /// tokens.
    pub async fn list(
        &mut self,
        owner: &str,
        only_active: bool,
    ) -> Result<Vec<TokenInfo>, StoreError> {
        let tx = self.ops.tx_mut()?;
        let rows: Vec<(String, String, Option<i64>)> = if only_active {
            sqlx::query_as(
                "select token_id, description, expires_at_unixms from dt_token_set
                 where user = ?1 and (expires_at_unixms is null or expires_at_unixms > ?2)
                 order by clk_updated_at_unixms desc",
            )
            .bind(owner)
            .bind(now_unixms())
            .fetch_all(&mut **tx)
            .await?
        } else {
            sqlx::query_as(
                "select token_id, description, expires_at_unixms from dt_token_set
                 where user = ?1 order by clk_updated_at_unixms desc",
            )
            .bind(owner)
            .fetch_all(&mut **tx)
            .await?
        };
        Ok(rows
            .into_iter()
            .map(|(id, description, expires_at_unixms)| TokenInfo {
                id,
                description,
                expires_at_unixms,
            })
            .collect())
    }

    /// Delete a token by id. Not an error if the id doesn't exist (revoking
    /// an already-revoked token is idempotent).
    pub async fn remove(&mut self, id: &str) -> Result<(), StoreError> {
        let tx = self.ops.tx_mut()?;
        sqlx::query("delete from dt_token_set where token_id = ?1")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::store::Store;

    #[tokio::test]
    async fn issue_then_valid_round_trips() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let plaintext = ops
            .tokens()
            .issue("alice", "note", None)
            .await
            .expect("issue");
        let (ok, owner) = ops.tokens().valid(&plaintext).await.expect("valid");
        assert!(ok);
        assert_eq!(owner, "alice");
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn random_bytes_are_never_valid() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        ops.tokens()
            .issue("alice", "note", None)
            .await
            .expect("issue");
        let bogus = data_encoding::BASE64URL_NOPAD.encode(&[7u8; 32]);
        let (ok, _) = ops.tokens().valid(&bogus).await.expect("valid");
        assert!(!ok);
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn expired_token_is_invalid() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let plaintext = ops
            .tokens()
            .issue(
                "alice",
                "note",
                Some(std::time::Duration::from_millis(1)),
            )
            .await
            .expect("issue");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let (ok, _) = ops.tokens().valid(&plaintext).await.expect("valid");
        assert!(!ok);
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn revoke_invalidates_immediately() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        let plaintext = ops
            .tokens()
            .issue("bob", "note", None)
            .await
            .expect("issue");
        let id = ops.tokens().list("bob", true).await.expect("list")[0]
            .id
            .clone();
        ops.tokens().remove(&id).await.expect("remove");
        let (ok, _) = ops.tokens().valid(&plaintext).await.expect("valid");
        assert!(!ok);
        ops.close().await.expect("close");
    }

    #[tokio::test]
    async fn list_active_excludes_expired() {
        let store = Store::open_memory().await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        ops.tokens()
            .issue(
                "carol",
                "short-lived",
                Some(std::time::Duration::from_millis(1)),
            )
            .await
            .expect("issue");
        ops.tokens()
            .issue("carol", "long-lived", None)
            .await
            .expect("issue");
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let active = ops.tokens().list("carol", true).await.expect("list");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].description, "long-lived");
        ops.close().await.expect("close");
    }
}

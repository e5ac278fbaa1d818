//! Whole-store integration tests exercising migrations, KDB, and TDB
//! together through one `Store`, the way `internal/store/kv_test.go` and
//! `lb_test.go` exercise the Go original's package as a unit rather than
//! function-by-function.

use vandrare_db::{AuthResult, Store};

#[tokio::test]
async fn fresh_store_runs_migrations_and_accepts_writes_across_sub_apis() {
    let store = Store::open_memory().await.expect("open");

    let mut ops = store.ops(true).await.expect("ops");
    ops.keydb()
        .register_key(
            "SHA256:exposer",
            0,
            i64::MAX,
            vec!["db.example:5432".to_string()],
            "integration test key".to_string(),
        )
        .await
        .expect("register_key");
    let token = ops
        .tokens()
        .issue("alice", "ci token", None)
        .await
        .expect("issue");
    ops.kv()
        .set_bytes("marker", b"present")
        .await
        .expect("set_bytes");
    ops.close().await.expect("close");

    // A fresh `Ops` scope reads back everything written in the previous one.
    let mut ops = store.ops(true).await.expect("ops");
    assert_eq!(
        ops.keydb()
            .authz("SHA256:exposer", "expose-endpoint", "db.example:5432")
            .await
            .expect("authz"),
        AuthResult::Ok
    );
    let (ok, owner) = ops.tokens().valid(&token).await.expect("valid");
    assert!(ok);
    assert_eq!(owner, "alice");
    assert_eq!(
        ops.kv().get_bytes("marker").await.expect("get_bytes"),
        Some(b"present".to_vec())
    );
    ops.close().await.expect("close");
}

#[tokio::test]
async fn non_autocommit_scope_rolls_back_on_close() {
    let store = Store::open_memory().await.expect("open");

    let mut ops = store.ops(false).await.expect("ops");
    ops.keydb()
        .register_key("SHA256:temp", 0, i64::MAX, vec![], String::new())
        .await
        .expect("register_key");
    ops.close().await.expect("close rolls back, no error recorded");

    let mut ops = store.ops(true).await.expect("ops");
    assert_eq!(
        ops.keydb().get_key("SHA256:temp").await.expect("get_key"),
        None
    );
    ops.close().await.expect("close");
}

#[tokio::test]
async fn reopening_an_on_disk_store_preserves_state_and_skips_reapplying_migrations() {
    let dir = tempdir();

    {
        let store = Store::open(&dir).await.expect("open");
        let mut ops = store.ops(true).await.expect("ops");
        ops.tokens()
            .issue("bob", "persisted", None)
            .await
            .expect("issue");
        ops.close().await.expect("close");
    }

    // Reopening re-runs the migration runner, which must be a no-op against
    // already-recorded versions, and the data from the first open must
    // still be there.
    let store = Store::open(&dir).await.expect("reopen");
    let mut ops = store.ops(true).await.expect("ops");
    let tokens = ops.tokens().list("bob", false).await.expect("list");
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].description, "persisted");
    ops.close().await.expect("close");
}

/// Minimal temp-dir helper: this crate's dev-dependencies don't include
/// `tempfile`, so lean on a process-unique path under the OS temp dir,
/// cleaned up on drop.
fn tempdir() -> TempDir {
    let mut path = std::env::temp_dir();
    let unique = format!(
        "vandrare-db-test-{}-{:?}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );
    path.push(unique);
    std::fs::create_dir_all(&path).expect("create temp dir");
    TempDir(path)
}

struct TempDir(std::path::PathBuf);

impl AsRef<std::path::Path> for TempDir {
    fn as_ref(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

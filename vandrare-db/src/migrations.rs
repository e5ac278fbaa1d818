//! Embedded `<major>.<minor>.<patch>-*.sql` migration discovery and
//! application, mirroring `internal/store/migrations.go`'s `embed.FS`-based
//! runner. `include_dir!` stands in for Go's `//go:embed`.

use include_dir::{include_dir, Dir};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::error::StoreError;

static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/migrations");

const SEED_FILE: &str = "0.0.0-seed-migration.sql";

struct MigrationFile {
    name: String,
    version: (u64, u64, u64),
    content: String,
    checksum: [u8; 32],
}

fn parse_version(filename: &str) -> Result<(u64, u64, u64), StoreError> {
    let prefix = filename
        .split('-')
        .next()
        .ok_or_else(|| StoreError::Migration(format!("malformed migration filename {filename}")))?;
    let mut parts = prefix.split('.');
    let mut next = || -> Result<u64, StoreError> {
        parts
            .next()
            .ok_or_else(|| StoreError::Migration(format!("malformed version in {filename}")))?
            .parse::<u64>()
            .map_err(|e| StoreError::Migration(format!("malformed version in {filename}: {e}")))
    };
    let major = next()?;
    let minor = next()?;
    let patch = next()?;
    Ok((major, minor, patch))
}

fn load_migrations() -> Result<Vec<MigrationFile>, StoreError> {
    let mut out = Vec::new();
    for file in MIGRATIONS_DIR.files() {
        let name = file
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::Migration("non-utf8 migration filename".into()))?
            .to_string();
        if name == SEED_FILE {
            continue;
        }
        let version = parse_version(&name)?;
        let content = std::str::from_utf8(file.contents())
            .map_err(|e| StoreError::Migration(format!("non-utf8 migration {name}: {e}")))?
            .to_string();
        let checksum: [u8; 32] = Sha256::digest(content.as_bytes()).into();
        out.push(MigrationFile { name, version, content, checksum });
    }
    out.sort_by_key(|m| m.version);
    Ok(out)
}

async fn already_applied(pool: &SqlitePool, version: (u64, u64, u64)) -> Result<bool, StoreError> {
    let (major, minor, patch) = (version.0 as i64, version.1 as i64, version.2 as i64);
    let row: Option<(i64,)> = sqlx::query_as(
        "select 1 from t_migrations where ver_major = ?1 and ver_minor = ?2 and ver_patch = ?3",
    )
    .bind(major)
    .bind(minor)
    .bind(patch)
    .fetch_optional(pool)
    .await?;
    Ok(row.is_some())
}

async fn apply(pool: &SqlitePool, m: &MigrationFile) -> Result<(), StoreError> {
    let mut tx = pool.begin().await?;
    // Migration SQL files may contain several statements; sqlite accepts a
    // semicolon-separated batch via sqlx's `execute` only for single
    // statements, so split naively on statement boundaries.
    for stmt in m.content.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt).execute(&mut *tx).await?;
    }
    let (major, minor, patch) = (m.version.0 as i64, m.version.1 as i64, m.version.2 as i64);
    sqlx::query(
        "insert into t_migrations(ver_major, ver_minor, ver_patch, filename, content, checksum)
         values (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(major)
    .bind(minor)
    .bind(patch)
    .bind(&m.name)
    .bind(&m.content)
    .bind(&m.checksum[..])
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

/// Apply the unconditional seed file, then every versioned migration not
/// already recorded in `t_migrations`, in ascending version order.
pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    let seed = MIGRATIONS_DIR
        .get_file(SEED_FILE)
        .ok_or_else(|| StoreError::Migration(format!("missing seed file {SEED_FILE}")))?;
    let seed_sql = std::str::from_utf8(seed.contents())
        .map_err(|e| StoreError::Migration(format!("non-utf8 seed file: {e}")))?;
    for stmt in seed_sql.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        sqlx::query(stmt).execute(pool).await?;
    }

    for m in load_migrations()? {
        if already_applied(pool, m.version).await? {
            continue;
        }
        apply(pool, &m)
            .await
            .map_err(|e| StoreError::Migration(format!("applying {}: {e}", m.name)))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn memory_pool() -> SqlitePool {
        let options = SqliteConnectOptions::new().in_memory(true);
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn applying_twice_is_a_noop() {
        let pool = memory_pool().await;
        run(&pool).await.expect("first run");
        run(&pool).await.expect("second run");
        let count: (i64,) = sqlx::query_as("select count(*) from t_migrations")
            .fetch_one(&pool)
            .await
            .expect("count");
        let migrations = load_migrations().expect("load");
        assert_eq!(count.0 as usize, migrations.len());
    }

    #[test]
    fn parses_semver_prefix() {
        assert_eq!(parse_version("0.1.0-kv-and-tokens.sql").unwrap(), (0, 1, 0));
    }
}

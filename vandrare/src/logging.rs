//! `tracing-subscriber` setup (SPEC_FULL.md §B): an offset-aware `fmt`
//! layer plus `EnvFilter`, trimmed from `warpgate/src/logging.rs` down to
//! the single console sink this gateway needs — no JSON/socket/database
//! logger layers, since there is no admin UI or database-backed audit log
//! in this workspace.

use anyhow::Result;
use time::{format_description, UtcOffset};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::EnvFilter;

pub fn init_logging(debug: u8) -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        match debug {
            0 => std::env::set_var("RUST_LOG", "info"),
            1 => std::env::set_var("RUST_LOG", "vandrare=debug"),
            _ => std::env::set_var("RUST_LOG", "debug"),
        }
    }

    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description::parse("[day].[month].[year] [hour]:[minute]:[second]")
            .expect("static timestamp format is valid"),
    );

    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| anyhow::anyhow!(error))?;
    Ok(())
}

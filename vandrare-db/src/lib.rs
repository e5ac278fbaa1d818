//! Persistence store, key database and token database.
//! One crate because all three share a single SQLite pool and
//! migration set, mirroring `internal/store` in the Go original.

pub mod error;
pub mod json;
pub mod keydb;
pub mod kv;
mod migrations;
pub mod store;
pub mod tokens;

pub use error::StoreError;
pub use keydb::{AuthResult, KeyConfig, KeyRegistration, PermissionAction, PermissionRule};
pub use store::{Ops, Store, TxClock};
pub use tokens::TokenInfo;

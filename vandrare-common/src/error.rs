/// Common plumbing errors shared by every crate in the workspace.
///
/// Crate-specific errors (`StoreError`, `CaError`, `SshError`, ...) wrap this
/// type via `#[from]` rather than the other way around, so that
/// `vandrare-common` never depends back on its own dependents.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("deserialization failed: {0}")]
    DeserializeJson(#[from] serde_json::Error),
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid duration: {0}")]
    InvalidDuration(#[from] humantime::DurationError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
    #[error("inconsistent state: {0}")]
    InconsistentState(String),
}

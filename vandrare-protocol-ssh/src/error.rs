/// SSH-frontend-specific errors, converting into the workspace-wide
/// `GatewayError` via `#[from]` where they bubble up past this crate,
/// matching the layering SPEC_FULL.md §B describes for `WarpgateError`.
#[derive(thiserror::Error, Debug)]
pub enum SshError {
    #[error("store error: {0}")]
    Store(#[from] vandrare_db::StoreError),
    #[error(transparent)]
    Ca(#[from] vandrare_core::CaError),
    #[error(transparent)]
    Admin(#[from] vandrare_core::AdminError),
    #[error(transparent)]
    Offer(#[from] vandrare_core::OfferError),
    #[error("key parsing failed: {0}")]
    KeyParse(String),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("SSH transport: {0}")]
    Russh(#[from] russh::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<SshError> for vandrare_common::GatewayError {
    fn from(err: SshError) -> Self {
        vandrare_common::GatewayError::Other(err.into())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CaError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("certificate construction failed: {0}")]
    CertBuild(String),
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("CA seed must be exactly 32 bytes, got {0}")]
    BadSeedLength(usize),
}

#[derive(thiserror::Error, Debug)]
pub enum OfferError {
    #[error("no workers registered for this endpoint")]
    NoWorkers,
}

#[derive(thiserror::Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Store(#[from] vandrare_db::StoreError),
    #[error("script error: {0}")]
    Script(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("operation already failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Common(#[from] vandrare_common::GatewayError),
    #[error("key not found")]
    NotFound,
    #[error("token hashing failed: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("invalid token")]
    InvalidToken,
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

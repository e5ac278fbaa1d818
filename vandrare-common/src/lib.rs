pub mod config;
pub mod domains;
pub mod error;
pub mod helpers;
pub mod types;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use types::{ListenEndpoint, Secret};

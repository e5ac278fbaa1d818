pub mod listen_endpoint;
pub mod secret;

pub use listen_endpoint::ListenEndpoint;
pub use secret::Secret;

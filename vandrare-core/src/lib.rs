pub mod admin;
pub mod ca;
pub mod error;
pub mod known_hosts;
pub mod registry;
pub mod services;

pub use ca::CaKey;
pub use error::{AdminError, CaError, OfferError};
pub use registry::{ConnData, EndpointRegistry, Worker};
pub use services::Services;

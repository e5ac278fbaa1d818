//! The SSH frontend: host key issuance, the per-connection `Handler` state
//! machine, the reverse-tunnel bridge, and the admin
//! session command grammar. Grounded throughout on
//! `warpgate-protocol-ssh`, trimmed to a gateway with no target selection,
//! no outbound SSH client, and no SFTP/SCP file transfer.

pub mod admin_session;
pub mod cleanup;
pub mod common;
pub mod error;
pub mod forward;
pub mod keys;
mod server;
mod state;

pub use error::SshError;
pub use server::run_server;
pub use state::GatewayState;

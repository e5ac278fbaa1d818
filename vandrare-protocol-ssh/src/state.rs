//! Per-process SSH frontend state, grounded on `warpgate-core/src/
//! services.rs`'s `Services` aggregation pattern but scoped to what
//! one SSH listener needs: the shared [`vandrare_core::Services`], the
//! endpoint registry/load balancer (kept here rather than in
//! `vandrare-core` since its worker payload is `russh`-shaped, per that
//! crate's own doc comment), and the admin public key loaded once at
//! startup.

use std::sync::Arc;

use russh::keys::PublicKey;
use vandrare_core::{ConnData, EndpointRegistry, Services};

use crate::common::BoxedIo;

pub struct GatewayState {
    pub services: Services,
    pub registry: Arc<EndpointRegistry<ConnData<BoxedIo>>>,
    pub admin_key: PublicKey,
}

impl GatewayState {
    pub fn new(services: Services, admin_key: PublicKey) -> Arc<Self> {
        Arc::new(Self {
            services,
            registry: Arc::new(EndpointRegistry::new()),
            admin_key,
        })
    }
}

use std::sync::Arc;

use rand::RngCore;

use app_api::AppContext;

use crate::middleware::{AdminGate, StaticTokenGate};

#[derive(Clone)]
pub struct HttpState {
    pub context: AppContext,
    pub admin_gate: Arc<dyn AdminGate>,
}

impl HttpState {
    pub fn new(context: AppContext, admin_gate: Arc<dyn AdminGate>) -> Self {
        Self {
            context,
            admin_gate,
        }
    }

    /// Admin access by shared token in the `x-metering-admin-token` header.
    pub fn with_admin_token(context: AppContext, token: String) -> Self {
        Self::new(context, Arc::new(StaticTokenGate::new(token)))
    }
}

pub fn generate_admin_token() -> String {
    let mut bytes = [0u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

use std::sync::Arc;

use fabric::prelude::*;
use ragflow_core::RagError;
use ragflow_identity::KeyRing;
use tokio::sync::RwLock;

use crate::state::AppState;

/// Publishes the current signing key set so resource servers that only trust
/// this service's tokens (rather than calling back into `/auth/validate`)
/// can verify signatures themselves. Unauthenticated by design, like any
/// JWKS endpoint.
#[derive(Controller)]
#[controller(path = "/.well-known", state = AppState)]
pub struct JwksController {
    #[inject]
    key_ring: Arc<RwLock<KeyRing>>,
}

#[routes]
impl JwksController {
    #[get("/jwks.json")]
    async fn jwks(&self) -> Result<Json<serde_json::Value>, RagError> {
        let ring = self.key_ring.read().await;
        let value = serde_json::to_value(ring.jwks_json()).map_err(|e| RagError::Internal(e.to_string()))?;
        Ok(Json(value))
    }
}

use fabric::prelude::*;
use ragflow_core::RagError;
use ragflow_identity::UserView;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
    tenant_id: Uuid,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    token: String,
}

#[derive(Controller)]
#[controller(path = "/api/v1/auth", state = AppState)]
pub struct AuthController {
    #[inject]
    identity: std::sync::Arc<ragflow_identity::IdentityService>,
}

#[routes]
impl AuthController {
    #[post("/register")]
    async fn register(&self, Json(body): Json<RegisterRequest>) -> Result<(StatusCode, Json<UserView>), RagError> {
        let user = self.identity.register(body.email, body.password, body.tenant_id).await?;
        Ok((StatusCode::CREATED, Json(user)))
    }

    #[post("/login")]
    async fn login(&self, Json(body): Json<LoginRequest>) -> Result<Json<serde_json::Value>, RagError> {
        let result = self.identity.login(&body.email, body.password).await?;
        Ok(Json(json!({
            "access_token": result.access_token,
            "refresh_token": result.refresh_token,
            "expires_in": result.expires_in,
            "user": result.user,
        })))
    }

    #[post("/refresh")]
    async fn refresh(&self, Json(body): Json<RefreshRequest>) -> Result<Json<serde_json::Value>, RagError> {
        let result = self.identity.refresh(&body.refresh_token).await?;
        Ok(Json(json!({
            "access_token": result.access_token,
            "refresh_token": result.refresh_token,
            "expires_in": result.expires_in,
            "user": result.user,
        })))
    }

    #[post("/validate")]
    async fn validate(&self, Json(body): Json<ValidateRequest>) -> Result<Json<serde_json::Value>, RagError> {
        let result = self.identity.validate(&body.token).await?;
        Ok(Json(json!({
            "valid": true,
            "claims": {
                "user_id": result.user_id,
                "tenant_id": result.tenant_id,
                "role": result.role,
            },
        })))
    }
}

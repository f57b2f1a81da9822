// Public authentication endpoints: session issuance and password recovery.

use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::is_development;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::auth_service::AuthService;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub usuario: String,
    pub password: String,
    pub codigo_totp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub usuario: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub usuario: String,
    pub token: String,
    pub password: String,
}

/// POST /auth/login - Authenticate and receive a session token
///
/// Accounts with TOTP enabled must supply `codigo_totp`; its absence is the
/// distinguished `MFA_REQUIRED` response, not a credentials failure.
pub async fn login(Json(payload): Json<LoginRequest>) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    let outcome = service
        .login(
            &payload.usuario,
            &payload.password,
            payload.codigo_totp.as_deref(),
        )
        .await?;

    Ok(ApiResponse::success(json!({
        "token": outcome.token,
        "usuario": {
            "id": outcome.user.id,
            "usuario": outcome.user.usuario,
            "nombre": outcome.user.nombre,
            "rol": outcome.user.rol,
            "area_id": outcome.user.area_id,
        },
        "expires_in": outcome.expires_in,
    })))
}

/// POST /auth/password/olvido - Begin a password reset
///
/// Answers identically whether or not the account exists. The token reaches
/// the user out of band; development mode echoes it for manual testing.
pub async fn forgot_password(Json(payload): Json<ForgotPasswordRequest>) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    let token = service.forgot_password(&payload.usuario).await?;

    let mut body = json!({
        "mensaje": "Si la cuenta existe, se enviaron instrucciones de restablecimiento"
    });
    if is_development!() {
        if let Some(token) = token {
            body["token"] = json!(token);
        }
    }

    Ok(ApiResponse::success(body))
}

/// POST /auth/password/restablecer - Redeem a reset token
pub async fn reset_password(Json(payload): Json<ResetPasswordRequest>) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    service
        .reset_password(&payload.usuario, &payload.token, &payload.password)
        .await?;

    Ok(ApiResponse::success(json!({
        "mensaje": "Contrasena actualizada"
    })))
}

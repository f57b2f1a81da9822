// Session self-service for authenticated users: identity echo and TOTP
// enrollment.

use axum::{extract::Extension, response::Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::auth_service::AuthService;

#[derive(Debug, Deserialize)]
pub struct TotpCodeRequest {
    pub codigo: String,
}

/// GET /api/auth/quien-soy - Echo the caller's session claims
pub async fn quien_soy(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    Ok(ApiResponse::success(json!({
        "id": auth.user_id,
        "usuario": auth.usuario,
        "nombre": auth.nombre,
        "rol": auth.rol,
        "area_id": auth.area,
    })))
}

/// POST /api/auth/totp/configurar - Generate a TOTP secret for enrollment
///
/// The secret is stored unverified; [`totp_activar`] flips it on once the
/// authenticator app produces a valid code.
pub async fn totp_configurar(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    let (secret_base32, otpauth_url) = service.totp_setup(auth.user_id, &auth.usuario).await?;

    Ok(ApiResponse::success(json!({
        "secret_base32": secret_base32,
        "otpauth_url": otpauth_url,
    })))
}

/// POST /api/auth/totp/activar - Finish enrollment with a valid code
pub async fn totp_activar(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<TotpCodeRequest>,
) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    service.totp_enable(auth.user_id, &payload.codigo).await?;

    Ok(ApiResponse::success(json!({ "totp_enabled": true })))
}

/// DELETE /api/auth/totp - Disable the second factor after verifying a code
pub async fn totp_eliminar(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<TotpCodeRequest>,
) -> ApiResult<Value> {
    let service = AuthService::new().await?;
    service.totp_disable(auth.user_id, &payload.codigo).await?;

    Ok(ApiResponse::success(json!({ "totp_enabled": false })))
}

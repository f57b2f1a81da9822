// Administrator endpoints. The role gate on this route group keeps every
// other role out, and the service refuses to mint administrator accounts.

use axum::{
    extract::Path,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::middleware::{ApiResponse, ApiResult};
use crate::services::user_service::{UserIntake, UserService, UserUpdate};

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

/// GET /api/admin/usuarios - Active accounts (administrators excluded)
pub async fn list() -> ApiResult<Value> {
    let service = UserService::new().await?;
    let users = service.list().await?;
    Ok(ApiResponse::success(json!(users)))
}

/// POST /api/admin/usuarios - Create an account with role 1-3
pub async fn create(Json(intake): Json<UserIntake>) -> ApiResult<Value> {
    let service = UserService::new().await?;
    let user = service.create(intake).await?;
    Ok(ApiResponse::created(json!(user)))
}

/// PUT /api/admin/usuarios/:id - Update name, role, or area
pub async fn update(Path(id): Path<Uuid>, Json(update): Json<UserUpdate>) -> ApiResult<Value> {
    let service = UserService::new().await?;
    let user = service.update(id, update).await?;
    Ok(ApiResponse::success(json!(user)))
}

/// DELETE /api/admin/usuarios/:id - Retire an account (soft delete)
pub async fn delete(Path(id): Path<Uuid>) -> ApiResult<Value> {
    let service = UserService::new().await?;
    service.delete(id).await?;
    Ok(ApiResponse::success(json!({ "eliminado": true })))
}

/// POST /api/admin/usuarios/:id/password - Force a password change
pub async fn set_password(
    Path(id): Path<Uuid>,
    Json(payload): Json<SetPasswordRequest>,
) -> ApiResult<Value> {
    let service = UserService::new().await?;
    service.set_password(id, &payload.password).await?;
    Ok(ApiResponse::success(json!({ "actualizado": true })))
}

// Case endpoints: draft CRUD plus the lifecycle transitions. Every state
// change goes through CaseService::transition and therefore through the
// lifecycle engine's table.

use axum::{
    extract::{Extension, Path},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;
use crate::lifecycle::CaseEvent;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::case_service::{CaseIntake, CaseService};
use crate::services::victim_service::{VictimIntake, VictimService};

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    /// Existing victim, or...
    pub victima_id: Option<Uuid>,
    /// ...a new one registered inline with the case
    pub victima: Option<VictimIntake>,
    #[serde(flatten)]
    pub intake: CaseIntake,
}

#[derive(Debug, Deserialize)]
pub struct DevolverRequest {
    pub motivo: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AprobarRequest {
    /// Route the approval to the historical `enviado` state
    #[serde(default)]
    pub legado: bool,
}

/// POST /api/expedientes - Open a draft case for a victim
///
/// When the victim already has an open case the existing record is returned
/// with `reutilizado: true` and no new id is minted.
pub async fn create(
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateCaseRequest>,
) -> ApiResult<Value> {
    let victima_id = match (payload.victima_id, payload.victima) {
        (Some(id), _) => id,
        (None, Some(intake)) => VictimService::new().await?.create(intake).await?.id,
        (None, None) => {
            return Err(ApiError::validation_error(
                "Debe indicar victima_id o los datos de una nueva victima",
                None,
            ))
        }
    };

    let service = CaseService::new().await?;
    let (case, reused) = service.create(&auth, victima_id, payload.intake).await?;

    let body = json!({ "expediente": case, "reutilizado": reused });
    if reused {
        Ok(ApiResponse::success(body))
    } else {
        Ok(ApiResponse::created(body))
    }
}

/// GET /api/expedientes - Work queue for the caller's area
pub async fn list(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let service = CaseService::new().await?;
    let cases = service.list(&auth).await?;
    Ok(ApiResponse::success(json!(cases)))
}

/// GET /api/expedientes/:id - Full detail with children and audit trail
pub async fn get(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let service = CaseService::new().await?;
    let detail = service.detail(&auth, id).await?;
    Ok(ApiResponse::success(json!(detail)))
}

/// PUT /api/expedientes/:id - Edit intake fields while in draft
pub async fn update(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(intake): Json<CaseIntake>,
) -> ApiResult<Value> {
    let service = CaseService::new().await?;
    let case = service.update_draft(&auth, id, intake).await?;
    Ok(ApiResponse::success(json!(case)))
}

/// DELETE /api/expedientes/:id - Remove a non-terminal case
pub async fn delete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let service = CaseService::new().await?;
    service.delete(&auth, id).await?;
    Ok(ApiResponse::success(json!({ "eliminado": true })))
}

/// GET /api/expedientes/:id/historial - Audit trail, oldest to newest
pub async fn history(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    let service = CaseService::new().await?;
    let entries = service.history(&auth, id).await?;
    Ok(ApiResponse::success(json!(entries)))
}

/// POST /api/expedientes/:id/enviar-revision - Submit a draft for review
pub async fn submit(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    transition(auth, id, CaseEvent::Enviar, None).await
}

/// POST /api/expedientes/:id/aprobar - Approve a submitted case
pub async fn approve(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    payload: Option<Json<AprobarRequest>>,
) -> ApiResult<Value> {
    let legado = payload.map(|Json(p)| p.legado).unwrap_or(false);
    transition(auth, id, CaseEvent::Aprobar { legado }, None).await
}

/// POST /api/expedientes/:id/devolver - Return a submitted case to draft
///
/// The motive becomes the audit entry's `detalle` and is what the operative
/// sees as the rejection reason.
pub async fn give_back(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<DevolverRequest>,
) -> ApiResult<Value> {
    transition(auth, id, CaseEvent::Devolver, Some(payload.motivo.as_str())).await
}

/// POST /api/expedientes/:id/iniciar - Start work on an approved case
pub async fn start_work(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    transition(auth, id, CaseEvent::Iniciar, None).await
}

/// POST /api/expedientes/:id/completar - Close an in-progress case
pub async fn complete(
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Value> {
    transition(auth, id, CaseEvent::Completar, None).await
}

async fn transition(
    auth: AuthUser,
    id: i64,
    event: CaseEvent,
    motivo: Option<&str>,
) -> ApiResult<Value> {
    let service = CaseService::new().await?;
    let case = service.transition(&auth, id, event, motivo).await?;
    Ok(ApiResponse::success(json!(case)))
}

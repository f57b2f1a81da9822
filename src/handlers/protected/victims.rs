use axum::{
    extract::{Path, Query},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::victim_service::{VictimIntake, VictimService};

#[derive(Debug, Deserialize)]
pub struct VictimQuery {
    /// Free-text filter over name and document
    pub q: Option<String>,
    pub limit: Option<i64>,
}

/// POST /api/victimas - Register a victim
pub async fn create(Json(intake): Json<VictimIntake>) -> ApiResult<Value> {
    let service = VictimService::new().await?;
    let victima = service.create(intake).await?;
    Ok(ApiResponse::created(json!(victima)))
}

/// GET /api/victimas - Search victims by name or document
pub async fn list(Query(query): Query<VictimQuery>) -> ApiResult<Value> {
    let api = &config::config().api;
    let limit = query
        .limit
        .unwrap_or(api.default_page_size)
        .clamp(1, api.max_page_size);

    let service = VictimService::new().await?;
    let victimas = service.search(query.q.as_deref(), limit).await?;
    Ok(ApiResponse::success(json!(victimas)))
}

/// GET /api/victimas/:id
pub async fn get(Path(id): Path<Uuid>) -> ApiResult<Value> {
    let service = VictimService::new().await?;
    let victima = service.get(id).await?;
    Ok(ApiResponse::success(json!(victima)))
}

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::report_service::ReportService;

/// GET /api/reportes/oficial - Completed cases with the support total
pub async fn official(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let service = ReportService::new().await?;
    let report = service.official(&auth).await?;
    Ok(ApiResponse::success(json!(report)))
}

/// GET /api/reportes/oficial/csv - Same rows as a CSV attachment
pub async fn official_csv(
    Extension(auth): Extension<AuthUser>,
) -> Result<Response, crate::error::ApiError> {
    let service = ReportService::new().await?;
    let report = service.official(&auth).await?;
    let csv = ReportService::official_csv(&report);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"reporte_oficial.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

/// GET /api/reportes/operativo - All-state preview with per-state counts
pub async fn preview(Extension(auth): Extension<AuthUser>) -> ApiResult<Value> {
    let service = ReportService::new().await?;
    let report = service.preview(&auth).await?;
    Ok(ApiResponse::success(json!(report)))
}

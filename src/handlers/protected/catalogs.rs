use axum::extract::Path;
use serde_json::{json, Value};

use crate::database::manager::DatabaseManager;
use crate::database::models::catalog::{is_valid_catalogo, CatalogoItem};
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/catalogos/:nombre - Read-only reference rows for forms
///
/// The name is matched against the fixed catalog list before it reaches
/// SQL; unknown names are a plain 404.
pub async fn get(Path(nombre): Path<String>) -> ApiResult<Value> {
    if !is_valid_catalogo(&nombre) {
        return Err(ApiError::not_found(format!(
            "Catalogo '{}' no existe",
            nombre
        )));
    }

    let pool = DatabaseManager::pool().await.map_err(ApiError::from)?;
    let sql = format!("SELECT id, nombre FROM \"{}\" ORDER BY id", nombre);
    let items: Vec<CatalogoItem> = sqlx::query_as(&sql).fetch_all(&pool).await?;

    Ok(ApiResponse::success(json!(items)))
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One state transition in a case's audit trail. Append-only: no code path
/// updates or deletes these rows. `es_devolucion_coordinacion` is the only
/// signal that an entry is a coordination return; consumers must not infer
/// it from `detalle` text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistorialEntry {
    pub id: i64,
    pub expediente_id: i64,
    pub estado_desde: String,
    pub estado_hasta: String,
    pub detalle: Option<String>,
    pub es_devolucion_coordinacion: bool,
    pub usuario_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

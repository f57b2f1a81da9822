use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::lifecycle::CaseState;

/// One victim-service intervention record. `estado` is stored as text and
/// constrained by the database to the six lifecycle values; [`Expediente::
/// estado`] gives the typed view. Intake fields and the catalog-id arrays
/// are only writable while the case is in draft.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Expediente {
    pub id: i64,
    pub victima_id: Uuid,
    pub area_id: i32,
    #[sqlx(rename = "estado")]
    #[serde(rename = "estado")]
    pub estado_raw: String,
    pub motivo: Option<String>,
    pub residencia: Option<String>,
    pub telefono_contacto: Option<String>,
    pub observaciones_riesgo: Option<String>,
    pub apoyo_economico: Option<Decimal>,
    pub tipos_violencia: Vec<i32>,
    pub medios_agresion: Vec<i32>,
    pub situaciones_riesgo: Vec<i32>,
    pub derivaciones: Vec<i32>,
    pub creado_por: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expediente {
    /// Typed state; the column's CHECK constraint makes the fallback
    /// unreachable in practice
    pub fn estado(&self) -> CaseState {
        CaseState::parse(&self.estado_raw).unwrap_or(CaseState::Borrador)
    }
}

/// Aggressor record owned by one case, replaced wholesale on draft edits
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agresor {
    pub id: i64,
    pub expediente_id: i64,
    pub nombre: String,
    pub alias: Option<String>,
    pub relacion_victima: Option<String>,
    pub edad: Option<i32>,
}

/// Child-of-victim record owned by one case
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Hijo {
    pub id: i64,
    pub expediente_id: i64,
    pub nombre: String,
    pub edad: Option<i32>,
    pub escolarizado: Option<bool>,
}

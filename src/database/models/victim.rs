use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Victima {
    pub id: Uuid,
    pub nombre: String,
    pub apellidos: String,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub documento: Option<String>,
    pub municipio_id: Option<i32>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

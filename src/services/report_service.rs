//! Reporting over case records. The official export consumes only
//! completed cases; the operational preview sees every state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::middleware::AuthUser;
use crate::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Este rol no tiene acceso a los reportes")]
    Forbidden,
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// One completed case in the official export
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OfficialRow {
    pub expediente_id: i64,
    pub area_id: i32,
    pub area_nombre: String,
    pub victima_nombre: String,
    pub completado_en: DateTime<Utc>,
    pub apoyo_economico: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct OfficialReport {
    pub filas: Vec<OfficialRow>,
    pub total_apoyo: Decimal,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PreviewRow {
    pub expediente_id: i64,
    pub area_id: i32,
    pub estado: String,
    pub victima_nombre: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StateCount {
    pub estado: String,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct PreviewReport {
    pub filas: Vec<PreviewRow>,
    pub por_estado: Vec<StateCount>,
}

pub struct ReportService {
    pool: PgPool,
}

impl ReportService {
    pub async fn new() -> Result<Self, ReportError> {
        let pool = DatabaseManager::pool().await?;
        Ok(Self { pool })
    }

    /// Area scope for the caller: the general coordination reads every
    /// area, area coordinators read their own, nobody else reads reports.
    fn scope(actor: &AuthUser) -> Result<Option<i32>, ReportError> {
        match actor.rol {
            Role::CoordinadorGeneral => Ok(None),
            Role::CoordinadorArea => actor.area.map(Some).ok_or(ReportError::Forbidden),
            _ => Err(ReportError::Forbidden),
        }
    }

    pub async fn official(&self, actor: &AuthUser) -> Result<OfficialReport, ReportError> {
        let area = Self::scope(actor)?;

        let filas: Vec<OfficialRow> = sqlx::query_as(
            r#"
            SELECT e.id AS expediente_id, e.area_id, a.nombre AS area_nombre,
                   v.nombre || ' ' || v.apellidos AS victima_nombre,
                   e.updated_at AS completado_en,
                   e.apoyo_economico
            FROM expedientes e
            JOIN victimas v ON v.id = e.victima_id
            JOIN areas a ON a.id = e.area_id
            WHERE e.estado = 'completado'
              AND ($1::int IS NULL OR e.area_id = $1)
            ORDER BY e.updated_at DESC, e.id DESC
            "#,
        )
        .bind(area)
        .fetch_all(&self.pool)
        .await?;

        let total_apoyo = filas
            .iter()
            .filter_map(|f| f.apoyo_economico)
            .sum::<Decimal>();

        Ok(OfficialReport { filas, total_apoyo })
    }

    /// Render the official report as CSV. Layout only; styling concerns
    /// belong to whoever opens the file.
    pub fn official_csv(report: &OfficialReport) -> String {
        let mut out = String::from("expediente,area,victima,completado,apoyo_economico\n");
        for fila in &report.filas {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                fila.expediente_id,
                csv_field(&fila.area_nombre),
                csv_field(&fila.victima_nombre),
                fila.completado_en.format("%Y-%m-%d"),
                fila.apoyo_economico
                    .map(|d| d.to_string())
                    .unwrap_or_default(),
            ));
        }
        out.push_str(&format!(",,,total,{}\n", report.total_apoyo));
        out
    }

    pub async fn preview(&self, actor: &AuthUser) -> Result<PreviewReport, ReportError> {
        let area = Self::scope(actor)?;

        let filas: Vec<PreviewRow> = sqlx::query_as(
            r#"
            SELECT e.id AS expediente_id, e.area_id, e.estado,
                   v.nombre || ' ' || v.apellidos AS victima_nombre,
                   e.updated_at
            FROM expedientes e
            JOIN victimas v ON v.id = e.victima_id
            WHERE ($1::int IS NULL OR e.area_id = $1)
            ORDER BY e.updated_at DESC, e.id DESC
            "#,
        )
        .bind(area)
        .fetch_all(&self.pool)
        .await?;

        let por_estado: Vec<StateCount> = sqlx::query_as(
            r#"
            SELECT estado, COUNT(*) AS total
            FROM expedientes
            WHERE ($1::int IS NULL OR area_id = $1)
            GROUP BY estado
            ORDER BY estado
            "#,
        )
        .bind(area)
        .fetch_all(&self.pool)
        .await?;

        Ok(PreviewReport { filas, por_estado })
    }
}

/// Quote a CSV field when it carries a delimiter or quote
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn actor(rol: Role, area: Option<i32>) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            usuario: "prueba".into(),
            nombre: "Prueba".into(),
            rol,
            area,
        }
    }

    #[test]
    fn scope_per_role() {
        assert_eq!(
            ReportService::scope(&actor(Role::CoordinadorGeneral, None)).unwrap(),
            None
        );
        assert_eq!(
            ReportService::scope(&actor(Role::CoordinadorArea, Some(3))).unwrap(),
            Some(3)
        );
        assert!(ReportService::scope(&actor(Role::Operativo, Some(3))).is_err());
        assert!(ReportService::scope(&actor(Role::Administrador, None)).is_err());
    }

    #[test]
    fn csv_escapes_delimiters() {
        assert_eq!(csv_field("Perez, Ana"), "\"Perez, Ana\"");
        assert_eq!(csv_field("sin comas"), "sin comas");
        assert_eq!(csv_field("di\"jo"), "\"di\"\"jo\"");
    }

    #[test]
    fn csv_layout_includes_total_row() {
        let report = OfficialReport {
            filas: vec![],
            total_apoyo: Decimal::new(1500, 2),
        };
        let csv = ReportService::official_csv(&report);
        assert!(csv.starts_with("expediente,area,victima,completado,apoyo_economico\n"));
        assert!(csv.ends_with(",,,total,15.00\n"));
    }
}

//! Case operations: the only code that touches `expedientes.estado`, always
//! through the lifecycle engine's transition table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::case::{Agresor, Expediente, Hijo};
use crate::database::models::history::HistorialEntry;
use crate::database::models::victim::Victima;
use crate::lifecycle::{self, CaseEvent, CaseState, LifecycleError};
use crate::middleware::AuthUser;
use crate::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum CaseError {
    #[error("Expediente no encontrado")]
    NotFound,
    #[error("Victima no encontrada")]
    VictimNotFound,
    #[error("El expediente ya no esta en borrador y no puede editarse")]
    NotEditable,
    #[error("Un expediente completado no puede eliminarse")]
    NotDeletable,
    #[error("El expediente fue modificado por otra operacion; recargue e intente de nuevo")]
    Stale,
    #[error("Debe indicar el motivo de la devolucion")]
    MissingMotivo,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Intake payload for creating or editing a draft case
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseIntake {
    pub motivo: Option<String>,
    pub residencia: Option<String>,
    pub telefono_contacto: Option<String>,
    pub observaciones_riesgo: Option<String>,
    pub apoyo_economico: Option<rust_decimal::Decimal>,
    #[serde(default)]
    pub tipos_violencia: Vec<i32>,
    #[serde(default)]
    pub medios_agresion: Vec<i32>,
    #[serde(default)]
    pub situaciones_riesgo: Vec<i32>,
    #[serde(default)]
    pub derivaciones: Vec<i32>,
    #[serde(default)]
    pub agresores: Vec<AgresorIntake>,
    #[serde(default)]
    pub hijos: Vec<HijoIntake>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgresorIntake {
    pub nombre: String,
    pub alias: Option<String>,
    pub relacion_victima: Option<String>,
    pub edad: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HijoIntake {
    pub nombre: String,
    pub edad: Option<i32>,
    pub escolarizado: Option<bool>,
}

/// Listing row for the area work queue. `motivo_devolucion` carries the
/// latest coordination-return reason while the case sits back in draft.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CaseListItem {
    pub id: i64,
    pub victima_id: Uuid,
    pub victima_nombre: String,
    pub area_id: i32,
    pub estado: String,
    pub motivo_devolucion: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CaseDetail {
    pub expediente: Expediente,
    pub victima: Victima,
    pub agresores: Vec<Agresor>,
    pub hijos: Vec<Hijo>,
    pub historial: Vec<HistorialEntry>,
    pub motivo_devolucion: Option<String>,
}

pub struct CaseService {
    pool: PgPool,
}

impl CaseService {
    pub async fn new() -> Result<Self, CaseError> {
        let pool = DatabaseManager::pool().await?;
        Ok(Self { pool })
    }

    /// Create a case in draft for a victim, or hand back the victim's
    /// existing open case. The partial unique index over open cases makes
    /// the insert-or-reuse a single atomic step; two concurrent creates
    /// cannot mint two open cases.
    pub async fn create(
        &self,
        actor: &AuthUser,
        victima_id: Uuid,
        intake: CaseIntake,
    ) -> Result<(Expediente, bool), CaseError> {
        if actor.rol != Role::Operativo {
            return Err(CaseError::Forbidden(
                "Solo el personal operativo puede crear expedientes".into(),
            ));
        }
        let area_id = actor
            .area
            .ok_or_else(|| CaseError::Forbidden("Su cuenta no tiene area asignada".into()))?;

        let victim_exists: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM victimas WHERE id = $1")
                .bind(victima_id)
                .fetch_optional(&self.pool)
                .await?;
        if victim_exists.is_none() {
            return Err(CaseError::VictimNotFound);
        }

        let mut tx = self.pool.begin().await?;

        let inserted: Option<Expediente> = sqlx::query_as(
            r#"
            INSERT INTO expedientes
                (victima_id, area_id, estado, motivo, residencia, telefono_contacto,
                 observaciones_riesgo, apoyo_economico, tipos_violencia, medios_agresion,
                 situaciones_riesgo, derivaciones, creado_por)
            VALUES ($1, $2, 'borrador', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (victima_id) WHERE estado <> 'completado' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(victima_id)
        .bind(area_id)
        .bind(&intake.motivo)
        .bind(&intake.residencia)
        .bind(&intake.telefono_contacto)
        .bind(&intake.observaciones_riesgo)
        .bind(intake.apoyo_economico)
        .bind(&intake.tipos_violencia)
        .bind(&intake.medios_agresion)
        .bind(&intake.situaciones_riesgo)
        .bind(&intake.derivaciones)
        .bind(actor.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (case, reused) = match inserted {
            Some(case) => {
                Self::replace_children(&mut tx, case.id, &intake.agresores, &intake.hijos).await?;
                (case, false)
            }
            None => {
                // Another open case already exists for this victim; reuse it
                // untouched instead of minting a new id.
                let existing: Expediente = sqlx::query_as(
                    "SELECT * FROM expedientes WHERE victima_id = $1 AND estado <> 'completado'",
                )
                .bind(victima_id)
                .fetch_one(&mut *tx)
                .await?;

                if existing.area_id != area_id {
                    return Err(CaseError::Forbidden(
                        "La victima tiene un expediente abierto en otra area".into(),
                    ));
                }
                (existing, true)
            }
        };

        tx.commit().await?;

        tracing::info!(
            "expediente {} {} para victima {} por '{}'",
            case.id,
            if reused { "reutilizado" } else { "creado" },
            victima_id,
            actor.usuario
        );
        Ok((case, reused))
    }

    /// Work queue for the caller's area, newest first
    pub async fn list(&self, actor: &AuthUser) -> Result<Vec<CaseListItem>, CaseError> {
        let area_id = self.require_area(actor)?;

        let rows: Vec<CaseListItem> = sqlx::query_as(
            r#"
            SELECT e.id, e.victima_id,
                   v.nombre || ' ' || v.apellidos AS victima_nombre,
                   e.area_id, e.estado,
                   CASE WHEN e.estado = 'borrador' THEN h.detalle END AS motivo_devolucion,
                   e.created_at, e.updated_at
            FROM expedientes e
            JOIN victimas v ON v.id = e.victima_id
            LEFT JOIN LATERAL (
                SELECT detalle
                FROM historial
                WHERE expediente_id = e.id
                  AND es_devolucion_coordinacion
                  AND estado_hasta = 'borrador'
                ORDER BY id DESC
                LIMIT 1
            ) h ON true
            WHERE e.area_id = $1
            ORDER BY e.id DESC
            "#,
        )
        .bind(area_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn detail(&self, actor: &AuthUser, id: i64) -> Result<CaseDetail, CaseError> {
        let case = self.load_for(actor, id).await?;

        let victima: Victima = sqlx::query_as("SELECT * FROM victimas WHERE id = $1")
            .bind(case.victima_id)
            .fetch_one(&self.pool)
            .await?;
        let agresores: Vec<Agresor> =
            sqlx::query_as("SELECT * FROM agresores WHERE expediente_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        let hijos: Vec<Hijo> =
            sqlx::query_as("SELECT * FROM hijos WHERE expediente_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        let historial = self.trail(id).await?;

        let motivo_devolucion = if case.estado() == CaseState::Borrador {
            lifecycle::latest_return_reason(&historial).map(|s| s.to_string())
        } else {
            None
        };

        Ok(CaseDetail {
            expediente: case,
            victima,
            agresores,
            hijos,
            historial,
            motivo_devolucion,
        })
    }

    /// Audit trail, oldest to newest
    pub async fn history(&self, actor: &AuthUser, id: i64) -> Result<Vec<HistorialEntry>, CaseError> {
        self.load_for(actor, id).await?;
        self.trail(id).await
    }

    /// Draft-only edit of intake fields and child records. Reviewed and
    /// later states stay frozen.
    pub async fn update_draft(
        &self,
        actor: &AuthUser,
        id: i64,
        intake: CaseIntake,
    ) -> Result<Expediente, CaseError> {
        if actor.rol != Role::Operativo {
            return Err(CaseError::Forbidden(
                "Solo el personal operativo edita borradores".into(),
            ));
        }
        let case = self.load_for(actor, id).await?;
        if !case.estado().editable() {
            return Err(CaseError::NotEditable);
        }

        let mut tx = self.pool.begin().await?;

        // Conditional on the draft state so a concurrent submit cannot be
        // overwritten; zero rows here means we lost that race.
        let updated: Option<Expediente> = sqlx::query_as(
            r#"
            UPDATE expedientes
            SET motivo = $2, residencia = $3, telefono_contacto = $4,
                observaciones_riesgo = $5, apoyo_economico = $6,
                tipos_violencia = $7, medios_agresion = $8,
                situaciones_riesgo = $9, derivaciones = $10,
                updated_at = now()
            WHERE id = $1 AND estado = 'borrador'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&intake.motivo)
        .bind(&intake.residencia)
        .bind(&intake.telefono_contacto)
        .bind(&intake.observaciones_riesgo)
        .bind(intake.apoyo_economico)
        .bind(&intake.tipos_violencia)
        .bind(&intake.medios_agresion)
        .bind(&intake.situaciones_riesgo)
        .bind(&intake.derivaciones)
        .fetch_optional(&mut *tx)
        .await?;

        let updated = updated.ok_or(CaseError::Stale)?;

        Self::replace_children(&mut tx, id, &intake.agresores, &intake.hijos).await?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Execute one lifecycle event: role gate, area gate, transition table,
    /// then a conditional update plus exactly one audit row in a single
    /// transaction. A concurrent winner leaves nothing written here.
    pub async fn transition(
        &self,
        actor: &AuthUser,
        id: i64,
        event: CaseEvent,
        motivo: Option<&str>,
    ) -> Result<Expediente, CaseError> {
        lifecycle::ensure_actor(event, actor.rol)?;

        let case = self.load_for(actor, id).await?;
        let from = case.estado();
        let to = lifecycle::transition(from, event)?;

        let (detalle, es_devolucion) = match event {
            CaseEvent::Devolver => {
                let motivo = motivo.map(str::trim).filter(|m| !m.is_empty());
                (
                    Some(motivo.ok_or(CaseError::MissingMotivo)?.to_string()),
                    true,
                )
            }
            _ => (motivo.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()), false),
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE expedientes SET estado = $1, updated_at = now() WHERE id = $2 AND estado = $3",
        )
        .bind(to.as_str())
        .bind(id)
        .bind(from.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Someone else transitioned this case between our read and the
            // conditional update. Nothing was written; surface the conflict.
            return Err(CaseError::Stale);
        }

        sqlx::query(
            r#"
            INSERT INTO historial
                (expediente_id, estado_desde, estado_hasta, detalle,
                 es_devolucion_coordinacion, usuario_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(&detalle)
        .bind(es_devolucion)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "expediente {}: {} -> {} ({}) por '{}'",
            id,
            from,
            to,
            event,
            actor.usuario
        );

        let reloaded: Expediente = sqlx::query_as("SELECT * FROM expedientes WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(reloaded)
    }

    /// Delete a non-terminal case with its child records. Completed cases
    /// are retired and refuse deletion.
    pub async fn delete(&self, actor: &AuthUser, id: i64) -> Result<(), CaseError> {
        let case = self.load_for(actor, id).await?;
        if !case.estado().deletable() {
            return Err(CaseError::NotDeletable);
        }

        let result = sqlx::query("DELETE FROM expedientes WHERE id = $1 AND estado <> 'completado'")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CaseError::Stale);
        }

        tracing::info!("expediente {} eliminado por '{}'", id, actor.usuario);
        Ok(())
    }

    fn require_area(&self, actor: &AuthUser) -> Result<i32, CaseError> {
        if !matches!(actor.rol, Role::CoordinadorArea | Role::Operativo) {
            return Err(CaseError::Forbidden(
                "Este rol no puede operar sobre expedientes".into(),
            ));
        }
        actor
            .area
            .ok_or_else(|| CaseError::Forbidden("Su cuenta no tiene area asignada".into()))
    }

    /// Load a case enforcing the caller's area boundary
    async fn load_for(&self, actor: &AuthUser, id: i64) -> Result<Expediente, CaseError> {
        let area_id = self.require_area(actor)?;

        let case: Option<Expediente> = sqlx::query_as("SELECT * FROM expedientes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let case = case.ok_or(CaseError::NotFound)?;

        if case.area_id != area_id {
            return Err(CaseError::Forbidden(
                "No tiene acceso a los expedientes de esta area".into(),
            ));
        }
        Ok(case)
    }

    async fn trail(&self, id: i64) -> Result<Vec<HistorialEntry>, CaseError> {
        let entries: Vec<HistorialEntry> =
            sqlx::query_as("SELECT * FROM historial WHERE expediente_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        Ok(entries)
    }

    async fn replace_children(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        case_id: i64,
        agresores: &[AgresorIntake],
        hijos: &[HijoIntake],
    ) -> Result<(), CaseError> {
        sqlx::query("DELETE FROM agresores WHERE expediente_id = $1")
            .bind(case_id)
            .execute(&mut **tx)
            .await?;
        for a in agresores {
            sqlx::query(
                r#"
                INSERT INTO agresores (expediente_id, nombre, alias, relacion_victima, edad)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(case_id)
            .bind(&a.nombre)
            .bind(&a.alias)
            .bind(&a.relacion_victima)
            .bind(a.edad)
            .execute(&mut **tx)
            .await?;
        }

        sqlx::query("DELETE FROM hijos WHERE expediente_id = $1")
            .bind(case_id)
            .execute(&mut **tx)
            .await?;
        for h in hijos {
            sqlx::query(
                "INSERT INTO hijos (expediente_id, nombre, edad, escolarizado) VALUES ($1, $2, $3, $4)",
            )
            .bind(case_id)
            .bind(&h.nombre)
            .bind(h.edad)
            .bind(h.escolarizado)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

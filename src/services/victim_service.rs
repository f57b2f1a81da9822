use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::victim::Victima;

#[derive(Debug, thiserror::Error)]
pub enum VictimError {
    #[error("Victima no encontrada")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct VictimIntake {
    pub nombre: String,
    pub apellidos: String,
    pub fecha_nacimiento: Option<NaiveDate>,
    pub documento: Option<String>,
    pub municipio_id: Option<i32>,
    pub direccion: Option<String>,
    pub telefono: Option<String>,
}

pub struct VictimService {
    pool: PgPool,
}

impl VictimService {
    pub async fn new() -> Result<Self, VictimError> {
        let pool = DatabaseManager::pool().await?;
        Ok(Self { pool })
    }

    pub async fn create(&self, intake: VictimIntake) -> Result<Victima, VictimError> {
        if intake.nombre.trim().is_empty() || intake.apellidos.trim().is_empty() {
            return Err(VictimError::Validation(
                "Nombre y apellidos son obligatorios".into(),
            ));
        }

        let victima: Victima = sqlx::query_as(
            r#"
            INSERT INTO victimas
                (nombre, apellidos, fecha_nacimiento, documento, municipio_id, direccion, telefono)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(intake.nombre.trim())
        .bind(intake.apellidos.trim())
        .bind(intake.fecha_nacimiento)
        .bind(&intake.documento)
        .bind(intake.municipio_id)
        .bind(&intake.direccion)
        .bind(&intake.telefono)
        .fetch_one(&self.pool)
        .await?;

        Ok(victima)
    }

    /// Search by name or document; empty query lists the most recent records
    pub async fn search(&self, query: Option<&str>, limit: i64) -> Result<Vec<Victima>, VictimError> {
        let rows: Vec<Victima> = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let pattern = format!("%{}%", q);
                sqlx::query_as(
                    r#"
                    SELECT * FROM victimas
                    WHERE nombre ILIKE $1 OR apellidos ILIKE $1 OR documento ILIKE $1
                    ORDER BY apellidos, nombre
                    LIMIT $2
                    "#,
                )
                .bind(pattern)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM victimas ORDER BY created_at DESC LIMIT $1")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Victima, VictimError> {
        let victima: Option<Victima> = sqlx::query_as("SELECT * FROM victimas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        victima.ok_or(VictimError::NotFound)
    }
}

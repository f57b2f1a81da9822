//! Administrator-only account management. The administrator role itself is
//! never assignable here and never appears in listings.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::{self, PasswordError};
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::user::User;
use crate::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("Usuario no encontrado")]
    NotFound,
    #[error("El nombre de usuario ya existe")]
    DuplicateUsername,
    #[error("Ese rol no puede asignarse desde la administracion")]
    RoleNotAssignable,
    #[error("Los roles de area requieren un area asignada")]
    AreaRequired,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserIntake {
    pub usuario: String,
    pub nombre: String,
    pub password: String,
    pub rol: i32,
    pub area_id: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub nombre: Option<String>,
    pub rol: Option<i32>,
    pub area_id: Option<i32>,
}

pub struct UserService {
    pool: PgPool,
}

impl UserService {
    pub async fn new() -> Result<Self, UserError> {
        let pool = DatabaseManager::pool().await?;
        Ok(Self { pool })
    }

    /// Active accounts, administrator rows excluded
    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        let users: Vec<User> = sqlx::query_as(
            "SELECT * FROM users WHERE rol <> $1 AND deleted_at IS NULL ORDER BY usuario",
        )
        .bind(Role::Administrador.id())
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn create(&self, intake: UserIntake) -> Result<User, UserError> {
        let rol = Self::assignable_role(intake.rol)?;
        let area_id = Self::area_for(rol, intake.area_id)?;

        password::validate_strength(&intake.password)?;
        let hash = password::hash_password(&intake.password)?;

        let result: Result<User, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO users (usuario, nombre, password_hash, rol, area_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(intake.usuario.trim())
        .bind(intake.nombre.trim())
        .bind(hash)
        .bind(rol.id())
        .bind(area_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => {
                tracing::info!("cuenta '{}' creada (rol {})", user.usuario, rol);
                Ok(user)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(UserError::DuplicateUsername)
            }
            Err(other) => Err(other.into()),
        }
    }

    pub async fn update(&self, id: Uuid, update: UserUpdate) -> Result<User, UserError> {
        let current = self.get(id).await?;

        let rol = match update.rol {
            Some(rol) => Self::assignable_role(rol)?,
            None => Role::from_id(current.rol).ok_or(UserError::RoleNotAssignable)?,
        };
        let area_id = Self::area_for(rol, update.area_id.or(current.area_id))?;
        let nombre = update.nombre.unwrap_or(current.nombre);

        let user: User = sqlx::query_as(
            r#"
            UPDATE users
            SET nombre = $2, rol = $3, area_id = $4, updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(nombre.trim())
        .bind(rol.id())
        .bind(area_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Soft delete, keeping the row for audit references
    pub async fn delete(&self, id: Uuid) -> Result<(), UserError> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL AND rol <> $2",
        )
        .bind(id)
        .bind(Role::Administrador.id())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    /// Administrator-forced password change; also clears any pending reset
    pub async fn set_password(&self, id: Uuid, new_password: &str) -> Result<(), UserError> {
        password::validate_strength(new_password)?;
        let hash = password::hash_password(new_password)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token_hash = NULL, reset_token_expires = NULL,
                updated_at = now()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<User, UserError> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        user.ok_or(UserError::NotFound)
    }

    fn assignable_role(rol: i32) -> Result<Role, UserError> {
        match Role::from_id(rol) {
            Some(Role::Administrador) | None => Err(UserError::RoleNotAssignable),
            Some(rol) => Ok(rol),
        }
    }

    fn area_for(rol: Role, area_id: Option<i32>) -> Result<Option<i32>, UserError> {
        if rol.requires_area() {
            area_id.map(Some).ok_or(UserError::AreaRequired)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn administrator_role_is_not_assignable() {
        assert!(matches!(
            UserService::assignable_role(4),
            Err(UserError::RoleNotAssignable)
        ));
        assert!(matches!(
            UserService::assignable_role(7),
            Err(UserError::RoleNotAssignable)
        ));
        assert!(UserService::assignable_role(3).is_ok());
    }

    #[test]
    fn area_required_for_area_roles() {
        assert!(matches!(
            UserService::area_for(Role::Operativo, None),
            Err(UserError::AreaRequired)
        ));
        assert_eq!(
            UserService::area_for(Role::CoordinadorArea, Some(2)).unwrap(),
            Some(2)
        );
        // cross-area roles never carry an area
        assert_eq!(
            UserService::area_for(Role::CoordinadorGeneral, Some(2)).unwrap(),
            None
        );
    }
}

//! Credential checks and session issuance. Login failures never reveal
//! whether the account exists; the MFA-required state is the one
//! distinguished non-success outcome.

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{self, password, reset, totp, Claims};
use crate::config;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::user::User;
use crate::types::Role;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Usuario o contrasena incorrectos")]
    InvalidCredentials,
    #[error("Se requiere el codigo de verificacion TOTP")]
    MfaRequired,
    #[error("El enlace de restablecimiento es invalido o expiro")]
    ResetInvalid,
    #[error("La verificacion TOTP no esta configurada para esta cuenta")]
    TotpNotConfigured,
    #[error("Codigo TOTP invalido")]
    TotpCodeInvalid,
    #[error(transparent)]
    Password(#[from] password::PasswordError),
    #[error("No se pudo generar la sesion: {0}")]
    Jwt(String),
    #[error("Fallo el generador de aleatoriedad")]
    Random,
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub struct LoginOutcome {
    pub token: String,
    pub user: User,
    pub expires_in: u64,
}

pub struct AuthService {
    pool: PgPool,
}

impl AuthService {
    pub async fn new() -> Result<Self, AuthError> {
        let pool = DatabaseManager::pool().await?;
        Ok(Self { pool })
    }

    /// Validate username/password (+ TOTP when enrolled) and issue a JWT.
    pub async fn login(
        &self,
        usuario: &str,
        password_plain: &str,
        codigo_totp: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let user = match self.find_active_user(usuario).await? {
            Some(user) => user,
            None => {
                tracing::warn!("login fallido para usuario desconocido");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !password::verify_password(password_plain, &user.password_hash)? {
            tracing::warn!("login fallido para '{}'", user.usuario);
            return Err(AuthError::InvalidCredentials);
        }

        if user.totp_enabled {
            let secret = user
                .totp_secret
                .as_deref()
                .and_then(totp::decode_secret)
                .ok_or(AuthError::TotpNotConfigured)?;
            match codigo_totp {
                None => return Err(AuthError::MfaRequired),
                Some(code) => {
                    if !totp::verify_code(&secret, code, totp::now_unix()) {
                        tracing::warn!("codigo TOTP invalido para '{}'", user.usuario);
                        return Err(AuthError::InvalidCredentials);
                    }
                }
            }
        }

        let rol = Role::from_id(user.rol).ok_or(AuthError::InvalidCredentials)?;
        let claims = Claims::new(
            user.id,
            user.usuario.clone(),
            user.nombre.clone(),
            rol,
            user.area_id,
        );
        let token = auth::generate_jwt(claims).map_err(|e| AuthError::Jwt(e.to_string()))?;

        tracing::info!("sesion iniciada para '{}'", user.usuario);
        Ok(LoginOutcome {
            token,
            user,
            expires_in: config::config().security.jwt_expiry_hours * 3600,
        })
    }

    /// Start a password reset. Returns the plaintext token when the account
    /// exists; the caller must answer identically either way.
    pub async fn forgot_password(&self, usuario: &str) -> Result<Option<String>, AuthError> {
        let user = match self.find_active_user(usuario).await? {
            Some(user) => user,
            None => return Ok(None),
        };

        let token = reset::generate_token().map_err(|_| AuthError::Random)?;
        let expires =
            Utc::now() + Duration::minutes(config::config().security.reset_token_ttl_minutes);

        sqlx::query(
            "UPDATE users SET reset_token_hash = $2, reset_token_expires = $3, updated_at = now() WHERE id = $1",
        )
        .bind(user.id)
        .bind(reset::token_digest(&token))
        .bind(expires)
        .execute(&self.pool)
        .await?;

        tracing::info!("token de restablecimiento emitido para '{}'", user.usuario);
        Ok(Some(token))
    }

    /// Redeem a reset token. Every failure collapses into one answer so the
    /// endpoint cannot be used to probe accounts or token state.
    pub async fn reset_password(
        &self,
        usuario: &str,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .find_active_user(usuario)
            .await?
            .ok_or(AuthError::ResetInvalid)?;

        let stored = user
            .reset_token_hash
            .as_deref()
            .ok_or(AuthError::ResetInvalid)?;
        let expires = user.reset_token_expires.ok_or(AuthError::ResetInvalid)?;

        if expires < Utc::now() || !reset::verify_token(token, stored) {
            return Err(AuthError::ResetInvalid);
        }

        password::validate_strength(new_password)?;
        let hash = password::hash_password(new_password)?;

        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token_hash = NULL, reset_token_expires = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(hash)
        .execute(&self.pool)
        .await?;

        tracing::info!("contrasena restablecida para '{}'", user.usuario);
        Ok(())
    }

    /// Generate and store a TOTP secret for the caller; enrollment finishes
    /// in [`AuthService::totp_enable`] once a code verifies.
    pub async fn totp_setup(&self, user_id: Uuid, usuario: &str) -> Result<(String, String), AuthError> {
        let secret = totp::generate_secret().map_err(|_| AuthError::Random)?;

        sqlx::query(
            "UPDATE users SET totp_secret = $2, totp_enabled = false, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .bind(&secret)
        .execute(&self.pool)
        .await?;

        let url = totp::otpauth_url(&secret, usuario);
        Ok((secret, url))
    }

    pub async fn totp_enable(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let secret = self.stored_secret(user_id).await?;
        if !totp::verify_code(&secret, code, totp::now_unix()) {
            return Err(AuthError::TotpCodeInvalid);
        }

        sqlx::query("UPDATE users SET totp_enabled = true, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn totp_disable(&self, user_id: Uuid, code: &str) -> Result<(), AuthError> {
        let secret = self.stored_secret(user_id).await?;
        if !totp::verify_code(&secret, code, totp::now_unix()) {
            return Err(AuthError::TotpCodeInvalid);
        }

        sqlx::query(
            "UPDATE users SET totp_enabled = false, totp_secret = NULL, updated_at = now() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn stored_secret(&self, user_id: Uuid) -> Result<Vec<u8>, AuthError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT totp_secret FROM users WHERE id = $1 AND deleted_at IS NULL")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.and_then(|(secret,)| secret)
            .as_deref()
            .and_then(totp::decode_secret)
            .ok_or(AuthError::TotpNotConfigured)
    }

    async fn find_active_user(&self, usuario: &str) -> Result<Option<User>, AuthError> {
        let user: Option<User> =
            sqlx::query_as("SELECT * FROM users WHERE usuario = $1 AND deleted_at IS NULL")
                .bind(usuario)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}

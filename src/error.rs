// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

/// HTTP API error with appropriate status codes and client-friendly messages.
///
/// Failure kinds stay distinguishable on the wire through the `code`
/// field: a state-machine rejection (`INVALID_TRANSITION`), a lost race
/// (`STALE_STATE`), and an authorization failure (`FORBIDDEN`) each demand
/// a different operator reaction, so they never collapse into one generic
/// error. A 403 never invalidates the caller's session; 401 is reserved
/// for the token itself.
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },

    // 401 Unauthorized
    /// Missing or invalid session token
    Unauthorized(String),
    /// Bad credentials on login or password reset; never reveals whether
    /// the account exists
    AuthenticationFailed(String),
    /// Account has TOTP enabled and no code was supplied
    MfaRequired,

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),
    /// State precondition not met (wrong from-state, frozen record)
    InvalidTransition(String),
    /// A concurrent transition on the same case won the conditional update
    StaleState(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::AuthenticationFailed(_) => 401,
            ApiError::MfaRequired => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InvalidTransition(_) => 409,
            ApiError::StaleState(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::AuthenticationFailed(msg) => msg,
            ApiError::MfaRequired => "Se requiere el codigo de verificacion TOTP",
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InvalidTransition(msg) => msg,
            ApiError::StaleState(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_FAILED",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            ApiError::MfaRequired => "MFA_REQUIRED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InvalidTransition(_) => "INVALID_TRANSITION",
            ApiError::StaleState(_) => "STALE_STATE",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::ValidationError {
                message,
                field_errors,
            } => {
                let mut response = json!({
                    "error": true,
                    "message": message,
                    "code": "VALIDATION_FAILED"
                });

                if let Some(field_errors) = field_errors {
                    response["field_errors"] = json!(field_errors);
                }

                response
            }
            _ => {
                json!({
                    "error": true,
                    "message": self.message(),
                    "code": self.error_code()
                })
            }
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn authentication_failed() -> Self {
        ApiError::AuthenticationFailed("Usuario o contrasena incorrectos".to_string())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        ApiError::InvalidTransition(message.into())
    }

    pub fn stale_state(message: impl Into<String>) -> Self {
        ApiError::StaleState(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert other error types to ApiError
impl From<crate::database::manager::DatabaseError> for ApiError {
    fn from(err: crate::database::manager::DatabaseError) -> Self {
        match err {
            crate::database::manager::DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            crate::database::manager::DatabaseError::ConfigMissing(_)
            | crate::database::manager::DatabaseError::InvalidDatabaseUrl => {
                ApiError::service_unavailable("Base de datos no configurada")
            }
            crate::database::manager::DatabaseError::MigrationError(msg) => {
                tracing::error!("Migration error: {}", msg);
                ApiError::service_unavailable("El servicio se esta actualizando, intente mas tarde")
            }
            crate::database::manager::DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Ocurrio un error al procesar la solicitud")
            }
        }
    }
}

impl From<crate::lifecycle::LifecycleError> for ApiError {
    fn from(err: crate::lifecycle::LifecycleError) -> Self {
        match err {
            crate::lifecycle::LifecycleError::InvalidTransition { .. } => {
                ApiError::invalid_transition(err.to_string())
            }
            crate::lifecycle::LifecycleError::RoleNotAllowed { .. } => {
                ApiError::forbidden(err.to_string())
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::not_found("Registro no encontrado"),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                tracing::error!("Database unreachable: {}", err);
                ApiError::service_unavailable("Base de datos temporalmente no disponible")
            }
            other => {
                tracing::error!("SQLx error: {}", other);
                ApiError::internal_server_error("Ocurrio un error al procesar la solicitud")
            }
        }
    }
}

impl From<crate::services::case_service::CaseError> for ApiError {
    fn from(err: crate::services::case_service::CaseError) -> Self {
        use crate::services::case_service::CaseError;
        match err {
            CaseError::NotFound | CaseError::VictimNotFound => ApiError::not_found(err.to_string()),
            CaseError::NotEditable | CaseError::NotDeletable => {
                ApiError::invalid_transition(err.to_string())
            }
            CaseError::Stale => ApiError::stale_state(err.to_string()),
            CaseError::MissingMotivo => ApiError::validation_error(err.to_string(), None),
            CaseError::Forbidden(msg) => ApiError::forbidden(msg),
            CaseError::Validation(msg) => ApiError::validation_error(msg, None),
            CaseError::Lifecycle(inner) => inner.into(),
            CaseError::Database(inner) => inner.into(),
            CaseError::Sqlx(inner) => inner.into(),
        }
    }
}

impl From<crate::services::auth_service::AuthError> for ApiError {
    fn from(err: crate::services::auth_service::AuthError) -> Self {
        use crate::auth::password::PasswordError;
        use crate::services::auth_service::AuthError;
        match err {
            AuthError::InvalidCredentials => ApiError::authentication_failed(),
            AuthError::MfaRequired => ApiError::MfaRequired,
            AuthError::ResetInvalid => ApiError::AuthenticationFailed(err.to_string()),
            AuthError::TotpNotConfigured => ApiError::bad_request(err.to_string()),
            AuthError::TotpCodeInvalid => ApiError::validation_error(err.to_string(), None),
            AuthError::Password(PasswordError::TooShort(_)) => {
                ApiError::validation_error(err.to_string(), None)
            }
            AuthError::Password(_) | AuthError::Jwt(_) | AuthError::Random => {
                tracing::error!("auth failure: {}", err);
                ApiError::internal_server_error("Ocurrio un error al procesar la solicitud")
            }
            AuthError::Database(inner) => inner.into(),
            AuthError::Sqlx(inner) => inner.into(),
        }
    }
}

impl From<crate::services::victim_service::VictimError> for ApiError {
    fn from(err: crate::services::victim_service::VictimError) -> Self {
        use crate::services::victim_service::VictimError;
        match err {
            VictimError::NotFound => ApiError::not_found(err.to_string()),
            VictimError::Validation(msg) => ApiError::validation_error(msg, None),
            VictimError::Database(inner) => inner.into(),
            VictimError::Sqlx(inner) => inner.into(),
        }
    }
}

impl From<crate::services::user_service::UserError> for ApiError {
    fn from(err: crate::services::user_service::UserError) -> Self {
        use crate::auth::password::PasswordError;
        use crate::services::user_service::UserError;
        match err {
            UserError::NotFound => ApiError::not_found(err.to_string()),
            UserError::DuplicateUsername => ApiError::conflict(err.to_string()),
            UserError::RoleNotAssignable | UserError::AreaRequired => {
                ApiError::validation_error(err.to_string(), None)
            }
            UserError::Password(PasswordError::TooShort(_)) => {
                ApiError::validation_error(err.to_string(), None)
            }
            UserError::Password(_) => {
                tracing::error!("password hashing failure: {}", err);
                ApiError::internal_server_error("Ocurrio un error al procesar la solicitud")
            }
            UserError::Database(inner) => inner.into(),
            UserError::Sqlx(inner) => inner.into(),
        }
    }
}

impl From<crate::services::report_service::ReportError> for ApiError {
    fn from(err: crate::services::report_service::ReportError) -> Self {
        use crate::services::report_service::ReportError;
        match err {
            ReportError::Forbidden => ApiError::forbidden(err.to_string()),
            ReportError::Database(inner) => inner.into(),
            ReportError::Sqlx(inner) => inner.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_and_stale_codes_stay_distinct() {
        let invalid = ApiError::invalid_transition("x");
        let stale = ApiError::stale_state("y");
        assert_eq!(invalid.status_code(), 409);
        assert_eq!(stale.status_code(), 409);
        assert_ne!(invalid.error_code(), stale.error_code());
    }

    #[test]
    fn mfa_required_is_not_a_credentials_failure() {
        assert_eq!(ApiError::MfaRequired.status_code(), 401);
        assert_eq!(ApiError::MfaRequired.error_code(), "MFA_REQUIRED");
        assert_ne!(
            ApiError::MfaRequired.error_code(),
            ApiError::authentication_failed().error_code()
        );
    }

    #[test]
    fn role_mismatch_maps_to_forbidden_not_conflict() {
        let err: ApiError = crate::lifecycle::LifecycleError::RoleNotAllowed {
            event: "aprobar",
            required: crate::types::Role::CoordinadorArea,
            actual: crate::types::Role::Operativo,
        }
        .into();
        assert_eq!(err.status_code(), 403);

        let err: ApiError = crate::lifecycle::LifecycleError::InvalidTransition {
            from: crate::lifecycle::CaseState::Completado,
            event: "aprobar",
        }
        .into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }
}

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::types::Role;

/// Route-group role gate. Runs after [`jwt_auth_middleware`] and rejects
/// callers whose role is not in the allowed set with a 403 that leaves the
/// session valid.
///
/// [`jwt_auth_middleware`]: super::auth::jwt_auth_middleware
pub fn require_roles(
    allowed: &'static [Role],
) -> impl Fn(
    Request,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, Response>> + Send>>
       + Clone {
    move |request: Request, next: Next| {
        Box::pin(async move {
            let auth_user = request
                .extensions()
                .get::<AuthUser>()
                .ok_or_else(|| error_response(ApiError::unauthorized("Autenticacion requerida")))?;

            if !allowed.contains(&auth_user.rol) {
                tracing::warn!(
                    "role gate rejected '{}' ({}) for {}",
                    auth_user.usuario,
                    auth_user.rol,
                    request.uri().path()
                );
                return Err(error_response(ApiError::forbidden(
                    "Su rol no tiene acceso a esta operacion",
                )));
            }

            Ok(next.run(request).await)
        })
    }
}

fn error_response(err: ApiError) -> Response {
    (
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::FORBIDDEN),
        Json(err.to_json()),
    )
        .into_response()
}

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::auth::Claims;
use crate::config;
use crate::error::ApiError;
use crate::types::Role;

/// Authenticated caller context extracted from the JWT. Carries everything
/// the area/role guard needs; handlers pull it from request extensions.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub usuario: String,
    pub nombre: String,
    pub rol: Role,
    pub area: Option<i32>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            usuario: claims.usuario,
            nombre: claims.nombre,
            rol: claims.rol,
            area: claims.area,
        }
    }
}

impl AuthUser {
    /// Area check for roles bound to one service area. A mismatch is an
    /// authorization failure and must leave the session intact.
    pub fn ensure_area(&self, case_area: i32) -> Result<(), ApiError> {
        match self.rol {
            Role::CoordinadorArea | Role::Operativo => match self.area {
                Some(area) if area == case_area => Ok(()),
                _ => Err(ApiError::forbidden(
                    "No tiene acceso a los expedientes de esta area",
                )),
            },
            Role::CoordinadorGeneral | Role::Administrador => Err(ApiError::forbidden(
                "Este rol no puede operar sobre expedientes",
            )),
        }
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, impl IntoResponse> {
    // Extract JWT from Authorization header
    let token = extract_jwt_from_headers(&headers).map_err(unauthorized_response)?;

    // Validate and decode JWT
    let claims = validate_jwt(&token).map_err(unauthorized_response)?;

    // Convert claims to AuthUser and inject into request
    let auth_user = AuthUser::from(claims);
    request.extensions_mut().insert(auth_user);

    Ok::<Response, (StatusCode, Json<serde_json::Value>)>(next.run(request).await)
}

fn unauthorized_response(msg: String) -> (StatusCode, Json<serde_json::Value>) {
    let api_error = ApiError::unauthorized(msg);
    (
        StatusCode::from_u16(api_error.status_code()).unwrap(),
        Json(api_error.to_json()),
    )
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Validate JWT token and extract claims
fn validate_jwt(token: &str) -> Result<Claims, String> {
    let secret = &config::config().security.jwt_secret;

    if secret.is_empty() {
        return Err("JWT secret not configured".to_string());
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| format!("Invalid JWT token: {}", e))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(rol: Role, area: Option<i32>) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            usuario: "prueba".into(),
            nombre: "Prueba".into(),
            rol,
            area,
        }
    }

    #[test]
    fn area_roles_only_reach_their_own_area() {
        assert!(user(Role::Operativo, Some(2)).ensure_area(2).is_ok());
        assert!(user(Role::Operativo, Some(2)).ensure_area(3).is_err());
        assert!(user(Role::CoordinadorArea, Some(1)).ensure_area(1).is_ok());
        assert!(user(Role::CoordinadorArea, None).ensure_area(1).is_err());
    }

    #[test]
    fn non_case_roles_never_pass_the_area_check() {
        assert!(user(Role::CoordinadorGeneral, None).ensure_area(1).is_err());
        assert!(user(Role::Administrador, None).ensure_area(1).is_err());
    }
}

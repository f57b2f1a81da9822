pub mod auth;
pub mod authorize;
pub mod response;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use authorize::require_roles;
pub use response::{ApiResponse, ApiResult};

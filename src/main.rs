use axum::{middleware::from_fn, routing::get, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use siav_api::handlers::{protected, public};
use siav_api::middleware::{jwt_auth_middleware, require_roles};
use siav_api::types::Role;

const CASE_ROLES: &[Role] = &[Role::CoordinadorArea, Role::Operativo];
const REPORT_ROLES: &[Role] = &[Role::CoordinadorGeneral, Role::CoordinadorArea];
const ADMIN_ROLES: &[Role] = &[Role::Administrador];

#[tokio::main]
async fn main() {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    // Initialize configuration (this loads the config singleton)
    let config = siav_api::config::config();
    tracing::info!("Starting SIAV API in {:?} mode", config.environment);

    let app = app();

    // Allow tests or deployments to override port via env
    let port = std::env::var("SIAV_API_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind {}: {}", bind_addr, e));

    tracing::info!("SIAV API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.expect("server");
}

fn app() -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(auth_routes())
        .merge(case_routes())
        .merge(victim_routes())
        .merge(catalog_routes())
        .merge(report_routes())
        .merge(admin_routes())
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router {
    use axum::routing::post;
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/password/olvido", post(auth::forgot_password))
        .route("/auth/password/restablecer", post(auth::reset_password))
}

fn auth_routes() -> Router {
    use axum::routing::{delete, post};
    use protected::auth;

    Router::new()
        .route("/api/auth/quien-soy", get(auth::quien_soy))
        .route("/api/auth/totp/configurar", post(auth::totp_configurar))
        .route("/api/auth/totp/activar", post(auth::totp_activar))
        .route("/api/auth/totp", delete(auth::totp_eliminar))
        .layer(from_fn(jwt_auth_middleware))
}

fn case_routes() -> Router {
    use axum::routing::post;
    use protected::cases;

    Router::new()
        .route(
            "/api/expedientes",
            get(cases::list).post(cases::create),
        )
        .route(
            "/api/expedientes/:id",
            get(cases::get).put(cases::update).delete(cases::delete),
        )
        .route("/api/expedientes/:id/historial", get(cases::history))
        // Lifecycle transitions
        .route("/api/expedientes/:id/enviar-revision", post(cases::submit))
        .route("/api/expedientes/:id/aprobar", post(cases::approve))
        .route("/api/expedientes/:id/devolver", post(cases::give_back))
        .route("/api/expedientes/:id/iniciar", post(cases::start_work))
        .route("/api/expedientes/:id/completar", post(cases::complete))
        .layer(from_fn(require_roles(CASE_ROLES)))
        .layer(from_fn(jwt_auth_middleware))
}

fn victim_routes() -> Router {
    use protected::victims;

    Router::new()
        .route(
            "/api/victimas",
            get(victims::list).post(victims::create),
        )
        .route("/api/victimas/:id", get(victims::get))
        .layer(from_fn(require_roles(CASE_ROLES)))
        .layer(from_fn(jwt_auth_middleware))
}

fn catalog_routes() -> Router {
    use protected::catalogs;

    Router::new()
        .route("/api/catalogos/:nombre", get(catalogs::get))
        .layer(from_fn(jwt_auth_middleware))
}

fn report_routes() -> Router {
    use protected::reports;

    Router::new()
        .route("/api/reportes/oficial", get(reports::official))
        .route("/api/reportes/oficial/csv", get(reports::official_csv))
        .route("/api/reportes/operativo", get(reports::preview))
        .layer(from_fn(require_roles(REPORT_ROLES)))
        .layer(from_fn(jwt_auth_middleware))
}

fn admin_routes() -> Router {
    use axum::routing::post;
    use protected::admin;

    Router::new()
        .route(
            "/api/admin/usuarios",
            get(admin::list).post(admin::create),
        )
        .route(
            "/api/admin/usuarios/:id",
            axum::routing::put(admin::update).delete(admin::delete),
        )
        .route("/api/admin/usuarios/:id/password", post(admin::set_password))
        .layer(from_fn(require_roles(ADMIN_ROLES)))
        .layer(from_fn(jwt_auth_middleware))
}

async fn root() -> axum::response::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    axum::response::Json(json!({
        "success": true,
        "data": {
            "name": "SIAV API",
            "version": version,
            "description": "Case management backend for victim services",
            "endpoints": {
                "home": "/ (public)",
                "auth": "/auth/login, /auth/password/* (public - token acquisition)",
                "session": "/api/auth/* (protected - session and TOTP)",
                "expedientes": "/api/expedientes[/:id] (protected - case lifecycle)",
                "victimas": "/api/victimas[/:id] (protected)",
                "catalogos": "/api/catalogos/:nombre (protected)",
                "reportes": "/api/reportes/* (protected - coordination)",
                "admin": "/api/admin/usuarios (protected - administrators)",
            }
        }
    }))
}

async fn health() -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match siav_api::database::manager::DatabaseManager::health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::response::Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::response::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}

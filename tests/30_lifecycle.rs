//! End-to-end lifecycle scenario against a live database. These tests seed
//! their own accounts and victims and skip cleanly when DATABASE_URL is not
//! configured in the environment.

mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use siav_api::auth::password;
use siav_api::database::manager::DatabaseManager;
use siav_api::types::Role;

struct Ctx {
    base_url: String,
    client: reqwest::Client,
    op_token: String,
    coord_token: String,
    victima_id: Uuid,
}

const AREA: i32 = 1;
const PASSWORD: &str = "clave-de-prueba";

/// Seed one operative, one coordinator, and a fresh victim, then log both
/// users in over HTTP. Returns None when no database is reachable.
async fn setup() -> Result<Option<Ctx>> {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("skipping lifecycle test: DATABASE_URL not set");
        return Ok(None);
    }
    if DatabaseManager::migrate().await.is_err() {
        eprintln!("skipping lifecycle test: database not reachable");
        return Ok(None);
    }

    let server = common::ensure_server().await?;
    let pool = DatabaseManager::pool().await?;
    let hash = password::hash_password(PASSWORD)?;
    let tag_source = Uuid::new_v4().simple().to_string();
    let tag = &tag_source[..8];

    let op_user = format!("op_{}", tag);
    let coord_user = format!("coord_{}", tag);
    for (usuario, rol) in [(&op_user, Role::Operativo), (&coord_user, Role::CoordinadorArea)] {
        sqlx::query(
            "INSERT INTO users (usuario, nombre, password_hash, rol, area_id) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(usuario)
        .bind(format!("Cuenta {}", usuario))
        .bind(&hash)
        .bind(rol.id())
        .bind(AREA)
        .execute(&pool)
        .await?;
    }

    let (victima_id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO victimas (nombre, apellidos) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("Victima {}", tag))
    .bind("De Prueba")
    .fetch_one(&pool)
    .await?;

    let client = reqwest::Client::new();
    let op_token = login(&client, &server.base_url, &op_user).await?;
    let coord_token = login(&client, &server.base_url, &coord_user).await?;

    Ok(Some(Ctx {
        base_url: server.base_url.clone(),
        client,
        op_token,
        coord_token,
        victima_id,
    }))
}

async fn login(client: &reqwest::Client, base_url: &str, usuario: &str) -> Result<String> {
    let res = client
        .post(format!("{}/auth/login", base_url))
        .json(&json!({ "usuario": usuario, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
    let body = res.json::<Value>().await?;
    Ok(body["data"]["token"].as_str().unwrap().to_string())
}

impl Ctx {
    async fn post(&self, token: &str, path: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut req = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }

    async fn get(&self, token: &str, path: &str) -> Result<(StatusCode, Value)> {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await?;
        let status = res.status();
        Ok((status, res.json().await?))
    }
}

#[tokio::test]
async fn full_case_lifecycle() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };

    // Create a draft case
    let (status, body) = ctx
        .post(
            &ctx.op_token,
            "/api/expedientes",
            Some(json!({
                "victima_id": ctx.victima_id,
                "motivo": "Atencion inicial",
                "tipos_violencia": [1, 2],
                "agresores": [{ "nombre": "Agresor Uno" }]
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    assert_eq!(body["data"]["reutilizado"], false);
    assert_eq!(body["data"]["expediente"]["estado"], "borrador");
    let id = body["data"]["expediente"]["id"].as_i64().unwrap();

    // Creating again for the same victim reuses the open case
    let (status, body) = ctx
        .post(
            &ctx.op_token,
            "/api/expedientes",
            Some(json!({ "victima_id": ctx.victima_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["reutilizado"], true);
    assert_eq!(body["data"]["expediente"]["id"].as_i64().unwrap(), id);

    // Submit for review
    let (status, body) = ctx
        .post(&ctx.op_token, &format!("/api/expedientes/{}/enviar-revision", id), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["estado"], "pendiente");

    // The operative cannot approve; role mismatch is 403, not a state error
    let (status, body) = ctx
        .post(&ctx.op_token, &format!("/api/expedientes/{}/aprobar", id), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "body: {}", body);
    assert_eq!(body["code"], "FORBIDDEN");

    // Coordinator returns it with a motive
    let (status, body) = ctx
        .post(
            &ctx.coord_token,
            &format!("/api/expedientes/{}/devolver", id),
            Some(json!({ "motivo": "Falta firma" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["estado"], "borrador");

    // The listing surfaces the rejection reason to the operative
    let (status, body) = ctx.get(&ctx.op_token, "/api/expedientes").await?;
    assert_eq!(status, StatusCode::OK);
    let row = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"].as_i64() == Some(id))
        .expect("case missing from listing");
    assert_eq!(row["motivo_devolucion"], "Falta firma");

    // The audit trail records the return with the coordination flag
    let (status, body) = ctx
        .get(&ctx.op_token, &format!("/api/expedientes/{}/historial", id))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let trail = body["data"].as_array().unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0]["estado_desde"], "borrador");
    assert_eq!(trail[0]["estado_hasta"], "pendiente");
    assert_eq!(trail[1]["estado_desde"], "pendiente");
    assert_eq!(trail[1]["estado_hasta"], "borrador");
    assert_eq!(trail[1]["detalle"], "Falta firma");
    assert_eq!(trail[1]["es_devolucion_coordinacion"], true);

    // Returning without a motive is a validation failure
    let (status, _) = ctx
        .post(&ctx.op_token, &format!("/api/expedientes/{}/enviar-revision", id), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ctx
        .post(
            &ctx.coord_token,
            &format!("/api/expedientes/{}/devolver", id),
            Some(json!({ "motivo": "   " })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    // Approve, start work, complete
    let (status, body) = ctx
        .post(&ctx.coord_token, &format!("/api/expedientes/{}/aprobar", id), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["estado"], "validado");

    // The frozen record rejects draft edits
    let res = ctx
        .client
        .put(format!("{}/api/expedientes/{}", ctx.base_url, id))
        .bearer_auth(&ctx.op_token)
        .json(&json!({ "motivo": "edicion tardia" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = res.json::<Value>().await?;
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let (status, body) = ctx
        .post(&ctx.coord_token, &format!("/api/expedientes/{}/iniciar", id), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["estado"], "en_progreso");

    let (status, body) = ctx
        .post(&ctx.coord_token, &format!("/api/expedientes/{}/completar", id), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "body: {}", body);
    assert_eq!(body["data"]["estado"], "completado");

    // Terminal: no further transitions, no deletion
    let (status, body) = ctx
        .post(&ctx.coord_token, &format!("/api/expedientes/{}/iniciar", id), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT, "body: {}", body);
    assert_eq!(body["code"], "INVALID_TRANSITION");

    let res = ctx
        .client
        .delete(format!("{}/api/expedientes/{}", ctx.base_url, id))
        .bearer_auth(&ctx.op_token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    Ok(())
}

#[tokio::test]
async fn concurrent_review_has_exactly_one_winner() -> Result<()> {
    let Some(ctx) = setup().await? else { return Ok(()) };

    let (status, body) = ctx
        .post(
            &ctx.op_token,
            "/api/expedientes",
            Some(json!({ "victima_id": ctx.victima_id })),
        )
        .await?;
    assert!(status.is_success(), "body: {}", body);
    let id = body["data"]["expediente"]["id"].as_i64().unwrap();

    let (status, _) = ctx
        .post(&ctx.op_token, &format!("/api/expedientes/{}/enviar-revision", id), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    // Fire approve and return against the same pending case at once
    let aprobar_path = format!("/api/expedientes/{}/aprobar", id);
    let devolver_path = format!("/api/expedientes/{}/devolver", id);
    let approve = ctx.post(&ctx.coord_token, &aprobar_path, None);
    let give_back = ctx.post(
        &ctx.coord_token,
        &devolver_path,
        Some(json!({ "motivo": "Revision duplicada" })),
    );
    let (approve_res, give_back_res) = tokio::join!(approve, give_back);
    let (approve_status, approve_body) = approve_res?;
    let (give_back_status, give_back_body) = give_back_res?;

    let winners = [approve_status, give_back_status]
        .iter()
        .filter(|s| s.is_success())
        .count();
    assert_eq!(
        winners, 1,
        "exactly one transition must win: aprobar={} devolver={}",
        approve_status, give_back_status
    );

    // The loser observed the conflict after the fact; depending on timing it
    // reports the lost race or the now-impossible from-state.
    let loser = if approve_status.is_success() {
        &give_back_body
    } else {
        &approve_body
    };
    let code = loser["code"].as_str().unwrap_or_default();
    assert!(
        code == "STALE_STATE" || code == "INVALID_TRANSITION",
        "unexpected loser code: {}",
        loser
    );

    // The case landed in exactly one of the two targets, with one audit row
    // for the contested step
    let (status, body) = ctx
        .get(&ctx.coord_token, &format!("/api/expedientes/{}", id))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let estado = body["data"]["expediente"]["estado"].as_str().unwrap();
    assert!(
        estado == "validado" || estado == "borrador",
        "unexpected state: {}",
        estado
    );
    let trail = body["data"]["historial"].as_array().unwrap();
    let contested: Vec<_> = trail
        .iter()
        .filter(|e| e["estado_desde"] == "pendiente")
        .collect();
    assert_eq!(contested.len(), 1, "trail: {:?}", trail);

    Ok(())
}

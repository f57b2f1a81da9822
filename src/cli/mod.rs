//! Operational CLI: schema migrations and bootstrap of the first
//! administrator account, which the HTTP API refuses to create.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::auth::password;
use crate::database::manager::DatabaseManager;
use crate::types::Role;

#[derive(Parser)]
#[command(name = "siav")]
#[command(about = "SIAV CLI - Operational tasks for the case management API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run pending database migrations")]
    Migrate,

    #[command(about = "Check database connectivity")]
    Health,

    #[command(about = "Create an administrator account")]
    CreateAdmin {
        #[arg(help = "Login name")]
        usuario: String,
        #[arg(help = "Display name")]
        nombre: String,
        #[arg(long, help = "Password (prompted from SIAV_ADMIN_PASSWORD if omitted)")]
        password: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => migrate(output_format).await,
        Commands::Health => health(output_format).await,
        Commands::CreateAdmin {
            usuario,
            nombre,
            password,
        } => create_admin(usuario, nombre, password, output_format).await,
    }
}

async fn migrate(format: OutputFormat) -> anyhow::Result<()> {
    DatabaseManager::migrate().await?;
    emit(format, "migraciones aplicadas", serde_json::json!({ "migrated": true }));
    Ok(())
}

async fn health(format: OutputFormat) -> anyhow::Result<()> {
    DatabaseManager::health_check().await?;
    emit(format, "base de datos accesible", serde_json::json!({ "database": "ok" }));
    Ok(())
}

async fn create_admin(
    usuario: String,
    nombre: String,
    password: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let password = match password.or_else(|| std::env::var("SIAV_ADMIN_PASSWORD").ok()) {
        Some(p) => p,
        None => anyhow::bail!("indique --password o defina SIAV_ADMIN_PASSWORD"),
    };
    password::validate_strength(&password)?;
    let hash = password::hash_password(&password)?;

    let pool = DatabaseManager::pool().await?;
    let row: (uuid::Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (usuario, nombre, password_hash, rol)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(usuario.trim())
    .bind(nombre.trim())
    .bind(hash)
    .bind(Role::Administrador.id())
    .fetch_one(&pool)
    .await?;

    emit(
        format,
        &format!("cuenta de administracion creada: {}", row.0),
        serde_json::json!({ "id": row.0, "usuario": usuario }),
    );
    Ok(())
}

fn emit(format: OutputFormat, text: &str, json: serde_json::Value) {
    match format {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => println!("{}", json),
    }
}

//! Définition et implémentation des commandes CLI
//!
//! CLI simplifiée:
//! - défaut: servir l'API HTTP de consultation
//! - `check`: connectivité base + rapport de capacités du schéma

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use crate::config::ServiceConfig;
use crate::db::capabilities::Capabilities;
use crate::db::pool::{create_pool, ping, test_connection, DatabaseConfig};
use crate::query::SpatialQueryService;

#[derive(Args)]
pub struct DbArgs {
    /// PostgreSQL host (défaut : env PGHOST / localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env PGDATABASE / geoportail)
    #[arg(long)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env PGUSER / postgres)
    #[arg(long)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env PGPASSWORD)
    #[arg(long)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env PGPORT / 5432)
    #[arg(long)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long)]
    pub ssl: Option<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    /// Adresse d'écoute HTTP
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port d'écoute HTTP
    #[arg(long, default_value_t = 3000)]
    pub http_port: u16,

    /// Fichier de configuration JSON du service (schéma, tables, limites)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub db: DbArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Vérifie la connexion à la base et les capacités du schéma
    Check {
        /// Fichier de configuration JSON du service
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        db: DbArgs,
    },
}

/// Exécute la commande par défaut: servir l'API
pub async fn cmd_serve(args: ServeArgs) -> Result<()> {
    let service_config = load_service_config(args.config.as_deref())?;

    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, args.db);

    println!("=== geoportail-pg ===");
    println!("Schema: {}", service_config.schema);
    println!(
        "Statement timeout: {} ms",
        service_config.statement_timeout_ms
    );
    println!("Max features per viewport: {}", service_config.max_features);
    println!(
        "Database: {}@{}:{}/{} (SSL: {:?})",
        db_config.user, db_config.host, db_config.port, db_config.dbname, db_config.ssl_mode
    );

    let pool = create_pool(&db_config).await?;
    test_connection(&pool).await?;
    println!("Connected to PostgreSQL");

    let service = SpatialQueryService::new(pool, service_config).await?;
    println!(
        "Capabilities: parcel attributes = {}, address-parcel link = {}",
        service.capabilities().has_parcel_attributes(),
        service.capabilities().has_address_parcel_link()
    );

    let app = crate::http::router(Arc::new(service));
    let addr = format!("{}:{}", args.bind, args.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(addr = addr.as_str(), "Serving HTTP API");
    println!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("HTTP server failed")?;

    Ok(())
}

/// Exécute la commande check
pub async fn cmd_check(config: Option<PathBuf>, db: DbArgs) -> Result<()> {
    let service_config = load_service_config(config.as_deref())?;

    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, db);

    println!("=== Check ===");
    println!(
        "Database: {}@{}:{}/{} (SSL: {:?})",
        db_config.user, db_config.host, db_config.port, db_config.dbname, db_config.ssl_mode
    );

    let pool = create_pool(&db_config).await?;
    test_connection(&pool).await?;

    let elapsed = ping(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Ping failed: {e}"))?;
    println!("Ping: {:.1} ms", elapsed.as_secs_f64() * 1000.0);

    let capabilities = Capabilities::probe(&pool, &service_config)
        .await
        .map_err(|e| anyhow::anyhow!("Capability probe failed: {e}"))?;
    println!(
        "Parcel attributes table ({}.{}): {}",
        service_config.schema,
        service_config.tables.parcel_attributes,
        presence(capabilities.has_parcel_attributes())
    );
    println!(
        "Address-parcel link table ({}.{}): {}",
        service_config.schema,
        service_config.tables.address_parcel_link,
        presence(capabilities.has_address_parcel_link())
    );

    println!("Check complete");
    Ok(())
}

fn presence(present: bool) -> &'static str {
    if present {
        "present"
    } else {
        "absent (fallback queries will be used)"
    }
}

fn load_service_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => ServiceConfig::load(path),
        None => Ok(ServiceConfig::default()),
    }
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: DbArgs) {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.dbname = database;
    }
    if let Some(user) = args.user {
        config.user = user;
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = args.ssl {
        if let Ok(mode) = ssl.parse() {
            config.ssl_mode = mode;
        }
    }
}

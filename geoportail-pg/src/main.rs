//! Point d'entrée CLI pour geoportail-pg

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    // Chercher .env dans le répertoire courant ou parent
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;
mod config;
mod db;
mod error;
mod geojson;
mod http;
mod query;

use cli::{Commands, ServeArgs};

/// Servir l'API de consultation du géoportail municipal
#[derive(Parser)]
#[command(name = "geoportail-pg")]
#[command(author, version)]
#[command(about = "API de consultation du géoportail municipal sur PostGIS")]
#[command(
    long_about = "Serveur de requêtes spatiales pour la visionneuse cartographique municipale: parcelles par emprise, adresses, équipements de proximité.\n\nPar défaut, sert l'API HTTP. Utilisez 'check' pour vérifier la base et les capacités du schéma."
)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Sous-commande (défaut: servir l'API)
    #[command(subcommand)]
    command: Option<Commands>,

    /// Arguments du serveur HTTP (commande par défaut)
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger .env avant tout
    load_env();

    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Some(Commands::Check { config, db }) => {
            info!("Checking database connectivity and schema capabilities");
            cli::cmd_check(config, db).await?;
        }
        None => {
            info!(bind = cli.serve.bind.as_str(), port = cli.serve.http_port, "Starting API server");
            cli::cmd_serve(cli.serve).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}

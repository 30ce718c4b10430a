//! # geoportail-pg
//!
//! API de consultation du géoportail municipal sur PostGIS: parcelles par
//! emprise avec simplification adaptée au zoom, adresses, équipements de
//! proximité, accrochage voirie.
//!
//! ## Features
//!
//! - Requêtes spatiales bornées par `statement_timeout` (transaction par
//!   requête, rollback explicite, connexion rendue au pool sans condition)
//! - Négociation de capacités: les tables optionnelles du schéma sont
//!   sondées une fois, avec repli en requête basique
//! - Réponses GeoJSON, coordonnées `[longitude, latitude]`
//! - Implémente les traits sources du coeur client [`carto`]
//!
//! ## Usage CLI
//!
//! ```bash
//! # Servir l'API (configuration base via .env / PGHOST etc.)
//! geoportail-pg --http-port 3000
//!
//! # Vérifier la base et les capacités du schéma
//! geoportail-pg check
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod geojson;
pub mod http;
pub mod query;

pub use config::ServiceConfig;
pub use db::pool::{create_pool, DatabaseConfig};
pub use query::SpatialQueryService;

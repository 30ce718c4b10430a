//! Négociation de capacités contre le schéma optionnel
//!
//! Certaines bases municipales portent des tables enrichies (attributs de
//! parcelles, rattachement adresse→parcelle précalculé), d'autres non.
//! Plutôt que de payer un échec de requête à chaque appel, l'existence des
//! relations optionnelles est sondée une fois au démarrage et la décision
//! est mise en cache. Un échec inattendu à l'exécution dégrade la capacité
//! (une fois) au lieu de condamner la requête.

use std::sync::atomic::{AtomicBool, Ordering};

use deadpool_postgres::Pool;
use tracing::{info, warn};

use carto::QueryError;

use crate::config::ServiceConfig;

use super::{map_pg_error, map_pool_error};

/// Capacités détectées du schéma
#[derive(Debug)]
pub struct Capabilities {
    parcel_attributes: AtomicBool,
    address_parcel_link: AtomicBool,
}

impl Capabilities {
    /// Sonde les relations optionnelles, une seule fois au démarrage
    pub async fn probe(pool: &Pool, config: &ServiceConfig) -> Result<Self, QueryError> {
        let parcel_attributes =
            table_exists(pool, &config.schema, &config.tables.parcel_attributes).await?;
        let address_parcel_link =
            table_exists(pool, &config.schema, &config.tables.address_parcel_link).await?;

        info!(
            parcel_attributes,
            address_parcel_link,
            schema = config.schema.as_str(),
            "Probed optional schema capabilities"
        );

        Ok(Self {
            parcel_attributes: AtomicBool::new(parcel_attributes),
            address_parcel_link: AtomicBool::new(address_parcel_link),
        })
    }

    /// Capacités minimales, sans sondage (tests)
    pub fn basic() -> Self {
        Self {
            parcel_attributes: AtomicBool::new(false),
            address_parcel_link: AtomicBool::new(false),
        }
    }

    pub fn has_parcel_attributes(&self) -> bool {
        self.parcel_attributes.load(Ordering::Relaxed)
    }

    pub fn has_address_parcel_link(&self) -> bool {
        self.address_parcel_link.load(Ordering::Relaxed)
    }

    /// Dégrade la capacité attributs-parcelles après un échec à l'exécution
    pub fn demote_parcel_attributes(&self) {
        if self.parcel_attributes.swap(false, Ordering::Relaxed) {
            warn!("Demoting parcel attributes capability, falling back to basic parcel queries");
        }
    }

    /// Dégrade le rattachement précalculé adresse→parcelle
    pub fn demote_address_parcel_link(&self) {
        if self.address_parcel_link.swap(false, Ordering::Relaxed) {
            warn!("Demoting address-parcel link capability, falling back to spatial joins");
        }
    }
}

/// Vérifie l'existence d'une table dans le schéma
async fn table_exists(pool: &Pool, schema: &str, table: &str) -> Result<bool, QueryError> {
    let client = pool.get().await.map_err(|e| map_pool_error(&e))?;

    let row = client
        .query_opt(
            "SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
            &[&schema, &table],
        )
        .await
        .map_err(|e| map_pg_error(&e))?;

    Ok(row.is_some())
}

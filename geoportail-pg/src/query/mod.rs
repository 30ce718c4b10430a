//! Exécution des requêtes spatiales contre PostGIS
//!
//! Le service implémente les traits sources du coeur client: le protocole
//! de visualisation (contrôleur d'emprise, machine de sélection,
//! croisements) tourne indifféremment contre ce backend ou contre un mock.

pub mod addresses;
pub mod parcels;
pub mod proximity;
pub mod roads;
pub mod search;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use geo::Point;

use carto::sources::{AddressSource, ParcelSource, ProximitySource};
use carto::{
    AddressFeature, Bbox, ParcelFeature, ProximityKind, ProximityResult, QueryError,
};

use crate::config::ServiceConfig;
use crate::db::capabilities::Capabilities;

pub use proximity::SchoolHit;
pub use roads::RoadSnap;
pub use search::SearchHit;

/// Service de requêtes spatiales
///
/// Sans état entre les requêtes: le pool de connexions est la seule
/// ressource partagée, chaque requête acquiert une connexion pour la durée
/// de sa transaction et la rend inconditionnellement.
pub struct SpatialQueryService {
    pool: Pool,
    config: ServiceConfig,
    capabilities: Capabilities,
}

impl SpatialQueryService {
    /// Construit le service: valide la configuration et sonde les
    /// capacités optionnelles du schéma (une seule fois)
    pub async fn new(pool: Pool, config: ServiceConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let capabilities = Capabilities::probe(&pool, &config)
            .await
            .map_err(|e| anyhow::anyhow!("Capability probe failed: {e}"))?;

        Ok(Self {
            pool,
            config,
            capabilities,
        })
    }

    /// Construit le service avec des capacités imposées (tests)
    pub fn with_capabilities(pool: Pool, config: ServiceConfig, capabilities: Capabilities) -> Self {
        Self {
            pool,
            config,
            capabilities,
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}

#[async_trait]
impl ParcelSource for SpatialQueryService {
    async fn parcels_in_bbox(
        &self,
        bbox: Bbox,
        zoom: f64,
    ) -> Result<Vec<ParcelFeature>, QueryError> {
        self.query_parcels(bbox, zoom).await
    }
}

#[async_trait]
impl AddressSource for SpatialQueryService {
    async fn addresses_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Vec<AddressFeature>, QueryError> {
        self.query_addresses_for_parcel(parcel_id).await
    }
}

#[async_trait]
impl ProximitySource for SpatialQueryService {
    async fn within_radius(
        &self,
        origin: Point<f64>,
        radius_m: f64,
        kinds: &[ProximityKind],
    ) -> Result<Vec<ProximityResult>, QueryError> {
        match kinds {
            [kind] => {
                self.query_within_radius(origin, radius_m, *kind, self.config.radius_limit)
                    .await
            }
            _ => {
                self.query_nearby(origin, radius_m, kinds, self.config.radius_limit)
                    .await
            }
        }
    }

    async fn nearest(
        &self,
        origin: Point<f64>,
        kind: ProximityKind,
        count: usize,
    ) -> Result<Vec<ProximityResult>, QueryError> {
        match kind {
            ProximityKind::School => {
                let schools = self.query_nearest_schools(origin, count as i64).await?;
                Ok(schools
                    .into_iter()
                    .map(|s| ProximityResult {
                        kind: ProximityKind::School,
                        name: s.name,
                        distance_m: s.distance_m,
                        geometry: s.geometry,
                    })
                    .collect())
            }
            _ => self.query_nearest_poi(origin, kind, count as i64).await,
        }
    }
}

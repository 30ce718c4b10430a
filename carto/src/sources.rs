//! Points de couture entre le coeur du protocole et le transport
//!
//! Le coeur ne connaît ni HTTP ni SQL: il parle à des sources abstraites.
//! Le backend PostGIS les implémente directement, les tests avec des mocks.

use async_trait::async_trait;
use geo::Point;

use crate::error::QueryError;
use crate::types::{AddressFeature, Bbox, ParcelFeature, ProximityKind, ProximityResult};

/// Fournit les parcelles visibles dans une emprise donnée
#[async_trait]
pub trait ParcelSource: Send + Sync {
    /// Parcelles de l'emprise, simplifiées selon le zoom, plafonnées,
    /// ordonnées par surface décroissante
    async fn parcels_in_bbox(
        &self,
        bbox: Bbox,
        zoom: f64,
    ) -> Result<Vec<ParcelFeature>, QueryError>;
}

/// Fournit les adresses rattachées à une parcelle
#[async_trait]
pub trait AddressSource: Send + Sync {
    async fn addresses_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Vec<AddressFeature>, QueryError>;
}

/// Requêtes de proximité
///
/// Deux formes distinctes, pas un simple paramètre: le filtre par rayon
/// (`ST_DWithin` + tri géodésique) et le plus-proche-voisin (`ORDER BY
/// distance LIMIT n`). Leurs résultats divergent près des bords de rayon.
#[async_trait]
pub trait ProximitySource: Send + Sync {
    /// Équipements des catégories demandées dans un rayon, distance croissante
    async fn within_radius(
        &self,
        origin: Point<f64>,
        radius_m: f64,
        kinds: &[ProximityKind],
    ) -> Result<Vec<ProximityResult>, QueryError>;

    /// Les `count` équipements les plus proches, sans filtre de rayon
    async fn nearest(
        &self,
        origin: Point<f64>,
        kind: ProximityKind,
        count: usize,
    ) -> Result<Vec<ProximityResult>, QueryError>;
}

//! Requêtes parcellaires par emprise

use tracing::{debug, info, warn};

use carto::{simplification_tolerance, Bbox, ParcelFeature, QueryError, MIN_ZOOM};

use crate::config::ServiceConfig;
use crate::db::transaction::{query_bounded, BoundedQueryError};
use crate::geojson::parse_geometry;

use super::SpatialQueryService;

impl SpatialQueryService {
    /// Parcelles de l'emprise, simplifiées selon le zoom
    ///
    /// Sous `MIN_ZOOM`, collection vide sans émettre de SQL: l'emprise
    /// couvrirait l'essentiel de la table. Tri par surface décroissante
    /// avant plafonnement: à petit zoom, les grandes parcelles gagnent
    /// la place disponible.
    pub async fn query_parcels(
        &self,
        bbox: Bbox,
        zoom: f64,
    ) -> Result<Vec<ParcelFeature>, QueryError> {
        if zoom < MIN_ZOOM {
            debug!(zoom, "Parcel query refused below minimum zoom");
            return Ok(Vec::new());
        }

        let tolerance = simplification_tolerance(zoom);

        if self.capabilities().has_parcel_attributes() {
            match self.query_parcels_tier(bbox, tolerance, true).await {
                Ok(parcels) => return Ok(parcels),
                Err(e) => {
                    // Repli à un seul étage: requête basique dans une
                    // transaction neuve, puis on abandonne
                    if e.missing_relation {
                        self.capabilities().demote_parcel_attributes();
                    }
                    info!(error = %e.error, "Enhanced parcel query failed, retrying basic query");
                }
            }
        }

        self.query_parcels_tier(bbox, tolerance, false)
            .await
            .map_err(QueryError::from)
    }

    async fn query_parcels_tier(
        &self,
        bbox: Bbox,
        tolerance: f64,
        enhanced: bool,
    ) -> Result<Vec<ParcelFeature>, BoundedQueryError> {
        let sql = build_parcels_sql(self.config(), enhanced);

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[
                &bbox.min_x,
                &bbox.min_y,
                &bbox.max_x,
                &bbox.max_y,
                &tolerance,
                &self.config().max_features,
            ],
        )
        .await?;

        let mut parcels = Vec::with_capacity(rows.len());
        for row in rows {
            let parcel_id: i64 = row.get("parcelle_id");
            let Some(raw_geom) = row.get::<_, Option<String>>("geom") else {
                warn!(parcel_id, "Parcel without geometry skipped");
                continue;
            };
            match parse_geometry(&raw_geom) {
                Ok(geometry) => parcels.push(ParcelFeature {
                    parcel_id,
                    kind: row.get("type"),
                    geometry,
                }),
                Err(e) => warn!(parcel_id, error = %e, "Unreadable parcel geometry skipped"),
            }
        }

        Ok(parcels)
    }
}

fn build_parcels_sql(config: &ServiceConfig, enhanced: bool) -> String {
    let parcels = config.qualified(&config.tables.parcels);

    if enhanced {
        let attributes = config.qualified(&config.tables.parcel_attributes);
        format!(
            "SELECT p.parcelle_id, attrs.categorie AS type, \
             ST_AsGeoJSON(ST_SimplifyPreserveTopology(p.geometry, $5)) AS geom \
             FROM {parcels} p \
             LEFT JOIN {attributes} attrs ON attrs.parcelle_id = p.parcelle_id \
             WHERE p.geometry && ST_MakeEnvelope($1, $2, $3, $4, 4326) \
             ORDER BY ST_Area(p.geometry) DESC \
             LIMIT $6"
        )
    } else {
        format!(
            "SELECT p.parcelle_id, NULL::text AS type, \
             ST_AsGeoJSON(ST_SimplifyPreserveTopology(p.geometry, $5)) AS geom \
             FROM {parcels} p \
             WHERE p.geometry && ST_MakeEnvelope($1, $2, $3, $4, 4326) \
             ORDER BY ST_Area(p.geometry) DESC \
             LIMIT $6"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhanced_sql_joins_attribute_table() {
        let sql = build_parcels_sql(&ServiceConfig::default(), true);
        assert!(sql.contains("LEFT JOIN geoportail.parcelles_attributs"));
        assert!(sql.contains("ORDER BY ST_Area(p.geometry) DESC"));
        assert!(sql.contains("LIMIT $6"));
    }

    #[test]
    fn test_basic_sql_has_no_join() {
        let sql = build_parcels_sql(&ServiceConfig::default(), false);
        assert!(!sql.contains("JOIN"));
        assert!(sql.contains("ST_SimplifyPreserveTopology"));
        assert!(sql.contains("ST_MakeEnvelope($1, $2, $3, $4, 4326)"));
    }
}

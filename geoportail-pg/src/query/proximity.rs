//! Requêtes de proximité: rayon géodésique et plus-proches-voisins
//!
//! Deux formes de requête distinctes, volontairement non unifiées:
//! `ST_DWithin` sur geography filtre par rayon, `ORDER BY geometry <->
//! point` exploite l'index KNN sans rayon. Près des bords de rayon leurs
//! résultats divergent sous distorsion de projection — l'une ne remplace
//! pas l'autre.

use geo::Point;
use geojson::Geometry;
use tokio_postgres::Row;
use tracing::warn;

use carto::{ProximityKind, ProximityResult, QueryError};

use crate::db::transaction::query_bounded;
use crate::geojson::parse_geometry;

use super::SpatialQueryService;

/// École avec son adresse source (flux `nearest-5-schools`)
#[derive(Debug, Clone)]
pub struct SchoolHit {
    pub name: String,
    pub address: Option<String>,
    pub distance_m: f64,
    pub geometry: Geometry,
}

impl SpatialQueryService {
    /// Les `count` écoles les plus proches (KNN, sans filtre de rayon)
    ///
    /// Le tri KNN court sur l'index géométrique; la distance rendue est
    /// recalculée en géographie (mètres géodésiques).
    pub async fn query_nearest_schools(
        &self,
        origin: Point<f64>,
        count: i64,
    ) -> Result<Vec<SchoolHit>, QueryError> {
        validate_origin(origin)?;

        let schools = self.config().qualified(&self.config().tables.schools);
        let sql = format!(
            "SELECT nom, adresse, ST_AsGeoJSON(geometry) AS geom, \
             ST_Distance(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS dist_m \
             FROM {schools} \
             ORDER BY geometry <-> ST_SetSRID(ST_MakePoint($1, $2), 4326) \
             LIMIT $3"
        );

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[&origin.x(), &origin.y(), &count],
        )
        .await
        .map_err(QueryError::from)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.get("nom");
            let raw_geom: Option<String> = row.get("geom");
            let Some(raw_geom) = raw_geom else {
                warn!(name = name.as_str(), "School without geometry skipped");
                continue;
            };
            match parse_geometry(&raw_geom) {
                Ok(geometry) => hits.push(SchoolHit {
                    name,
                    address: row.get("adresse"),
                    distance_m: row.get("dist_m"),
                    geometry,
                }),
                Err(e) => warn!(name = name.as_str(), error = %e, "Unreadable school geometry skipped"),
            }
        }
        Ok(hits)
    }

    /// Équipements d'une catégorie dans un rayon, distance croissante
    pub async fn query_within_radius(
        &self,
        origin: Point<f64>,
        radius_m: f64,
        kind: ProximityKind,
        limit: i64,
    ) -> Result<Vec<ProximityResult>, QueryError> {
        validate_origin(origin)?;
        validate_radius(radius_m)?;

        let config = self.config();
        // Les couches écoles et bibliothèques sont des tables dédiées;
        // les autres catégories vivent dans la table POI
        let sql = match kind {
            ProximityKind::School => radius_sql_dedicated(&config.qualified(&config.tables.schools)),
            ProximityKind::Library => {
                radius_sql_dedicated(&config.qualified(&config.tables.libraries))
            }
            _ => {
                return self
                    .query_nearby(origin, radius_m, &[kind], limit)
                    .await
            }
        };

        let rows = query_bounded(
            self.pool(),
            config.statement_timeout_ms,
            &sql,
            &[&origin.x(), &origin.y(), &radius_m, &limit],
        )
        .await
        .map_err(QueryError::from)?;

        Ok(rows
            .iter()
            .filter_map(|row| proximity_from_row(row, kind))
            .collect())
    }

    /// POI multi-catégories dans un rayon (flux `/nearby`)
    pub async fn query_nearby(
        &self,
        origin: Point<f64>,
        radius_m: f64,
        kinds: &[ProximityKind],
        limit: i64,
    ) -> Result<Vec<ProximityResult>, QueryError> {
        validate_origin(origin)?;
        validate_radius(radius_m)?;
        if kinds.is_empty() {
            return Err(QueryError::invalid_input("at least one kind is required"));
        }

        let poi = self.config().qualified(&self.config().tables.poi);
        let sql = format!(
            "SELECT categorie, nom, ST_AsGeoJSON(geometry) AS geom, \
             ST_Distance(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS dist_m \
             FROM {poi} \
             WHERE categorie = ANY($3) \
             AND ST_DWithin(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $4) \
             ORDER BY dist_m ASC \
             LIMIT $5"
        );

        let kind_codes: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[&origin.x(), &origin.y(), &kind_codes, &radius_m, &limit],
        )
        .await
        .map_err(QueryError::from)?;

        Ok(rows.iter().filter_map(poi_from_row).collect())
    }

    /// KNN générique sur la table POI pour les catégories sans table dédiée
    pub(super) async fn query_nearest_poi(
        &self,
        origin: Point<f64>,
        kind: ProximityKind,
        count: i64,
    ) -> Result<Vec<ProximityResult>, QueryError> {
        validate_origin(origin)?;

        let poi = self.config().qualified(&self.config().tables.poi);
        let sql = format!(
            "SELECT categorie, nom, ST_AsGeoJSON(geometry) AS geom, \
             ST_Distance(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS dist_m \
             FROM {poi} \
             WHERE categorie = $3 \
             ORDER BY geometry <-> ST_SetSRID(ST_MakePoint($1, $2), 4326) \
             LIMIT $4"
        );

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[&origin.x(), &origin.y(), &kind.as_str(), &count],
        )
        .await
        .map_err(QueryError::from)?;

        Ok(rows.iter().filter_map(poi_from_row).collect())
    }
}

fn radius_sql_dedicated(table: &str) -> String {
    format!(
        "SELECT nom, ST_AsGeoJSON(geometry) AS geom, \
         ST_Distance(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography) AS dist_m \
         FROM {table} \
         WHERE ST_DWithin(geometry::geography, ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography, $3) \
         ORDER BY dist_m ASC \
         LIMIT $4"
    )
}

fn proximity_from_row(row: &Row, kind: ProximityKind) -> Option<ProximityResult> {
    let name: String = row.get("nom");
    let raw_geom: Option<String> = row.get("geom");

    match raw_geom.as_deref().map(parse_geometry) {
        Some(Ok(geometry)) => Some(ProximityResult {
            kind,
            name,
            distance_m: row.get("dist_m"),
            geometry,
        }),
        _ => {
            warn!(name = name.as_str(), "Amenity with unreadable geometry skipped");
            None
        }
    }
}

fn poi_from_row(row: &Row) -> Option<ProximityResult> {
    let categorie: String = row.get("categorie");
    let kind = match categorie.parse::<ProximityKind>() {
        Ok(kind) => kind,
        Err(_) => {
            warn!(categorie = categorie.as_str(), "Unknown POI category skipped");
            return None;
        }
    };
    proximity_from_row(row, kind)
}

/// Coordonnée finie et dans les bornes lon/lat
pub(super) fn validate_origin(origin: Point<f64>) -> Result<(), QueryError> {
    let (lng, lat) = (origin.x(), origin.y());
    if !lng.is_finite() || !lat.is_finite() {
        return Err(QueryError::invalid_input("lat and lng must be finite"));
    }
    if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(QueryError::invalid_input("lat/lng out of range"));
    }
    Ok(())
}

fn validate_radius(radius_m: f64) -> Result<(), QueryError> {
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Err(QueryError::invalid_input("radius must be a positive number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_origin() {
        assert!(validate_origin(Point::new(-79.38, 43.65)).is_ok());
        assert!(validate_origin(Point::new(f64::NAN, 43.65)).is_err());
        assert!(validate_origin(Point::new(-79.38, 91.0)).is_err());
        assert!(validate_origin(Point::new(181.0, 43.65)).is_err());
    }

    #[test]
    fn test_validate_radius() {
        assert!(validate_radius(2000.0).is_ok());
        assert!(validate_radius(0.0).is_err());
        assert!(validate_radius(-5.0).is_err());
        assert!(validate_radius(f64::INFINITY).is_err());
    }

    #[test]
    fn test_dedicated_radius_sql_shape() {
        let sql = radius_sql_dedicated("geoportail.ecoles");
        assert!(sql.contains("ST_DWithin"));
        assert!(sql.contains("::geography"));
        assert!(sql.contains("ORDER BY dist_m ASC"));
    }
}

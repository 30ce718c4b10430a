//! Accrochage d'un point à la voirie

use geo::Point;
use geojson::Geometry;
use tracing::warn;

use carto::QueryError;

use crate::db::transaction::query_bounded;
use crate::geojson::parse_geometry;

use super::proximity::validate_origin;
use super::SpatialQueryService;

/// Projection d'un point sur la voie la plus proche
#[derive(Debug, Clone)]
pub struct RoadSnap {
    pub street: Option<String>,
    pub distance_m: f64,
    /// Point projeté sur l'axe de la voie
    pub snap: Geometry,
    /// Segment entre le point d'origine et sa projection
    pub offset_line: Geometry,
}

impl SpatialQueryService {
    /// Voie la plus proche et projection du point sur son axe
    pub async fn query_snap_to_road(
        &self,
        origin: Point<f64>,
    ) -> Result<Vec<RoadSnap>, QueryError> {
        validate_origin(origin)?;

        let roads = self.config().qualified(&self.config().tables.roads);
        let sql = format!(
            "WITH pt AS (SELECT ST_SetSRID(ST_MakePoint($1, $2), 4326) AS g) \
             SELECT v.nom AS street, \
             ST_Distance(v.geometry::geography, pt.g::geography) AS dist_m, \
             ST_AsGeoJSON(ST_ClosestPoint(v.geometry, pt.g)) AS snap, \
             ST_AsGeoJSON(ST_MakeLine(pt.g, ST_ClosestPoint(v.geometry, pt.g))) AS offset_line \
             FROM {roads} v, pt \
             ORDER BY v.geometry <-> pt.g \
             LIMIT 1"
        );

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[&origin.x(), &origin.y()],
        )
        .await
        .map_err(QueryError::from)?;

        let mut snaps = Vec::with_capacity(rows.len());
        for row in rows {
            let street: Option<String> = row.get("street");
            let raw_snap: Option<String> = row.get("snap");
            let raw_line: Option<String> = row.get("offset_line");

            let (Some(raw_snap), Some(raw_line)) = (raw_snap, raw_line) else {
                warn!(street = ?street, "Road snap without geometry skipped");
                continue;
            };
            match (parse_geometry(&raw_snap), parse_geometry(&raw_line)) {
                (Ok(snap), Ok(offset_line)) => snaps.push(RoadSnap {
                    street,
                    distance_m: row.get("dist_m"),
                    snap,
                    offset_line,
                }),
                _ => warn!(street = ?street, "Unreadable road snap geometry skipped"),
            }
        }
        Ok(snaps)
    }
}

//! Requêtes d'adresses: par parcelle ou par emprise

use tokio_postgres::Row;
use tracing::{debug, info, warn};

use carto::{AddressFeature, Bbox, QueryError, MIN_ZOOM};

use crate::config::ServiceConfig;
use crate::db::transaction::{query_bounded, BoundedQueryError};
use crate::geojson::parse_geometry;

use super::SpatialQueryService;

const ADDRESS_COLUMNS: &str =
    "a.adresse_id, a.numero, a.voie, a.adresse_complete, ST_AsGeoJSON(a.geometry) AS geom";

impl SpatialQueryService {
    /// Adresses rattachées à une parcelle
    ///
    /// Pas de garde de zoom ici: le volume est borné par la parcelle.
    /// Jointure précalculée quand la table de rattachement existe, repli
    /// sur la jointure spatiale sinon.
    pub async fn query_addresses_for_parcel(
        &self,
        parcel_id: i64,
    ) -> Result<Vec<AddressFeature>, QueryError> {
        if self.capabilities().has_address_parcel_link() {
            match self.query_addresses_for_parcel_tier(parcel_id, true).await {
                Ok(addresses) => return Ok(addresses),
                Err(e) => {
                    if e.missing_relation {
                        self.capabilities().demote_address_parcel_link();
                    }
                    info!(error = %e.error, "Linked address query failed, retrying spatial join");
                }
            }
        }

        self.query_addresses_for_parcel_tier(parcel_id, false)
            .await
            .map_err(QueryError::from)
    }

    async fn query_addresses_for_parcel_tier(
        &self,
        parcel_id: i64,
        linked: bool,
    ) -> Result<Vec<AddressFeature>, BoundedQueryError> {
        let sql = build_parcel_addresses_sql(self.config(), linked);
        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[&parcel_id],
        )
        .await?;

        Ok(rows.iter().filter_map(address_from_row).collect())
    }

    /// Adresses dans une emprise
    ///
    /// Sous `MIN_ZOOM`: collection vide sans SQL, en silence (200, pas
    /// d'erreur) — comportement observé, asymétrique avec `/parcels`.
    pub async fn query_addresses_in_bbox(
        &self,
        bbox: Bbox,
        zoom: f64,
    ) -> Result<Vec<AddressFeature>, QueryError> {
        if zoom < MIN_ZOOM {
            debug!(zoom, "Bbox address query refused below minimum zoom");
            return Ok(Vec::new());
        }

        let addresses = self.config().qualified(&self.config().tables.addresses);
        let sql = format!(
            "SELECT {ADDRESS_COLUMNS} \
             FROM {addresses} a \
             WHERE a.geometry && ST_MakeEnvelope($1, $2, $3, $4, 4326) \
             ORDER BY a.adresse_id \
             LIMIT $5"
        );

        let rows = query_bounded(
            self.pool(),
            self.config().statement_timeout_ms,
            &sql,
            &[
                &bbox.min_x,
                &bbox.min_y,
                &bbox.max_x,
                &bbox.max_y,
                &self.config().max_features,
            ],
        )
        .await
        .map_err(QueryError::from)?;

        Ok(rows.iter().filter_map(address_from_row).collect())
    }

    /// Parcelle de rattachement d'une adresse
    pub async fn query_parcel_for_address(&self, address_id: i64) -> Result<i64, QueryError> {
        if self.capabilities().has_address_parcel_link() {
            match self.query_parcel_for_address_tier(address_id, true).await {
                Ok(found) => return found.ok_or(QueryError::NotFound),
                Err(e) => {
                    if e.missing_relation {
                        self.capabilities().demote_address_parcel_link();
                    }
                    info!(error = %e.error, "Linked parcel lookup failed, retrying spatial join");
                }
            }
        }

        self.query_parcel_for_address_tier(address_id, false)
            .await
            .map_err(QueryError::from)?
            .ok_or(QueryError::NotFound)
    }

    async fn query_parcel_for_address_tier(
        &self,
        address_id: i64,
        linked: bool,
    ) -> Result<Option<i64>, BoundedQueryError> {
        let config = self.config();
        let sql = if linked {
            let link = config.qualified(&config.tables.address_parcel_link);
            format!("SELECT parcelle_id FROM {link} WHERE adresse_id = $1 LIMIT 1")
        } else {
            let parcels = config.qualified(&config.tables.parcels);
            let addresses = config.qualified(&config.tables.addresses);
            format!(
                "SELECT p.parcelle_id \
                 FROM {parcels} p \
                 JOIN {addresses} a ON ST_Intersects(p.geometry, a.geometry) \
                 WHERE a.adresse_id = $1 \
                 LIMIT 1"
            )
        };

        let rows = query_bounded(
            self.pool(),
            config.statement_timeout_ms,
            &sql,
            &[&address_id],
        )
        .await?;

        Ok(rows.first().map(|row| row.get("parcelle_id")))
    }
}

fn build_parcel_addresses_sql(config: &ServiceConfig, linked: bool) -> String {
    let addresses = config.qualified(&config.tables.addresses);

    if linked {
        let link = config.qualified(&config.tables.address_parcel_link);
        format!(
            "SELECT {ADDRESS_COLUMNS} \
             FROM {addresses} a \
             JOIN {link} l ON l.adresse_id = a.adresse_id \
             WHERE l.parcelle_id = $1 \
             ORDER BY a.adresse_id"
        )
    } else {
        let parcels = config.qualified(&config.tables.parcels);
        format!(
            "SELECT {ADDRESS_COLUMNS} \
             FROM {addresses} a \
             JOIN {parcels} p ON ST_Intersects(p.geometry, a.geometry) \
             WHERE p.parcelle_id = $1 \
             ORDER BY a.adresse_id"
        )
    }
}

fn address_from_row(row: &Row) -> Option<AddressFeature> {
    let address_point_id: i64 = row.get("adresse_id");
    let raw_geom: Option<String> = row.get("geom");

    let Some(raw_geom) = raw_geom else {
        warn!(address_point_id, "Address without geometry skipped");
        return None;
    };

    match parse_geometry(&raw_geom) {
        Ok(geometry) => Some(AddressFeature {
            address_point_id,
            civic_number: row.get("numero"),
            street_name: row.get("voie"),
            full_address: row.get("adresse_complete"),
            geometry,
        }),
        Err(e) => {
            warn!(address_point_id, error = %e, "Unreadable address geometry skipped");
            None
        }
    }
}

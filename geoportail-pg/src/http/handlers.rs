//! Handlers de l'API de consultation
//!
//! Toute géométrie sort en GeoJSON, coordonnées `[longitude, latitude]`.
//! Les erreurs suivent l'enveloppe `{"error": ...}` (voir `error.rs`).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use carto::aggregator::CrossReferenceAggregator;
use carto::aggregator::NEAREST_SCHOOLS_COUNT;
use carto::{ProximityKind, QueryError, MIN_ZOOM};

use crate::error::ApiError;
use crate::geojson::{address_collection, parcel_collection};
use crate::query::{SearchHit, SpatialQueryService};

/// Zoom implicite quand `z` est absent
const DEFAULT_ZOOM: f64 = 12.0;

/// Rayon implicite du flux `/nearby` (mètres)
const DEFAULT_NEARBY_RADIUS_M: f64 = 2000.0;

type Service = Arc<SpatialQueryService>;

#[derive(Debug, Deserialize)]
pub struct ParcelsQuery {
    bbox: Option<String>,
    z: Option<String>,
}

/// `GET /parcels?bbox=minX,minY,maxX,maxY&z=15`
pub async fn parcels(
    State(service): State<Service>,
    Query(query): Query<ParcelsQuery>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    let Some(raw_bbox) = query.bbox.as_deref() else {
        return Err(ApiError::bad_request(
            "bbox parameter is required (minX,minY,maxX,maxY)",
        ));
    };
    let bbox = super::params::parse_bbox(raw_bbox)?;
    let zoom = super::params::parse_zoom(query.z.as_deref(), DEFAULT_ZOOM)?;

    if zoom < MIN_ZOOM {
        return Err(ApiError::bad_request("Zoom in to load parcels"));
    }

    let parcels = service.query_parcels(bbox, zoom).await?;
    Ok(Json(parcel_collection(parcels)))
}

#[derive(Debug, Deserialize)]
pub struct AddressesQuery {
    parcel_id: Option<String>,
    bbox: Option<String>,
    z: Option<String>,
}

/// `GET /addresses?parcel_id=` ou `GET /addresses?bbox=&z=`
///
/// En mode emprise, un zoom sous le seuil rend une collection vide (200),
/// là où `/parcels` répond 400: asymétrie du comportement observé,
/// conservée telle quelle.
pub async fn addresses(
    State(service): State<Service>,
    Query(query): Query<AddressesQuery>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    match (query.parcel_id.as_deref(), query.bbox.as_deref()) {
        // parcel_id prioritaire si les deux modes sont fournis
        (Some(raw_id), _) => {
            let parcel_id = super::params::parse_id(raw_id, "parcel_id")?;
            let addresses = service.query_addresses_for_parcel(parcel_id).await?;
            Ok(Json(address_collection(addresses)))
        }
        (None, Some(raw_bbox)) => {
            let bbox = super::params::parse_bbox(raw_bbox)?;
            let zoom = super::params::parse_zoom(query.z.as_deref(), DEFAULT_ZOOM)?;
            let addresses = service.query_addresses_in_bbox(bbox, zoom).await?;
            Ok(Json(address_collection(addresses)))
        }
        (None, None) => Err(ApiError::bad_request(
            "parcel_id or bbox parameter is required",
        )),
    }
}

/// `GET /parcel/{id}/addresses`
pub async fn parcel_addresses(
    State(service): State<Service>,
    Path(id): Path<String>,
) -> Result<Json<geojson::FeatureCollection>, ApiError> {
    let parcel_id = super::params::parse_id(&id, "parcel id")?;
    let addresses = service.query_addresses_for_parcel(parcel_id).await?;
    Ok(Json(address_collection(addresses)))
}

/// `GET /address/{id}/parcel`
pub async fn address_parcel(
    State(service): State<Service>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let address_id = super::params::parse_id(&id, "address id")?;
    let parcel_id = service.query_parcel_for_address(address_id).await?;
    Ok(Json(json!({ "parcelId": parcel_id })))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
    limit: Option<String>,
}

/// `GET /search?q=&limit=`
pub async fn search(
    State(service): State<Service>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, ApiError> {
    let q = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let Some(q) = q else {
        return Err(ApiError::bad_request("q (query) parameter is required"));
    };

    let limit = super::params::parse_limit(
        query.limit.as_deref(),
        service.config().default_search_limit,
    )?;

    Ok(Json(service.query_search(q, limit).await?))
}

#[derive(Debug, Deserialize)]
pub struct CoordinatesQuery {
    lat: Option<String>,
    lng: Option<String>,
    radius: Option<String>,
}

/// `GET /nearest-5-schools?lat=&lng=`
pub async fn nearest_schools(
    State(service): State<Service>,
    Query(query): Query<CoordinatesQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    let origin = super::params::parse_coordinates(query.lat.as_deref(), query.lng.as_deref())?;

    let schools = service
        .query_nearest_schools(origin, NEAREST_SCHOOLS_COUNT as i64)
        .await?;

    let body = schools
        .into_iter()
        .map(|school| {
            json!({
                "name": school.name,
                "geom_geojson": school.geometry,
                "address_full": school.address,
                "dist_m": school.distance_m,
            })
        })
        .collect();

    Ok(Json(body))
}

/// `GET /libraries-and-schools-within-2km?lat=&lng=`
///
/// Les deux branches partent en parallèle via l'agrégateur du coeur
/// client; un échec ne vide que sa catégorie, signalé dans `errors`.
pub async fn libraries_and_schools(
    State(service): State<Service>,
    Query(query): Query<CoordinatesQuery>,
) -> Result<Json<Value>, ApiError> {
    let origin = super::params::parse_coordinates(query.lat.as_deref(), query.lng.as_deref())?;

    let aggregator = CrossReferenceAggregator::new(Arc::clone(&service));
    let result = aggregator.cross_reference_at(origin).await;

    let mut errors = Map::new();
    let schools = unwrap_branch(result.schools, "schools", &mut errors);
    let libraries = unwrap_branch(result.libraries, "libraries", &mut errors);

    let mut body = json!({
        "schools": schools,
        "libraries": libraries,
    });
    if !errors.is_empty() {
        body["errors"] = Value::Object(errors);
    }

    Ok(Json(body))
}

fn unwrap_branch(
    branch: Result<Vec<carto::ProximityResult>, QueryError>,
    name: &str,
    errors: &mut Map<String, Value>,
) -> Vec<Value> {
    match branch {
        Ok(results) => results.into_iter().map(amenity_json).collect(),
        Err(e) => {
            errors.insert(name.to_string(), Value::String(ApiError::from(e).message));
            Vec::new()
        }
    }
}

fn amenity_json(result: carto::ProximityResult) -> Value {
    json!({
        "type": result.kind,
        "name": result.name,
        "dist_m": result.distance_m,
        "geom_geojson": result.geometry,
    })
}

/// `GET /nearby?lat=&lng=&radius=`
pub async fn nearby(
    State(service): State<Service>,
    Query(query): Query<CoordinatesQuery>,
) -> Result<Json<Value>, ApiError> {
    let origin = super::params::parse_coordinates(query.lat.as_deref(), query.lng.as_deref())?;
    let radius = super::params::parse_radius(query.radius.as_deref(), DEFAULT_NEARBY_RADIUS_M)?;

    let results = service
        .query_nearby(
            origin,
            radius,
            ProximityKind::all(),
            service.config().nearby_limit,
        )
        .await?;

    let nearby: Vec<Value> = results
        .into_iter()
        .map(|result| {
            json!({
                "type": result.kind,
                "name": result.name,
                "distance_m": result.distance_m,
                "geom_geojson": result.geometry,
            })
        })
        .collect();

    Ok(Json(json!({ "nearby": nearby })))
}

/// `GET /snap-to-road?lat=&lng=`
pub async fn snap_to_road(
    State(service): State<Service>,
    Query(query): Query<CoordinatesQuery>,
) -> Result<Json<Value>, ApiError> {
    let origin = super::params::parse_coordinates(query.lat.as_deref(), query.lng.as_deref())?;

    let snaps = service.query_snap_to_road(origin).await?;

    let snap: Vec<Value> = snaps
        .into_iter()
        .map(|s| {
            json!({
                "street": s.street,
                "dist_m": s.distance_m,
                "snap_geojson": s.snap,
                "offset_line_geojson": s.offset_line,
            })
        })
        .collect();

    Ok(Json(json!({ "snap": snap })))
}

/// `GET /db` — sonde de santé chronométrée
pub async fn db_health(State(service): State<Service>) -> Result<Json<Value>, ApiError> {
    let elapsed = crate::db::pool::ping(service.pool()).await?;
    Ok(Json(json!({
        "ok": true,
        "dbTimeMs": elapsed.as_secs_f64() * 1000.0,
    })))
}

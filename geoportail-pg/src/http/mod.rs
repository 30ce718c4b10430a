//! Routage HTTP de l'API de consultation

pub mod handlers;
pub mod params;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

use crate::query::SpatialQueryService;

/// Construit le routeur de l'API
pub fn router(service: Arc<SpatialQueryService>) -> Router {
    Router::new()
        .route("/parcels", get(handlers::parcels))
        .route("/addresses", get(handlers::addresses))
        .route("/parcel/{id}/addresses", get(handlers::parcel_addresses))
        .route("/address/{id}/parcel", get(handlers::address_parcel))
        .route("/search", get(handlers::search))
        .route("/nearest-5-schools", get(handlers::nearest_schools))
        .route(
            "/libraries-and-schools-within-2km",
            get(handlers::libraries_and_schools),
        )
        .route("/nearby", get(handlers::nearby))
        .route("/snap-to-road", get(handlers::snap_to_road))
        .route("/db", get(handlers::db_health))
        .with_state(service)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
}

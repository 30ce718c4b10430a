//! Validation des paramètres de requête
//!
//! Les paramètres arrivent en chaînes brutes: l'extracteur typé d'axum
//! rejetterait avec sa propre enveloppe d'erreur, alors que l'API promet
//! des 400 au format `{"error": ...}` avec des messages précis.

use geo::Point;

use carto::{Bbox, QueryError};

/// Parse `minX,minY,maxX,maxY`
pub fn parse_bbox(raw: &str) -> Result<Bbox, QueryError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(QueryError::invalid_input(
            "bbox must be minX,minY,maxX,maxY",
        ));
    }

    let mut values = [0.0_f64; 4];
    for (i, part) in parts.iter().enumerate() {
        values[i] = part.parse().map_err(|_| {
            QueryError::invalid_input(format!("invalid bbox coordinate: {part}"))
        })?;
    }

    Bbox::new(values[0], values[1], values[2], values[3])
}

/// Parse le zoom, avec défaut
pub fn parse_zoom(raw: Option<&str>, default: f64) -> Result<f64, QueryError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let zoom: f64 = raw
        .trim()
        .parse()
        .map_err(|_| QueryError::invalid_input(format!("invalid zoom: {raw}")))?;
    if !zoom.is_finite() {
        return Err(QueryError::invalid_input("zoom must be finite"));
    }
    Ok(zoom)
}

/// Parse le couple lat/lng obligatoire, rendu en `Point(lon, lat)`
pub fn parse_coordinates(lat: Option<&str>, lng: Option<&str>) -> Result<Point<f64>, QueryError> {
    let (Some(lat), Some(lng)) = (lat, lng) else {
        return Err(QueryError::invalid_input(
            "lat and lng parameters are required",
        ));
    };

    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| QueryError::invalid_input(format!("invalid lat: {lat}")))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| QueryError::invalid_input(format!("invalid lng: {lng}")))?;

    if !lat.is_finite() || !lng.is_finite() {
        return Err(QueryError::invalid_input("lat and lng must be finite"));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(QueryError::invalid_input("lat/lng out of range"));
    }

    Ok(Point::new(lng, lat))
}

/// Parse un identifiant entier
pub fn parse_id(raw: &str, name: &str) -> Result<i64, QueryError> {
    raw.trim()
        .parse()
        .map_err(|_| QueryError::invalid_input(format!("invalid {name}")))
}

/// Parse la limite de résultats, bornée à `[1, 100]`
pub fn parse_limit(raw: Option<&str>, default: i64) -> Result<i64, QueryError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let limit: i64 = raw
        .trim()
        .parse()
        .map_err(|_| QueryError::invalid_input(format!("invalid limit: {raw}")))?;
    Ok(limit.clamp(1, 100))
}

/// Parse le rayon en mètres, avec défaut
pub fn parse_radius(raw: Option<&str>, default: f64) -> Result<f64, QueryError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let radius: f64 = raw
        .trim()
        .parse()
        .map_err(|_| QueryError::invalid_input(format!("invalid radius: {raw}")))?;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(QueryError::invalid_input("radius must be a positive number"));
    }
    Ok(radius)
}

//! Types de données partagés du protocole de visualisation

use std::fmt;
use std::str::FromStr;

use geojson::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::QueryError;

/// Zoom minimal pour les requêtes par emprise (parcelles, adresses en mode bbox)
///
/// Sous ce seuil aucune requête n'est émise: l'emprise couvrirait trop de
/// lignes pour un scan indexé raisonnable.
pub const MIN_ZOOM: f64 = 10.0;

/// Zoom maximal supporté par la carte
pub const MAX_ZOOM: f64 = 22.0;

/// Emprise géographique `[minX, minY, maxX, maxY]` en degrés lon/lat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bbox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bbox {
    /// Construit une emprise validée (coordonnées finies, min < max)
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self, QueryError> {
        for v in [min_x, min_y, max_x, max_y] {
            if !v.is_finite() {
                return Err(QueryError::invalid_input("bbox coordinates must be finite"));
            }
        }
        if min_x >= max_x || min_y >= max_y {
            return Err(QueryError::invalid_input(
                "bbox must satisfy minX < maxX and minY < maxY",
            ));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Centre de l'emprise
    pub fn center(&self) -> geo::Point<f64> {
        geo::Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

/// Vue courante de la carte: emprise + zoom
///
/// Dérivée à chaque fin de déplacement/zoom, jamais persistée.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bbox: Bbox,
    pub zoom: f64,
}

impl Viewport {
    /// Construit une vue, zoom borné à `[0, MAX_ZOOM]`
    pub fn new(bbox: Bbox, zoom: f64) -> Self {
        let zoom = if zoom.is_finite() {
            zoom.clamp(0.0, MAX_ZOOM)
        } else {
            0.0
        };
        Self { bbox, zoom }
    }

    /// Vrai si le zoom autorise les requêtes par emprise
    pub fn allows_bbox_queries(&self) -> bool {
        self.zoom >= MIN_ZOOM
    }
}

/// Tolérance de simplification (degrés) en fonction du zoom
///
/// Fonction en escalier, décroissante: simplification grossière aux petits
/// zooms, géométrie quasi exacte aux grands. Les zooms frontière (9, 11,
/// 13, 15) tombent dans le palier le plus fin.
pub fn simplification_tolerance(zoom: f64) -> f64 {
    if zoom < 9.0 {
        0.0003
    } else if zoom < 11.0 {
        0.0001
    } else if zoom < 13.0 {
        0.00005
    } else if zoom < 15.0 {
        0.00002
    } else {
        0.000005
    }
}

/// Parcelle affichable
///
/// Identité = `parcel_id`. Éphémère: entièrement remplacée à chaque
/// changement d'emprise qualifiant, jamais fusionnée avec un fetch
/// précédent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelFeature {
    pub parcel_id: i64,
    /// Catégorie grossière (bâti, non bâti, ...)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub geometry: Geometry,
}

/// Point d'adresse, rattaché à une parcelle ou à une emprise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFeature {
    pub address_point_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub civic_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_address: Option<String>,
    pub geometry: Geometry,
}

impl AddressFeature {
    /// Coordonnée du point d'adresse, si la géométrie est bien un point
    pub fn point(&self) -> Result<geo::Point<f64>, QueryError> {
        match &self.geometry.value {
            geojson::Value::Point(coords)
                if coords.len() >= 2 && coords[0].is_finite() && coords[1].is_finite() =>
            {
                Ok(geo::Point::new(coords[0], coords[1]))
            }
            _ => Err(QueryError::invalid_input(
                "address geometry is not a valid point",
            )),
        }
    }
}

/// Catégories d'équipements de proximité
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProximityKind {
    School,
    Library,
    FireStation,
    PoliceStation,
    Park,
    Transit,
}

impl ProximityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::School => "school",
            Self::Library => "library",
            Self::FireStation => "fire_station",
            Self::PoliceStation => "police_station",
            Self::Park => "park",
            Self::Transit => "transit",
        }
    }

    pub fn all() -> &'static [ProximityKind] {
        &[
            Self::School,
            Self::Library,
            Self::FireStation,
            Self::PoliceStation,
            Self::Park,
            Self::Transit,
        ]
    }
}

impl fmt::Display for ProximityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProximityKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "school" => Ok(Self::School),
            "library" => Ok(Self::Library),
            "fire_station" => Ok(Self::FireStation),
            "police_station" => Ok(Self::PoliceStation),
            "park" => Ok(Self::Park),
            "transit" => Ok(Self::Transit),
            other => Err(QueryError::invalid_input(format!(
                "unknown proximity kind: {other}"
            ))),
        }
    }
}

/// Équipement trouvé par une requête de proximité
///
/// Distances en mètres, calculées sur base géographique (géodésique),
/// jamais planaire. Remplacé en bloc à chaque nouvelle adresse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximityResult {
    #[serde(rename = "type")]
    pub kind: ProximityKind,
    pub name: String,
    #[serde(rename = "distanceMeters")]
    pub distance_m: f64,
    pub geometry: Geometry,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox() -> Bbox {
        Bbox::new(-79.4, 43.6, -79.3, 43.7).unwrap()
    }

    #[test]
    fn test_bbox_rejects_non_finite() {
        assert!(Bbox::new(f64::NAN, 0.0, 1.0, 1.0).is_err());
        assert!(Bbox::new(0.0, f64::INFINITY, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_bbox_rejects_inverted() {
        assert!(Bbox::new(1.0, 0.0, 0.0, 1.0).is_err());
        assert!(Bbox::new(0.0, 1.0, 1.0, 0.0).is_err());
        // Emprise dégénérée (largeur nulle)
        assert!(Bbox::new(1.0, 0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_viewport_clamps_zoom() {
        assert_eq!(Viewport::new(bbox(), -3.0).zoom, 0.0);
        assert_eq!(Viewport::new(bbox(), 25.0).zoom, MAX_ZOOM);
        assert_eq!(Viewport::new(bbox(), f64::NAN).zoom, 0.0);
        assert_eq!(Viewport::new(bbox(), 12.5).zoom, 12.5);
    }

    #[test]
    fn test_tolerance_tiers() {
        assert_eq!(simplification_tolerance(5.0), 0.0003);
        assert_eq!(simplification_tolerance(10.0), 0.0001);
        assert_eq!(simplification_tolerance(12.0), 0.00005);
        assert_eq!(simplification_tolerance(14.0), 0.00002);
        assert_eq!(simplification_tolerance(18.0), 0.000005);
    }

    #[test]
    fn test_tolerance_boundaries_pick_finer_tier() {
        assert_eq!(simplification_tolerance(9.0), 0.0001);
        assert_eq!(simplification_tolerance(11.0), 0.00005);
        assert_eq!(simplification_tolerance(13.0), 0.00002);
        assert_eq!(simplification_tolerance(15.0), 0.000005);
    }

    #[test]
    fn test_tolerance_non_increasing() {
        let mut previous = f64::INFINITY;
        for step in 0..=44 {
            let zoom = f64::from(step) * 0.5;
            let tolerance = simplification_tolerance(zoom);
            assert!(tolerance <= previous, "tolerance increased at zoom {zoom}");
            previous = tolerance;
        }
    }

    #[test]
    fn test_proximity_kind_roundtrip() {
        for kind in ProximityKind::all() {
            assert_eq!(kind.as_str().parse::<ProximityKind>().unwrap(), *kind);
        }
        assert!("cinema".parse::<ProximityKind>().is_err());
    }

    #[test]
    fn test_address_point_extraction() {
        let address = AddressFeature {
            address_point_id: 1,
            civic_number: None,
            street_name: None,
            full_address: None,
            geometry: Geometry::new(geojson::Value::Point(vec![-79.38, 43.65])),
        };
        let point = address.point().unwrap();
        assert_eq!(point.x(), -79.38);
        assert_eq!(point.y(), 43.65);

        let bad = AddressFeature {
            geometry: Geometry::new(geojson::Value::Point(vec![f64::NAN, 43.65])),
            ..address
        };
        assert!(bad.point().is_err());
    }
}

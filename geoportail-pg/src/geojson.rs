//! Enveloppes GeoJSON des réponses API
//!
//! La géométrie sort de la base via `ST_AsGeoJSON`; les propriétés portent
//! les noms de la couche cliente (`parcelId`, `addressPointId`, ...).
//! Ordre des coordonnées: `[longitude, latitude]`, partout.

use geojson::feature::Id;
use geojson::{Feature, FeatureCollection, Geometry};
use serde_json::{Map, Value};

use carto::{AddressFeature, ParcelFeature, QueryError};

/// Parse la sortie de `ST_AsGeoJSON`
pub fn parse_geometry(raw: &str) -> Result<Geometry, QueryError> {
    serde_json::from_str(raw)
        .map_err(|e| QueryError::backend(format!("invalid GeoJSON from database: {e}")))
}

/// Collection de parcelles
pub fn parcel_collection(parcels: Vec<ParcelFeature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: parcels.into_iter().map(parcel_feature).collect(),
        foreign_members: None,
    }
}

fn parcel_feature(parcel: ParcelFeature) -> Feature {
    let mut properties = Map::new();
    properties.insert("parcelId".into(), Value::from(parcel.parcel_id));
    if let Some(kind) = parcel.kind {
        properties.insert("type".into(), Value::String(kind));
    }

    Feature {
        bbox: None,
        geometry: Some(parcel.geometry),
        id: Some(Id::Number(parcel.parcel_id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Collection d'adresses
pub fn address_collection(addresses: Vec<AddressFeature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: addresses.into_iter().map(address_feature).collect(),
        foreign_members: None,
    }
}

fn address_feature(address: AddressFeature) -> Feature {
    let mut properties = Map::new();
    properties.insert(
        "addressPointId".into(),
        Value::from(address.address_point_id),
    );
    if let Some(civic_number) = address.civic_number {
        properties.insert("civicNumber".into(), Value::String(civic_number));
    }
    if let Some(street_name) = address.street_name {
        properties.insert("streetName".into(), Value::String(street_name));
    }
    if let Some(full_address) = address.full_address {
        properties.insert("fullAddress".into(), Value::String(full_address));
    }

    Feature {
        bbox: None,
        geometry: Some(address.geometry),
        id: Some(Id::Number(address.address_point_id.into())),
        properties: Some(properties),
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn polygon() -> Geometry {
        Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![-79.4, 43.6],
            vec![-79.3, 43.6],
            vec![-79.3, 43.7],
            vec![-79.4, 43.6],
        ]]))
    }

    #[test]
    fn test_parse_geometry_accepts_st_asgeojson_output() {
        let geom = parse_geometry(r#"{"type":"Point","coordinates":[-79.38,43.65]}"#).unwrap();
        assert_eq!(geom.value, geojson::Value::Point(vec![-79.38, 43.65]));
    }

    #[test]
    fn test_parse_geometry_rejects_garbage() {
        assert!(parse_geometry("not geojson").is_err());
    }

    #[test]
    fn test_parcel_collection_properties() {
        let collection = parcel_collection(vec![ParcelFeature {
            parcel_id: 42,
            kind: Some("residential".into()),
            geometry: polygon(),
        }]);

        assert_eq!(collection.features.len(), 1);
        let feature = &collection.features[0];
        let props = feature.properties.as_ref().unwrap();
        assert_eq!(props["parcelId"], Value::from(42));
        assert_eq!(props["type"], Value::from("residential"));
        assert_eq!(feature.id, Some(Id::Number(42.into())));
    }

    #[test]
    fn test_address_feature_skips_missing_fields() {
        let collection = address_collection(vec![AddressFeature {
            address_point_id: 7,
            civic_number: None,
            street_name: None,
            full_address: Some("12 Rue des Lilas".into()),
            geometry: Geometry::new(geojson::Value::Point(vec![-79.38, 43.65])),
        }]);

        let props = collection.features[0].properties.as_ref().unwrap();
        assert_eq!(props["addressPointId"], Value::from(7));
        assert_eq!(props["fullAddress"], Value::from("12 Rue des Lilas"));
        assert!(!props.contains_key("civicNumber"));
        assert!(!props.contains_key("streetName"));
    }
}

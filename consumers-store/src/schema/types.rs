//! Type definitions for the water usage schema
//!
//! Tables (see `migrations/`):
//! - `water_usage.consumers (id uuid, name text, location geometry(Point, 4326))`
//! - `water_usage.usages (id, municipal, consumer, consumer_group, year, value numeric)`
//! - `geodata.shapes (id uuid, name text, key text, geom geometry(MultiPolygon, 4326), nuts_key text)`

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A water usage consumer as returned to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Consumer {
    /// Database-generated identifier
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// GeoJSON geometry of the consumer's location
    pub location: serde_json::Value,
}

/// Payload for creating a consumer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsumer {
    pub name: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "long")]
    pub longitude: f64,
}

/// Partial update of a consumer
///
/// The location is only replaced when both coordinates are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, rename = "long")]
    pub longitude: Option<f64>,
}

impl ConsumerUpdate {
    /// Coordinates as `(longitude, latitude)` when both are set
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(long), Some(lat)) => Some((long, lat)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.coordinates().is_none()
    }
}

/// Filter dimensions for listing consumers; absent dimensions do not restrict
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerFilter {
    /// Keep consumers with at least one usage record above this value
    pub usage_above: Option<i64>,
    /// Keep consumers with one of these ids
    pub ids: Option<Vec<Uuid>>,
    /// Keep consumers located inside any of the shapes with these keys
    pub area_keys: Option<Vec<String>>,
}

impl ConsumerFilter {
    pub fn is_unrestricted(&self) -> bool {
        self.usage_above.is_none() && self.ids.is_none() && self.area_keys.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_consumer_field_aliases() {
        let parsed: NewConsumer =
            serde_json::from_str(r#"{"name": "Waterworks", "lat": 52.4, "long": 9.7}"#).unwrap();
        assert_eq!(parsed.name, "Waterworks");
        assert_eq!(parsed.latitude, 52.4);
        assert_eq!(parsed.longitude, 9.7);
    }

    #[test]
    fn test_new_consumer_requires_coordinates() {
        let parsed = serde_json::from_str::<NewConsumer>(r#"{"name": "Waterworks"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_update_coordinates_need_both_values() {
        let update: ConsumerUpdate = serde_json::from_str(r#"{"lat": 52.4}"#).unwrap();
        assert_eq!(update.coordinates(), None);
        assert!(update.is_empty());

        let update: ConsumerUpdate = serde_json::from_str(r#"{"lat": 52.4, "long": 9.7}"#).unwrap();
        assert_eq!(update.coordinates(), Some((9.7, 52.4)));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_filter_unrestricted() {
        assert!(ConsumerFilter::default().is_unrestricted());
        let filter = ConsumerFilter {
            usage_above: Some(100),
            ..Default::default()
        };
        assert!(!filter.is_unrestricted());
    }
}

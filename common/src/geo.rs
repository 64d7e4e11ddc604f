use serde::{Deserialize, Serialize};

use crate::error::{self, AddCode};

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// GeoJSON point, coordinates stored as `[longitude, latitude]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> error::Result<Self> {
        if !(-90.0..=90.0).contains(&lat) || lat.is_nan() {
            return Err(anyhow::anyhow!("lat: must be between -90 and 90").code(400));
        }
        if !(-180.0..=180.0).contains(&lng) || lng.is_nan() {
            return Err(anyhow::anyhow!("lng: must be between -180 and 180").code(400));
        }
        Ok(Self {
            kind: "Point".to_string(),
            coordinates: [lng, lat],
        })
    }

    pub fn zeroed() -> Self {
        Self {
            kind: "Point".to_string(),
            coordinates: [0.0, 0.0],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    /// Great-circle distance in metres.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat().to_radians(), other.lat().to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.lng() - self.lng()).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
    }
}

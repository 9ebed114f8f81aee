//! Great-circle distance and coordinate validation.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Accepts a position only if both parts are finite and in range.
///
/// Exactly (0, 0) is rejected as well: trackers report it when they have no
/// fix. This also drops genuine readings at the equator/prime-meridian
/// crossing, a known approximation kept for compatibility with stored data.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<Coordinates, EngineError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(EngineError::invalid("non-finite coordinate"));
    }
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(EngineError::invalid(format!("latitude {latitude} out of range")));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(EngineError::invalid(format!("longitude {longitude} out of range")));
    }
    if latitude == 0.0 && longitude == 0.0 {
        return Err(EngineError::invalid("null island (0, 0) position"));
    }
    Ok(Coordinates::new(latitude, longitude))
}

/// Haversine distance in meters on a sphere of radius [`EARTH_RADIUS_KM`].
pub fn haversine_meters(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = (to.latitude - from.latitude).to_radians();
    let dlon = (to.longitude - from.longitude).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * 1000.0 * c
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

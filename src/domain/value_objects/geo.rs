//! Geographic coordinates and great-circle distance.

use std::f64::consts::{FRAC_PI_2, PI};

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Builds a point only when both coordinates are known.
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        Some(Self::new(latitude?, longitude?))
    }

    /// Great-circle distance to `other` in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }

    /// Latitude/longitude box holding every point within `radius_km`.
    ///
    /// Longitudes are left unbounded when the circle reaches a pole or
    /// crosses the antimeridian.
    pub fn bounds_within(&self, radius_km: f64) -> GeoBounds {
        // Padded by a millionth so points on the circle stay inside after rounding.
        let angular = radius_km.max(0.0) / EARTH_RADIUS_KM * 1.000_001;
        let lat = self.latitude.to_radians();
        let lon = self.longitude.to_radians();
        let (min_lat, max_lat) = (lat - angular, lat + angular);

        if min_lat <= -FRAC_PI_2 || max_lat >= FRAC_PI_2 {
            return GeoBounds {
                min_latitude: min_lat.to_degrees().max(-90.0),
                max_latitude: max_lat.to_degrees().min(90.0),
                min_longitude: -180.0,
                max_longitude: 180.0,
            };
        }

        let delta_lon = (angular.sin() / lat.cos()).asin();
        let (min_lon, max_lon) = (lon - delta_lon, lon + delta_lon);
        let (min_longitude, max_longitude) = if min_lon < -PI || max_lon > PI {
            (-180.0, 180.0)
        } else {
            (min_lon.to_degrees(), max_lon.to_degrees())
        };

        GeoBounds {
            min_latitude: min_lat.to_degrees(),
            max_latitude: max_lat.to_degrees(),
            min_longitude,
            max_longitude,
        }
    }
}

/// Inclusive latitude/longitude box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl GeoBounds {
    pub fn contains(&self, point: &GeoPoint) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}

/// Rounds a distance to one decimal place for display.
pub fn round_km(distance: f64) -> f64 {
    (distance * 10.0).round() / 10.0
}

//! Geographic calculations and travel-time estimation

use serde::{Deserialize, Serialize};

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Average door-to-door speed in km/h (urban/suburban, incl. traffic)
const AVERAGE_SPEED_KMH: f64 = 30.0;

/// Fixed buffer in minutes for parking and walk-in
const BUFFER_MINUTES: i64 = 5;

/// Fallback minutes when either postcode is unknown
const UNKNOWN_POSTCODE_MINUTES: i64 = 15;

/// Fallback minutes within the same outward code (e.g. both "SW1A")
const SAME_OUTWARD_MINUTES: i64 = 10;

/// Fallback minutes within the same postal district (first two characters)
const SAME_DISTRICT_MINUTES: i64 = 18;

/// Fallback minutes across districts
const CROSS_DISTRICT_MINUTES: i64 = 25;

/// A coordinate-based travel estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelEstimate {
    /// Great-circle distance rounded to 1 decimal km
    pub distance_km: f64,
    pub minutes: i64,
}

/// Calculate Haversine distance between two points in kilometers
pub fn haversine_distance_km(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);

    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Estimate door-to-door travel time in minutes for a given distance
pub fn travel_minutes(km: f64) -> i64 {
    (km / AVERAGE_SPEED_KMH * 60.0).round() as i64 + BUFFER_MINUTES
}

/// Estimate travel between two optional coordinates. Returns `None` when
/// either side has no geocoded location.
pub fn estimate_travel(from: Option<Coordinates>, to: Option<Coordinates>) -> Option<TravelEstimate> {
    let (from, to) = match (from, to) {
        (Some(f), Some(t)) => (f, t),
        _ => return None,
    };

    let km = (haversine_distance_km(&from, &to) * 10.0).round() / 10.0;
    Some(TravelEstimate {
        distance_km: km,
        minutes: travel_minutes(km),
    })
}

/// Coarse postcode-proximity fallback for clients without coordinates.
/// Always returns a positive number of minutes, never fails.
pub fn estimate_from_postcodes(a: &str, b: &str) -> i64 {
    let a = a.trim().to_uppercase();
    let b = b.trim().to_uppercase();

    if a.is_empty() || b.is_empty() {
        return UNKNOWN_POSTCODE_MINUTES;
    }

    let outward_a = outward_code(&a);
    let outward_b = outward_code(&b);

    if outward_a == outward_b {
        return SAME_OUTWARD_MINUTES;
    }

    let district_a: String = outward_a.chars().take(2).collect();
    let district_b: String = outward_b.chars().take(2).collect();
    if district_a == district_b {
        return SAME_DISTRICT_MINUTES;
    }

    CROSS_DISTRICT_MINUTES
}

/// The part of a UK postcode before the space ("SW1A" in "SW1A 1AA").
fn outward_code(postcode: &str) -> &str {
    postcode.split_whitespace().next().unwrap_or(postcode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point_is_zero() {
        let westminster = Coordinates {
            lat: 51.5007,
            lng: -0.1246,
        };
        let distance = haversine_distance_km(&westminster, &westminster);
        assert!(distance.abs() < 0.001);
    }

    #[test]
    fn test_haversine_one_degree_latitude() {
        let a = Coordinates { lat: 51.0, lng: 0.0 };
        let b = Coordinates { lat: 52.0, lng: 0.0 };

        let distance = haversine_distance_km(&a, &b);

        // One degree of latitude is ~111.2 km.
        assert!((distance - 111.2).abs() < 1.0, "got {} km", distance);
    }

    #[test]
    fn test_haversine_london_to_manchester() {
        let london = Coordinates {
            lat: 51.5074,
            lng: -0.1278,
        };
        let manchester = Coordinates {
            lat: 53.4808,
            lng: -2.2426,
        };

        let distance = haversine_distance_km(&london, &manchester);

        // Roughly 262 km great-circle.
        assert!((distance - 262.0).abs() < 5.0, "got {} km", distance);
    }

    #[test]
    fn test_travel_minutes_includes_buffer() {
        // 15 km at 30 km/h = 30 min, plus the 5 min buffer.
        assert_eq!(travel_minutes(15.0), 35);
        // Zero distance still pays the buffer.
        assert_eq!(travel_minutes(0.0), 5);
    }

    #[test]
    fn test_estimate_travel_requires_both_coordinates() {
        let here = Some(Coordinates {
            lat: 51.5007,
            lng: -0.1246,
        });

        assert!(estimate_travel(here, None).is_none());
        assert!(estimate_travel(None, here).is_none());
        assert!(estimate_travel(None, None).is_none());

        let estimate = estimate_travel(here, here).unwrap();
        assert_eq!(estimate.distance_km, 0.0);
        assert_eq!(estimate.minutes, 5);
    }

    #[test]
    fn test_estimate_travel_rounds_distance_to_one_decimal() {
        let a = Some(Coordinates { lat: 51.50, lng: -0.12 });
        let b = Some(Coordinates { lat: 51.53, lng: -0.15 });

        let estimate = estimate_travel(a, b).unwrap();
        let rescaled = estimate.distance_km * 10.0;
        assert!((rescaled - rescaled.round()).abs() < 1e-9);
    }

    #[test]
    fn test_postcode_same_outward_code() {
        assert_eq!(estimate_from_postcodes("SW1A 1AA", "SW1A 2AA"), 10);
        // Normalization: case and surrounding whitespace are ignored.
        assert_eq!(estimate_from_postcodes(" sw1a 1aa ", "SW1A 2AA"), 10);
    }

    #[test]
    fn test_postcode_same_district() {
        assert_eq!(estimate_from_postcodes("SW1A 1AA", "SW1B 1AA"), 18);
    }

    #[test]
    fn test_postcode_cross_district() {
        assert_eq!(estimate_from_postcodes("SW1A 1AA", "E1 6AN"), 25);
    }

    #[test]
    fn test_postcode_empty_side_uses_default() {
        assert_eq!(estimate_from_postcodes("", "E1 6AN"), 15);
        assert_eq!(estimate_from_postcodes("SW1A 1AA", "   "), 15);
        assert_eq!(estimate_from_postcodes("", ""), 15);
    }
}

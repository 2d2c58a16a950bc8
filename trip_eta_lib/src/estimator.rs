//! Great-circle estimation over latitude/longitude pairs.
//!
//! Every function here is pure arithmetic. Coordinates are not range checked:
//! a non-finite input gives a non-finite distance or bearing, which in turn
//! never satisfies a radius test. Use [`GeoPoint::new`] at the boundary to
//! reject malformed coordinates up front.

use chrono::{DateTime, Utc};

use crate::{error::GeoError, eta::EtaResult, geo_point::GeoPoint};

/// Mean Earth radius in km.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Meters per second to kilometers per hour.
pub const MPS_TO_KMH: f64 = 3.6;

/// Haversine distance in km.
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.).sin().powi(2);
    let c = 2. * f64::atan2(h.sqrt(), (1. - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Initial compass bearing from `a` towards `b`, in degrees within `[0, 360)`.
///
/// Identical points have no defined bearing; this returns 0 for them.
pub fn bearing(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let degrees = (y.atan2(x).to_degrees() + 360.).rem_euclid(360.);
    // 360 - epsilon can round up to exactly 360
    if degrees >= 360. { 0. } else { degrees }
}

/// Distance and travel time from `origin` to `destination` at a constant speed,
/// with arrival counted from the current time.
pub fn estimate_time_of_arrival(
    origin: &GeoPoint,
    destination: &GeoPoint,
    speed_meters_per_second: f64,
) -> Result<EtaResult, GeoError> {
    estimate_time_of_arrival_at(origin, destination, speed_meters_per_second, Utc::now())
}

pub fn estimate_time_of_arrival_at(
    origin: &GeoPoint,
    destination: &GeoPoint,
    speed_meters_per_second: f64,
    now: DateTime<Utc>,
) -> Result<EtaResult, GeoError> {
    if !speed_meters_per_second.is_finite() || speed_meters_per_second <= 0. {
        return Err(GeoError::InvalidSpeed(speed_meters_per_second));
    }

    let distance_km = distance(origin, destination);
    let speed_kmh = speed_meters_per_second * MPS_TO_KMH;
    let time_in_hours = distance_km / speed_kmh;

    EtaResult::new(distance_km, time_in_hours, now)
}

pub fn is_within_radius(center: &GeoPoint, point: &GeoPoint, radius_km: f64) -> bool {
    distance(center, point) <= radius_km
}

/// Points within `radius_km` of `center`, in input order.
pub fn filter_nearby(center: &GeoPoint, points: &[GeoPoint], radius_km: f64) -> Vec<GeoPoint> {
    points
        .iter()
        .filter(|point| is_within_radius(center, point, radius_km))
        .copied()
        .collect()
}

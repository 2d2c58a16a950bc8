use serde::{Deserialize, Serialize};

use crate::{
    estimator::{bearing, distance},
    geo_point::GeoPoint,
};

/// Rough driving pace used when no routing data is available.
pub const MINUTES_PER_KM: f64 = 2.0;

/// Straight-line directions between two points. No road network is consulted,
/// so the route is just the two endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directions {
    pub distance_km: f64,
    pub bearing: f64,
    pub duration_minutes: f64,
    pub route: Vec<GeoPoint>,
}

pub fn directions(origin: &GeoPoint, destination: &GeoPoint) -> Directions {
    let distance_km = distance(origin, destination);

    Directions {
        distance_km,
        bearing: bearing(origin, destination),
        duration_minutes: distance_km * MINUTES_PER_KM,
        route: vec![*origin, *destination],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_directions() {
        let origin = GeoPoint::new(0., 0.).unwrap();
        let destination = GeoPoint::new(0., 1.).unwrap();

        let directions = directions(&origin, &destination);

        assert!((directions.distance_km - 111.19).abs() < 0.01);
        assert!((directions.bearing - 90.).abs() < 1e-9);
        assert!((directions.duration_minutes - directions.distance_km * 2.).abs() < 1e-9);
        assert_eq!(directions.route, vec![origin, destination]);
    }
}

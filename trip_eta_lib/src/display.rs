use std::fmt;

use serde::{Deserialize, Serialize};

use crate::estimator::MPS_TO_KMH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedCoordinates {
    pub lat: String,
    pub lng: String,
    pub formatted: String,
}

pub fn format_coordinates(latitude: f64, longitude: f64, precision: usize) -> FormattedCoordinates {
    let lat = format!("{latitude:.precision$}");
    let lng = format!("{longitude:.precision$}");
    let formatted = format!("{lat}, {lng}");

    FormattedCoordinates { lat, lng, formatted }
}

/// Whole meters below one kilometer, otherwise kilometers with two decimals.
pub fn format_distance(distance_km: f64) -> String {
    if distance_km < 1. {
        format!("{:.0}m", distance_km * 1000.)
    } else {
        format!("{distance_km:.2}km")
    }
}

pub fn format_speed(speed_meters_per_second: Option<f64>) -> String {
    match speed_meters_per_second {
        Some(speed) if speed != 0. => format!("{:.1} km/h", speed * MPS_TO_KMH),
        _ => "0 km/h".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompassPoint {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassPoint {
    const ALL: [CompassPoint; 8] = [
        CompassPoint::N,
        CompassPoint::NE,
        CompassPoint::E,
        CompassPoint::SE,
        CompassPoint::S,
        CompassPoint::SW,
        CompassPoint::W,
        CompassPoint::NW,
    ];

    pub fn from_heading(degrees: f64) -> Self {
        let index = (degrees / 45.).round().rem_euclid(8.) as usize;
        Self::ALL[index % 8]
    }
}

impl fmt::Display for CompassPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CompassPoint::N => "N",
            CompassPoint::NE => "NE",
            CompassPoint::E => "E",
            CompassPoint::SE => "SE",
            CompassPoint::S => "S",
            CompassPoint::SW => "SW",
            CompassPoint::W => "W",
            CompassPoint::NW => "NW",
        };
        f.write_str(name)
    }
}

/// Missing heading reads as North.
pub fn format_heading(heading: Option<f64>) -> String {
    heading
        .filter(|degrees| degrees.is_finite())
        .map(CompassPoint::from_heading)
        .unwrap_or(CompassPoint::N)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_use_requested_precision() {
        let formatted = format_coordinates(6.9271, 79.8612, 2);
        assert_eq!(formatted.lat, "6.93");
        assert_eq!(formatted.lng, "79.86");
        assert_eq!(formatted.formatted, "6.93, 79.86");

        assert_eq!(format_coordinates(1., -2., 6).formatted, "1.000000, -2.000000");
    }

    #[test]
    fn distances() {
        assert_eq!(format_distance(0.85), "850m");
        assert_eq!(format_distance(0.), "0m");
        assert_eq!(format_distance(1.), "1.00km");
        assert_eq!(format_distance(94.336), "94.34km");
    }

    #[test]
    fn speeds() {
        assert_eq!(format_speed(None), "0 km/h");
        assert_eq!(format_speed(Some(0.)), "0 km/h");
        assert_eq!(format_speed(Some(10.)), "36.0 km/h");
    }

    #[test]
    fn headings() {
        assert_eq!(format_heading(None), "N");
        assert_eq!(format_heading(Some(0.)), "N");
        assert_eq!(format_heading(Some(44.)), "NE");
        assert_eq!(format_heading(Some(90.)), "E");
        assert_eq!(format_heading(Some(200.)), "S");
        assert_eq!(format_heading(Some(337.6)), "N");
        assert_eq!(format_heading(Some(-90.)), "W");
        assert_eq!(CompassPoint::from_heading(315.), CompassPoint::NW);
    }
}

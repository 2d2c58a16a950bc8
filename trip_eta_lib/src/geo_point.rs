use chrono::{DateTime, Utc};
use geo_types::Point;
use serde::{Deserialize, Serialize};

use crate::error::GeoError;

/// A single position sample. Latitude and longitude are in degrees.
///
/// The optional fields carry whatever the sampling source reported alongside
/// the fix: accuracy in meters, heading in degrees clockwise from North, speed
/// in meters per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl GeoPoint {
    /// Checked constructor. Use a struct literal to skip validation.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let point = Self::unchecked(latitude, longitude);
        point.validate()?;
        Ok(point)
    }

    pub(crate) const fn unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
            heading: None,
            speed: None,
            timestamp: None,
        }
    }

    pub fn validate(&self) -> Result<(), GeoError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);

        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(GeoError::InvalidCoordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }

    pub fn with_accuracy(mut self, meters: f64) -> Self {
        self.accuracy = Some(meters);
        self
    }

    pub fn with_heading(mut self, degrees: f64) -> Self {
        self.heading = Some(degrees);
        self
    }

    pub fn with_speed(mut self, meters_per_second: f64) -> Self {
        self.speed = Some(meters_per_second);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Compares position only, ignoring sample metadata.
    pub fn same_position(&self, other: &GeoPoint) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, GeoError> {
        bincode::serialize(self).map_err(|err| GeoError::Decode(err.to_string()))
    }
}

impl From<GeoPoint> for Point {
    fn from(value: GeoPoint) -> Self {
        Point::new(value.longitude, value.latitude)
    }
}

impl From<Point> for GeoPoint {
    fn from(value: Point) -> Self {
        GeoPoint::unchecked(value.y(), value.x())
    }
}

impl TryFrom<&[u8]> for GeoPoint {
    type Error = GeoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize_from(value).map_err(|err| GeoError::Decode(err.to_string()))
    }
}

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeoError {
    #[error("invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// Speed must be finite and strictly positive, in meters per second.
    #[error("invalid speed: {0} m/s")]
    InvalidSpeed(f64),

    #[error("arrival time is out of range ({0} hours from now)")]
    EtaOutOfRange(f64),

    #[error("failed to decode point: {0}")]
    Decode(String),
}

pub mod anomaly;
pub mod directions;
pub mod display;
pub mod error;
pub mod estimator;
pub mod eta;
pub mod geo_point;

pub use error::GeoError;
pub use estimator::{bearing, distance, estimate_time_of_arrival, filter_nearby, is_within_radius};
pub use eta::EtaResult;
pub use geo_point::GeoPoint;

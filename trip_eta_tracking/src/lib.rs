use const_format::concatcp;
use thiserror::Error;
use trip_eta_lib::GeoError;

pub mod config;
pub mod history;
pub mod source;
pub mod tracker;
pub mod watch;

pub use config::TrackerConfig;
pub use source::{LocationSource, SampleError};
pub use tracker::{TrackingUpdate, TripTracker};
pub use watch::{LocationWatch, WatchMode};

pub const DATA_DIR: &str = "data/";
pub const HISTORY_DIR_NAME: &str = "history";
pub const DEFAULT_HISTORY_DIR: &str = concatcp!(DATA_DIR, HISTORY_DIR_NAME);

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("history: {0}")]
    History(String),
    #[error("config: {0}")]
    Config(String),
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Sample(#[from] SampleError),
}

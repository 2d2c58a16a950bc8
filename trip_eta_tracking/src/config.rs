use std::{fs::File, io::BufReader, path::{Path, PathBuf}, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{source::SampleOptions, TrackingError, DATA_DIR, HISTORY_DIR_NAME};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub sample_timeout_secs: u64,
    /// Samples older than this are treated as stale and skipped.
    pub maximum_age_secs: u64,
    /// Used for ETA when a sample carries no usable speed.
    pub fallback_speed_kmh: f64,
    pub anomaly_factor: f64,
    pub update_channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_DIR),
            poll_interval_secs: 30,
            sample_timeout_secs: 10,
            maximum_age_secs: 5 * 60,
            fallback_speed_kmh: 50.,
            anomaly_factor: 5.,
            update_channel_capacity: 100,
        }
    }
}

impl TrackerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackingError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|err| TrackingError::Config(format!("Failed to open config file {:?}: {err}", path)))?;

        let config: TrackerConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|err| TrackingError::Config(format!("Failed to parse config file {:?}: {err}", path)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if !self.fallback_speed_kmh.is_finite() || self.fallback_speed_kmh <= 0. {
            return Err(TrackingError::Config(format!("fallback_speed_kmh must be positive, got {}", self.fallback_speed_kmh)));
        }
        if !self.anomaly_factor.is_finite() || self.anomaly_factor <= 0. {
            return Err(TrackingError::Config(format!("anomaly_factor must be positive, got {}", self.anomaly_factor)));
        }
        if self.poll_interval_secs == 0 {
            return Err(TrackingError::Config("poll_interval_secs must be at least 1".to_string()));
        }
        if self.update_channel_capacity == 0 {
            return Err(TrackingError::Config("update_channel_capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn history_dir(&self) -> PathBuf {
        self.data_dir.join(HISTORY_DIR_NAME)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn sample_options(&self) -> SampleOptions {
        SampleOptions {
            timeout: Duration::from_secs(self.sample_timeout_secs),
            maximum_age: Duration::from_secs(self.maximum_age_secs),
        }
    }
}

use std::{collections::HashMap, path::{Path, PathBuf}, sync::Arc};

use tokio::{fs::OpenOptions, sync::Mutex};
use trip_eta_lib::GeoPoint;

use crate::TrackingError;

use super::buffer::HistoryBuffer;

struct OpenHistory {
    path: PathBuf,
    buffer: HistoryBuffer,
}

/// Location history for all trips currently being tracked, one file per trip.
#[derive(Clone)]
pub struct HistoryManager {
    dir: PathBuf,
    history_map: Arc<Mutex<HashMap<i64, OpenHistory>>>,
}

impl HistoryManager {
    /// Opens every history file found in `dir`, creating the directory if needed.
    pub async fn start(dir: impl AsRef<Path>) -> Result<Self, TrackingError> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            tokio::fs::create_dir_all(&dir).await
                .map_err(|_| TrackingError::History(format!("Failed to create history directory: {:?}", dir)))?;
        }

        let mut history_map = HashMap::new();
        let mut entries = tokio::fs::read_dir(&dir).await
            .map_err(|_| TrackingError::History(format!("Failed to read history files from {:?}", dir)))?;

        while let Some(entry) = entries.next_entry().await
            .map_err(|_| TrackingError::History(format!("Failed to read history files from {:?}", dir)))? {
            let path = entry.path();

            let Some(trip_id) = trip_id_from_path(&path) else {
                return Err(TrackingError::History(format!("History file had illegal path: {:?}", path)));
            };

            let file = OpenOptions::new()
                .read(true)
                .append(true)
                .open(&path).await
                .map_err(|_| TrackingError::History(format!("Failed to open history file: {:?}", path)))?;

            let buffer = HistoryBuffer::load(file).await?;
            tracing::info!("Loaded {} points for trip {}", buffer.len(), trip_id);
            history_map.insert(trip_id, OpenHistory { path, buffer });
        }

        Ok(HistoryManager {
            dir,
            history_map: Arc::new(Mutex::new(history_map)),
        })
    }

    /// Starts a history file for the trip. Does nothing if one is already open.
    pub async fn open_trip(&self, trip_id: i64, label: &str) -> Result<(), TrackingError> {
        let mut history_map = self.history_map.lock().await;

        if history_map.contains_key(&trip_id) {
            return Ok(());
        }

        let path = self.dir.join(format!("{}_{}", trip_id, sanitize_label(label)));

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path).await
            .map_err(|_| TrackingError::History(format!("Failed to open history file: {:?}", path)))?;

        tracing::info!("Opened history for trip {} at {:?}", trip_id, path);
        history_map.insert(trip_id, OpenHistory { path, buffer: HistoryBuffer::new(file) });

        Ok(())
    }

    pub async fn is_open(&self, trip_id: i64) -> bool {
        self.history_map.lock().await.contains_key(&trip_id)
    }

    pub async fn open_trips(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.history_map.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn append(&self, trip_id: i64, points: &[GeoPoint]) -> Result<(), TrackingError> {
        let mut history_map = self.history_map.lock().await;
        let history = history_map.get_mut(&trip_id).ok_or(TrackingError::History(format!("No history file for trip {}", trip_id)))?;
        history.buffer.add_points(points).await
    }

    pub async fn read_all(&self, trip_id: i64) -> Result<Vec<GeoPoint>, TrackingError> {
        let history_map = self.history_map.lock().await;
        let history = history_map.get(&trip_id).ok_or(TrackingError::History(format!("No history file for trip {}", trip_id)))?;
        Ok(history.buffer.get_all_points().to_vec())
    }

    pub async fn read_since(&self, trip_id: i64, index: usize) -> Result<Vec<GeoPoint>, TrackingError> {
        let history_map = self.history_map.lock().await;
        let history = history_map.get(&trip_id).ok_or(TrackingError::History(format!("No history file for trip {}", trip_id)))?;
        Ok(history.buffer.get_points_since(index).to_vec())
    }

    /// Removes the trip's history file and hands back everything it recorded.
    pub async fn close_trip(&self, trip_id: i64) -> Result<Vec<GeoPoint>, TrackingError> {
        let mut history_map = self.history_map.lock().await;
        let history = history_map.remove(&trip_id).ok_or(TrackingError::History(format!("No history file for trip {}", trip_id)))?;
        let OpenHistory { path, buffer } = history;
        let points = buffer.close();

        tokio::fs::remove_file(&path).await
            .map_err(|_| TrackingError::History(format!("Failed to remove history file: {:?}", path)))?;

        tracing::info!("Closed history for trip {} with {} points", trip_id, points.len());
        Ok(points)
    }
}

fn trip_id_from_path(path: &Path) -> Option<i64> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('_').next())
        .and_then(|prefix| prefix.parse::<i64>().ok())
}

fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();

    if cleaned.is_empty() { "trip".to_string() } else { cleaned }
}

use tokio::{fs::File, io::{AsyncReadExt, AsyncWriteExt}};
use trip_eta_lib::GeoPoint;

use crate::TrackingError;

/// Append-only log of the points recorded for one trip.
///
/// The file is a plain concatenation of bincode-encoded [`GeoPoint`]s. All
/// points are also kept in memory so reads never touch the disk.
pub struct HistoryBuffer {
    file: File,
    points: Vec<GeoPoint>,
}

impl HistoryBuffer {
    pub fn new(file: File) -> Self {
        Self {
            file,
            points: Vec::new(),
        }
    }

    /// Rebuilds the buffer from an existing file. A truncated trailing record,
    /// left by an interrupted write, is cut off the file so later appends
    /// start on a record boundary.
    pub async fn load(mut file: File) -> Result<Self, TrackingError> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await
            .map_err(|err| TrackingError::History(format!("Failed to read history file: {err}")))?;

        let total = bytes.len() as u64;
        let mut cursor = std::io::Cursor::new(bytes);
        let mut points = Vec::new();
        let mut valid_len = 0;

        while valid_len < total {
            match bincode::deserialize_from::<_, GeoPoint>(&mut cursor) {
                Ok(point) => {
                    points.push(point);
                    valid_len = cursor.position();
                }
                Err(err) => {
                    tracing::warn!("Dropping {} trailing bytes from history file: {err}", total - valid_len);
                    file.set_len(valid_len).await
                        .map_err(|err| TrackingError::History(format!("Failed to truncate history file: {err}")))?;
                    break;
                }
            }
        }

        Ok(Self { file, points })
    }

    pub async fn add_points(&mut self, points: &[GeoPoint]) -> Result<(), TrackingError> {
        let mut bytes = Vec::new();
        for point in points {
            bincode::serialize_into(&mut bytes, point)
                .map_err(|err| TrackingError::History(format!("Failed to serialize point: {err}")))?;
        }

        self.file.write_all(&bytes).await
            .map_err(|err| TrackingError::History(format!("Failed to write history file: {err}")))?;
        self.file.flush().await
            .map_err(|err| TrackingError::History(format!("Failed to flush history file: {err}")))?;

        self.points.extend_from_slice(points);
        Ok(())
    }

    pub fn get_all_points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn get_points_since(&self, index: usize) -> &[GeoPoint] {
        &self.points[index.min(self.points.len())..]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn close(self) -> Vec<GeoPoint> {
        self.points
    }
}

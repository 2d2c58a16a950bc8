use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use trip_eta_lib::{
    anomaly::{filter_anomalies, track_length_km},
    estimate_time_of_arrival, EtaResult, GeoPoint,
};

use crate::{
    config::TrackerConfig,
    history::HistoryManager,
    source::{get_current_location, LocationSource},
    watch::LocationEvent,
    TrackingError,
};

/// Published after every recorded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingUpdate {
    pub trip_id: i64,
    pub position: GeoPoint,
    /// Present when the trip has a destination.
    pub eta: Option<EtaResult>,
    pub travelled_km: f64,
    pub points_recorded: usize,
}

/// Turns position samples into recorded history and ETA updates.
#[derive(Clone)]
pub struct TripTracker {
    history: HistoryManager,
    config: TrackerConfig,
    tx: broadcast::Sender<TrackingUpdate>,
}

impl TripTracker {
    pub fn new(history: HistoryManager, config: TrackerConfig) -> Self {
        let (tx, _rx) = broadcast::channel(config.update_channel_capacity.max(1));
        Self { history, config, tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackingUpdate> {
        self.tx.subscribe()
    }

    /// Speed used for ETA: the sample's own speed when it is usable,
    /// otherwise the configured fallback.
    pub fn effective_speed_mps(&self, sample: &GeoPoint) -> f64 {
        match sample.speed {
            Some(speed) if speed.is_finite() && speed > 0. => speed,
            _ => self.config.fallback_speed_kmh / trip_eta_lib::estimator::MPS_TO_KMH,
        }
    }

    pub async fn record_sample(
        &self,
        trip_id: i64,
        sample: GeoPoint,
        destination: Option<&GeoPoint>,
    ) -> Result<TrackingUpdate, TrackingError> {
        sample.validate()?;
        if let Some(destination) = destination {
            destination.validate()?;
        }

        let eta = destination
            .map(|destination| estimate_time_of_arrival(&sample, destination, self.effective_speed_mps(&sample)))
            .transpose()?;

        if !self.history.is_open(trip_id).await {
            self.history.open_trip(trip_id, &format!("trip-{trip_id}")).await?;
        }
        self.history.append(trip_id, &[sample]).await?;

        let points = self.history.read_all(trip_id).await?;
        let travelled_km = track_length_km(&filter_anomalies(&points, self.config.anomaly_factor));

        let update = TrackingUpdate {
            trip_id,
            position: sample,
            eta,
            travelled_km,
            points_recorded: points.len(),
        };

        // No subscribers is fine
        let _ = self.tx.send(update.clone());

        Ok(update)
    }

    /// Takes a single fix from `source` and records it.
    pub async fn record_current_location(
        &self,
        trip_id: i64,
        source: &mut dyn LocationSource,
        destination: Option<&GeoPoint>,
    ) -> Result<TrackingUpdate, TrackingError> {
        let sample = get_current_location(source, &self.config.sample_options()).await?;
        self.record_sample(trip_id, sample, destination).await
    }

    /// Records samples from a watch until its channel closes. Sample errors
    /// and rejected samples are logged and skipped. Returns how many samples
    /// were recorded.
    pub async fn run(
        &self,
        trip_id: i64,
        destination: Option<GeoPoint>,
        mut events: mpsc::Receiver<LocationEvent>,
    ) -> Result<usize, TrackingError> {
        let mut recorded = 0;

        while let Some(event) = events.recv().await {
            let sample = match event {
                Ok(sample) => sample,
                Err(err) => {
                    tracing::warn!("Trip {}: no sample: {}", trip_id, err);
                    continue;
                }
            };

            match self.record_sample(trip_id, sample, destination.as_ref()).await {
                Ok(update) => {
                    recorded += 1;
                    tracing::debug!("Trip {}: {} points, {:.2} km travelled", trip_id, update.points_recorded, update.travelled_km);
                }
                Err(TrackingError::History(msg)) => {
                    tracing::error!("Trip {}: failed to record sample: {}", trip_id, msg);
                    return Err(TrackingError::History(msg));
                }
                Err(err) => {
                    tracing::warn!("Trip {}: rejected sample: {}", trip_id, err);
                }
            }
        }

        tracing::info!("Trip {}: tracking ended after {} samples", trip_id, recorded);
        Ok(recorded)
    }

    pub async fn history(&self, trip_id: i64) -> Result<Vec<GeoPoint>, TrackingError> {
        self.history.read_all(trip_id).await
    }

    /// Closes the trip's history and returns the cleaned track.
    pub async fn finish(&self, trip_id: i64) -> Result<Vec<GeoPoint>, TrackingError> {
        let points = self.history.close_trip(trip_id).await?;
        Ok(filter_anomalies(&points, self.config.anomaly_factor))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use trip_eta_lib::distance;

    use super::*;
    use crate::{
        source::{ChannelSource, ReplaySource, SampleError, SampleOptions},
        watch::{LocationWatch, WatchMode},
    };

    const COLOMBO: (f64, f64) = (6.9271, 79.8612);
    const KANDY: (f64, f64) = (7.2906, 80.6337);

    fn point((latitude, longitude): (f64, f64)) -> GeoPoint {
        GeoPoint::new(latitude, longitude).unwrap()
    }

    async fn tracker(dir: &tempfile::TempDir) -> TripTracker {
        let history = HistoryManager::start(dir.path()).await.unwrap();
        TripTracker::new(history, TrackerConfig::default())
    }

    #[tokio::test]
    async fn eta_uses_fallback_speed_without_sample_speed() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let destination = point(KANDY);

        let update = tracker.record_sample(1, point(COLOMBO), Some(&destination)).await.unwrap();

        let eta = update.eta.unwrap();
        assert!((eta.distance_km - distance(&point(COLOMBO), &destination)).abs() < 1e-9);
        assert!((eta.time_in_hours - eta.distance_km / 50.).abs() < 1e-9);
        assert_eq!(update.points_recorded, 1);
        assert_eq!(update.travelled_km, 0.);
    }

    #[tokio::test]
    async fn eta_uses_sample_speed_when_moving() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let destination = point(KANDY);

        let moving = point(COLOMBO).with_speed(25.);
        let update = tracker.record_sample(1, moving, Some(&destination)).await.unwrap();
        let eta = update.eta.unwrap();
        assert!((eta.time_in_hours - eta.distance_km / 90.).abs() < 1e-9);

        let parked = point(COLOMBO).with_speed(0.);
        assert_eq!(tracker.effective_speed_mps(&parked), 50. / 3.6);
    }

    #[tokio::test]
    async fn no_destination_means_no_eta() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;

        let update = tracker.record_sample(2, point(COLOMBO), None).await.unwrap();
        assert!(update.eta.is_none());
    }

    #[tokio::test]
    async fn invalid_samples_are_rejected_before_recording() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;

        let bad = GeoPoint { latitude: 123., ..point(COLOMBO) };
        assert!(matches!(tracker.record_sample(3, bad, None).await, Err(TrackingError::Geo(_))));
        assert!(tracker.history(3).await.is_err());
    }

    #[tokio::test]
    async fn failed_eta_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let nowhere = GeoPoint { latitude: f64::NAN, ..point(KANDY) };

        assert!(matches!(tracker.record_sample(5, point(COLOMBO), Some(&nowhere)).await, Err(TrackingError::Geo(_))));
        assert!(tracker.history(5).await.is_err());

        tracker.record_sample(5, point(COLOMBO), None).await.unwrap();
        assert!(tracker.record_sample(5, point(KANDY), Some(&nowhere)).await.is_err());
        assert_eq!(tracker.history(5).await.unwrap(), vec![point(COLOMBO)]);
    }

    #[tokio::test]
    async fn current_location_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let mut source = ReplaySource::new([point(COLOMBO)]);

        let update = tracker.record_current_location(6, &mut source, None).await.unwrap();
        assert_eq!(update.position, point(COLOMBO));
        assert_eq!(update.points_recorded, 1);

        let exhausted = tracker.record_current_location(6, &mut source, None).await;
        assert!(matches!(exhausted, Err(TrackingError::Sample(SampleError::Exhausted))));
        assert_eq!(tracker.history(6).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn updates_are_broadcast() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let mut updates = tracker.subscribe();

        tracker.record_sample(4, point(COLOMBO), None).await.unwrap();
        tracker.record_sample(4, point(KANDY), None).await.unwrap();

        assert_eq!(updates.recv().await.unwrap().points_recorded, 1);
        let second = updates.recv().await.unwrap();
        assert_eq!(second.points_recorded, 2);
        assert!((second.travelled_km - distance(&point(COLOMBO), &point(KANDY))).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn run_consumes_a_polling_watch() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;
        let destination = point(KANDY);

        let route = [point(COLOMBO), point((7.0, 80.0)), point((7.1, 80.3)), point(KANDY)];
        let mode = WatchMode::Poll { interval: Duration::from_secs(30) };
        let (_watch, events) = LocationWatch::start(Box::new(ReplaySource::new(route)), mode, SampleOptions::default(), 8);

        let mut updates = tracker.subscribe();
        let recorded = tracker.run(10, Some(destination), events).await.unwrap();

        assert_eq!(recorded, 4);
        assert_eq!(tracker.history(10).await.unwrap(), route.to_vec());

        let mut last = None;
        while let Ok(update) = updates.try_recv() {
            last = Some(update);
        }
        let last = last.unwrap();
        assert_eq!(last.eta.unwrap().distance_km, 0.);

        let track = tracker.finish(10).await.unwrap();
        assert_eq!(track.len(), 4);
        assert!(tracker.history(10).await.is_err());
    }

    #[tokio::test]
    async fn run_skips_sample_errors() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = tracker(&dir).await;

        let (sender, source) = ChannelSource::new(8);
        let (watch, events) = LocationWatch::start(Box::new(source), WatchMode::OnChange, SampleOptions::default(), 8);

        sender.send(Ok(point(COLOMBO))).await.unwrap();
        sender.send(Err(SampleError::PermissionDenied)).await.unwrap();
        sender.send(Ok(GeoPoint { longitude: 500., ..point(KANDY) })).await.unwrap();
        sender.send(Ok(point(KANDY))).await.unwrap();
        drop(sender);

        let recorded = tracker.run(11, None, events).await.unwrap();
        watch.stop().await;

        assert_eq!(recorded, 2);
        assert_eq!(tracker.history(11).await.unwrap(), vec![point(COLOMBO), point(KANDY)]);
    }
}

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Interval, MissedTickBehavior},
};
use trip_eta_lib::GeoPoint;

use crate::source::{LocationSource, SampleError, SampleOptions};

pub type LocationEvent = Result<GeoPoint, SampleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Take a fix every `interval`, starting immediately.
    Poll { interval: Duration },
    /// Report whenever the source signals a change.
    OnChange,
}

impl Default for WatchMode {
    fn default() -> Self {
        WatchMode::Poll { interval: Duration::from_secs(30) }
    }
}

/// A running subscription to a [`LocationSource`].
///
/// Samples, and the errors the source reports along the way, arrive on the
/// receiver returned by [`LocationWatch::start`]. Once [`LocationWatch::stop`]
/// returns nothing more is sent and the receiver drains to `None`. Dropping
/// the watch aborts it.
pub struct LocationWatch {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LocationWatch {
    pub fn start(
        source: Box<dyn LocationSource>,
        mode: WatchMode,
        options: SampleOptions,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<LocationEvent>) {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (stop_tx, stop_rx) = oneshot::channel();

        tracing::info!("Starting location watch ({:?})", mode);
        let handle = tokio::spawn(watch_actor(source, mode, options, events_tx, stop_rx));

        let watch = Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        };
        (watch, events_rx)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // Already finished if the receiving side is gone
            let _ = stop_tx.send(());
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                tracing::error!("Location watch ended abnormally: {err}");
            }
        }

        tracing::info!("Location watch stopped");
    }
}

impl Drop for LocationWatch {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn watch_actor(
    mut source: Box<dyn LocationSource>,
    mode: WatchMode,
    options: SampleOptions,
    events: mpsc::Sender<LocationEvent>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = match mode {
        WatchMode::Poll { interval } => {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(ticker)
        }
        WatchMode::OnChange => None,
    };

    loop {
        let sample = tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            sample = next_sample(source.as_mut(), ticker.as_mut(), &options) => sample,
        };

        let event = match sample {
            Ok(point) => match options.check_age(&point) {
                Ok(()) => {
                    tracing::debug!("Sample at {}, {}", point.latitude, point.longitude);
                    Ok(point)
                }
                Err(err) => {
                    tracing::warn!("Skipping sample: {err}");
                    Err(err)
                }
            },
            Err(SampleError::Exhausted) => {
                tracing::info!("Location source exhausted");
                break;
            }
            Err(err) => {
                tracing::warn!("Location sampling failed: {err}");
                Err(err)
            }
        };

        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            sent = events.send(event) => {
                if sent.is_err() {
                    tracing::debug!("Watch receiver dropped");
                    break;
                }
            }
        }
    }
}

async fn next_sample(
    source: &mut dyn LocationSource,
    ticker: Option<&mut Interval>,
    options: &SampleOptions,
) -> LocationEvent {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
            tokio::time::timeout(options.timeout, source.current_position())
                .await
                .unwrap_or(Err(SampleError::Timeout))
        }
        // Change events may legitimately be far apart, so no timeout here
        None => source.next_change().await,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use tokio::time::Instant;

    use super::*;
    use crate::source::{ChannelSource, ReplaySource};

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint::new(latitude, longitude).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_interval_until_exhausted() {
        let source = ReplaySource::new([point(1., 1.), point(1.1, 1.), point(1.2, 1.)]);
        let mode = WatchMode::Poll { interval: Duration::from_secs(30) };
        let (watch, mut events) = LocationWatch::start(Box::new(source), mode, SampleOptions::default(), 8);

        let started = Instant::now();
        assert_eq!(events.recv().await, Some(Ok(point(1., 1.))));
        assert_eq!(events.recv().await, Some(Ok(point(1.1, 1.))));
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert_eq!(events.recv().await, Some(Ok(point(1.2, 1.))));
        assert!(started.elapsed() >= Duration::from_secs(60));

        assert_eq!(events.recv().await, None);
        watch.stop().await;
    }

    #[tokio::test]
    async fn stop_ends_change_subscription() {
        let (sender, source) = ChannelSource::new(8);
        let (watch, mut events) = LocationWatch::start(Box::new(source), WatchMode::OnChange, SampleOptions::default(), 8);

        sender.send(Ok(point(5., 5.))).await.unwrap();
        sender.send(Err(SampleError::Unavailable("no fix".into()))).await.unwrap();

        assert_eq!(events.recv().await, Some(Ok(point(5., 5.))));
        assert_eq!(events.recv().await, Some(Err(SampleError::Unavailable("no fix".into()))));
        assert!(watch.is_running());

        watch.stop().await;

        // Source went away with the watch
        assert!(sender.send(Ok(point(6., 6.))).await.is_err());
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn stale_samples_are_reported_not_delivered() {
        let old = point(1., 1.).with_timestamp(Utc::now() - TimeDelta::hours(1));
        let fresh = point(2., 2.).with_timestamp(Utc::now());
        let source = ReplaySource::new([old, fresh]);
        let (_watch, mut events) = LocationWatch::start(Box::new(source), WatchMode::OnChange, SampleOptions::default(), 8);

        assert!(matches!(events.recv().await, Some(Err(SampleError::Stale { .. }))));
        assert_eq!(events.recv().await, Some(Ok(fresh)));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn dropping_the_watch_aborts_it() {
        let (sender, source) = ChannelSource::new(8);
        let (watch, mut events) = LocationWatch::start(Box::new(source), WatchMode::OnChange, SampleOptions::default(), 8);

        drop(watch);

        assert_eq!(events.recv().await, None);
        assert!(sender.send(Ok(point(1., 1.))).await.is_err());
    }
}

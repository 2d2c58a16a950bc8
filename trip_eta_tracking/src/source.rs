use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use trip_eta_lib::GeoPoint;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SampleError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a position")]
    Timeout,
    #[error("sample is {age_secs}s old")]
    Stale { age_secs: i64 },
    /// The source will never produce another sample.
    #[error("location source exhausted")]
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleOptions {
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(5 * 60),
        }
    }
}

impl SampleOptions {
    /// Rejects samples whose timestamp is older than `maximum_age`.
    /// Samples without a timestamp are taken as fresh.
    pub fn check_age(&self, sample: &GeoPoint) -> Result<(), SampleError> {
        let Some(timestamp) = sample.timestamp else {
            return Ok(());
        };

        let age = Utc::now() - timestamp;
        let maximum_age = TimeDelta::from_std(self.maximum_age).unwrap_or(TimeDelta::MAX);
        if age > maximum_age {
            return Err(SampleError::Stale { age_secs: age.num_seconds() });
        }
        Ok(())
    }
}

/// A device or platform that reports the current position.
#[async_trait]
pub trait LocationSource: Send {
    /// One-shot position fix.
    async fn current_position(&mut self) -> Result<GeoPoint, SampleError>;

    /// Waits until the position changes. Sources without change events just
    /// take a fresh fix.
    async fn next_change(&mut self) -> Result<GeoPoint, SampleError> {
        self.current_position().await
    }
}

/// Single fix with the timeout and staleness rules applied.
pub async fn get_current_location(
    source: &mut dyn LocationSource,
    options: &SampleOptions,
) -> Result<GeoPoint, SampleError> {
    let sample = tokio::time::timeout(options.timeout, source.current_position())
        .await
        .map_err(|_| SampleError::Timeout)??;

    options.check_age(&sample)?;
    Ok(sample)
}

/// Plays back a recorded track, one point per request.
pub struct ReplaySource {
    points: VecDeque<GeoPoint>,
}

impl ReplaySource {
    pub fn new(points: impl IntoIterator<Item = GeoPoint>) -> Self {
        Self {
            points: points.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.points.len()
    }
}

#[async_trait]
impl LocationSource for ReplaySource {
    async fn current_position(&mut self) -> Result<GeoPoint, SampleError> {
        self.points.pop_front().ok_or(SampleError::Exhausted)
    }
}

/// Event-driven source fed through a channel. A platform adapter holds the
/// sender and pushes native position callbacks into it.
pub struct ChannelSource {
    receiver: mpsc::Receiver<Result<GeoPoint, SampleError>>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<Result<GeoPoint, SampleError>>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl LocationSource for ChannelSource {
    async fn current_position(&mut self) -> Result<GeoPoint, SampleError> {
        self.receiver.recv().await.unwrap_or(Err(SampleError::Exhausted))
    }
}

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GeoError;

pub const ETA_TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaResult {
    pub distance_km: f64,
    pub time_in_hours: f64,
    pub arrival: DateTime<Utc>,
    /// Arrival as local wall-clock time.
    pub eta_formatted: String,
}

impl EtaResult {
    pub(crate) fn new(distance_km: f64, time_in_hours: f64, now: DateTime<Utc>) -> Result<Self, GeoError> {
        let arrival = arrival_after(now, time_in_hours)?;

        Ok(Self {
            distance_km,
            time_in_hours,
            arrival,
            eta_formatted: format_arrival(&arrival, &Local),
        })
    }

    pub fn time_in_minutes(&self) -> f64 {
        self.time_in_hours * 60.0
    }
}

fn arrival_after(now: DateTime<Utc>, hours: f64) -> Result<DateTime<Utc>, GeoError> {
    let millis = (hours * 3_600_000.0).round();
    if !millis.is_finite() || millis > i64::MAX as f64 {
        return Err(GeoError::EtaOutOfRange(hours));
    }

    TimeDelta::try_milliseconds(millis as i64)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(GeoError::EtaOutOfRange(hours))
}

/// Formats an arrival instant as wall-clock time in the given zone.
pub fn format_arrival<Tz: TimeZone>(arrival: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    arrival.with_timezone(zone).format(ETA_TIME_FORMAT).to_string()
}

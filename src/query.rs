//! ==============================================================================
//! query.rs - read-only access to the station data
//! ==============================================================================
//!
//! purpose:
//!     everything the api serves goes through StationQuery. it never writes:
//!     it hands out snapshots of the series store plus the fixed station
//!     position and the reader status.
//!
//! sensor ids:
//!     this deployment has exactly one physical stream, so only sensor id 1
//!     resolves to live data. any other id is SensorNotFound.
//!
//! relationships:
//!     - reads: store.rs (SeriesStore), reader.rs (ReaderStatus)
//!     - used by: api.rs
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::StationConfig;
use crate::error::QueryError;
use crate::reader::{ReaderState, ReaderStatus};
use crate::store::{SeriesStore, Snapshot};

/// The only sensor id backed by the live serial stream.
pub const LIVE_SENSOR_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    Humidity,
    FireRisk,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Temperature, Metric::Humidity, Metric::FireRisk];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Temperature => "temperature",
            Metric::Humidity => "humidity",
            Metric::FireRisk => "fire_risk",
        }
    }

    fn values(self, snap: &Snapshot) -> &[f64] {
        match self {
            Metric::Temperature => &snap.temperature,
            Metric::Humidity => &snap.humidity,
            Metric::FireRisk => &snap.fire_risk,
        }
    }
}

impl FromStr for Metric {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| QueryError::MetricNotFound(s.to_string()))
    }
}

/// `(timestamp, value)` pairs, oldest first. Serializes as `[ts, value]`.
pub type Series = Vec<(DateTime<Utc>, f64)>;

/// Body of `GET /data`.
#[derive(Debug, Clone, Serialize)]
pub struct StationData {
    pub lat: f64,
    pub lon: f64,
    #[serde(flatten)]
    pub series: Snapshot,
}

/// Body of `GET /sensor/{id}/data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorSeries {
    pub temperature: Series,
    pub humidity: Series,
    pub fire_risk: Series,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: ReaderState,
    pub frames_accepted: u64,
    pub frames_rejected: u64,
    pub buffered: usize,
    pub capacity: usize,
}

fn project(snap: &Snapshot, metric: Metric) -> Series {
    snap.date
        .iter()
        .copied()
        .zip(metric.values(snap).iter().copied())
        .collect()
}

#[derive(Debug, Clone)]
pub struct StationQuery {
    station: StationConfig,
    store: SeriesStore,
    status: Arc<ReaderStatus>,
}

impl StationQuery {
    pub fn new(station: StationConfig, store: SeriesStore, status: Arc<ReaderStatus>) -> Self {
        Self { station, store, status }
    }

    pub fn station(&self) -> StationConfig {
        self.station
    }

    pub async fn snapshot(&self) -> StationData {
        StationData {
            lat: self.station.lat,
            lon: self.station.lon,
            series: self.store.snapshot().await,
        }
    }

    pub async fn sensor_series(&self, sensor_id: u32) -> Result<SensorSeries, QueryError> {
        let snap = self.live(sensor_id)?.snapshot().await;
        Ok(SensorSeries {
            temperature: project(&snap, Metric::Temperature),
            humidity: project(&snap, Metric::Humidity),
            fire_risk: project(&snap, Metric::FireRisk),
        })
    }

    pub async fn metric_series(&self, sensor_id: u32, metric: &str) -> Result<Series, QueryError> {
        let store = self.live(sensor_id)?;
        let metric: Metric = metric.parse()?;
        Ok(project(&store.snapshot().await, metric))
    }

    pub async fn status(&self) -> StatusReport {
        StatusReport {
            state: self.status.state(),
            frames_accepted: self.status.frames_accepted(),
            frames_rejected: self.status.frames_rejected(),
            buffered: self.store.len().await,
            capacity: self.store.capacity(),
        }
    }

    fn live(&self, sensor_id: u32) -> Result<&SeriesStore, QueryError> {
        if sensor_id == LIVE_SENSOR_ID {
            Ok(&self.store)
        } else {
            Err(QueryError::SensorNotFound(sensor_id))
        }
    }
}

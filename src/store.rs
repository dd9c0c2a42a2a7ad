//! ==============================================================================
//! store.rs - bounded, time-aligned series store
//! ==============================================================================
//!
//! purpose:
//!     keeps the last `capacity` readings in memory as four rings (date,
//!     temperature, humidity, fire_risk) that always advance together.
//!     index i of every ring is the same reading, oldest first.
//!
//! concurrency:
//!     the whole buffer sits behind one tokio RwLock, so an evict + push of
//!     all four rings is a single write and readers can never see the rings
//!     with different lengths.
//!     - the serial reader (the only writer) runs on a blocking thread and
//!       uses push_blocking()
//!     - http handlers take snapshot().await
//!
//! relationships:
//!     - written by: reader.rs
//!     - read by: query.rs
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::frame::Measurement;

pub const DEFAULT_CAPACITY: usize = 10;

/// A measurement stamped with its capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub fire_risk: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, m: Measurement) -> Self {
        Self {
            timestamp,
            temperature: m.temperature,
            humidity: m.humidity,
            fire_risk: m.fire_risk,
        }
    }
}

/// Point-in-time copy of the store, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub date: Vec<DateTime<Utc>>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
    pub fire_risk: Vec<f64>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_empty()
    }
}

// ==============================================================================
// ring buffer
// ==============================================================================

#[derive(Debug)]
struct SeriesBuffer {
    capacity: usize,
    date: VecDeque<DateTime<Utc>>,
    temperature: VecDeque<f64>,
    humidity: VecDeque<f64>,
    fire_risk: VecDeque<f64>,
}

impl SeriesBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            date: VecDeque::with_capacity(capacity),
            temperature: VecDeque::with_capacity(capacity),
            humidity: VecDeque::with_capacity(capacity),
            fire_risk: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, reading: Reading) {
        if self.date.len() == self.capacity {
            self.date.pop_front();
            self.temperature.pop_front();
            self.humidity.pop_front();
            self.fire_risk.pop_front();
        }
        self.date.push_back(reading.timestamp);
        self.temperature.push_back(reading.temperature);
        self.humidity.push_back(reading.humidity);
        self.fire_risk.push_back(reading.fire_risk);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            date: self.date.iter().copied().collect(),
            temperature: self.temperature.iter().copied().collect(),
            humidity: self.humidity.iter().copied().collect(),
            fire_risk: self.fire_risk.iter().copied().collect(),
        }
    }
}

// ==============================================================================
// shared handle
// ==============================================================================

/// Clone-able handle to the shared series buffer.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    inner: Arc<RwLock<SeriesBuffer>>,
    capacity: usize,
}

impl Default for SeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SeriesStore {
    /// `capacity` must be at least 1; config validation enforces this.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(RwLock::new(SeriesBuffer::new(capacity))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a reading, evicting the oldest one when full.
    ///
    /// Must not be called from inside the async runtime; the serial reader
    /// calls it from its blocking worker.
    pub fn push_blocking(&self, reading: Reading) {
        self.inner.blocking_write().push(reading);
    }

    pub async fn push(&self, reading: Reading) {
        self.inner.write().await.push(reading);
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.inner.read().await.snapshot()
    }

    pub fn snapshot_blocking(&self) -> Snapshot {
        self.inner.blocking_read().snapshot()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.date.len()
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(i: u32) -> Reading {
        Reading {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
            temperature: 20.0 + i as f64,
            humidity: 50.0 + i as f64,
            fire_risk: i as f64,
        }
    }

    #[test]
    fn keeps_the_last_capacity_readings_oldest_first() {
        let store = SeriesStore::new(10);
        for i in 0..12 {
            store.push_blocking(reading(i));
        }

        let snap = store.snapshot_blocking();
        assert_eq!(snap.len(), 10);
        assert_eq!(snap.temperature.len(), 10);
        assert_eq!(snap.humidity.len(), 10);
        assert_eq!(snap.fire_risk.len(), 10);
        assert_eq!(snap.fire_risk, (2..12u32).map(f64::from).collect::<Vec<_>>());
        assert_eq!(snap.date[0], reading(2).timestamp);
        assert_eq!(snap.date[9], reading(11).timestamp);
    }

    #[test]
    fn below_capacity_nothing_is_evicted() {
        let store = SeriesStore::new(10);
        for i in 0..3 {
            store.push_blocking(reading(i));
        }
        let snap = store.snapshot_blocking();
        assert_eq!(snap.temperature, vec![20.0, 21.0, 22.0]);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let store = SeriesStore::new(0);
        store.push_blocking(reading(0));
        store.push_blocking(reading(1));
        assert_eq!(store.capacity(), 1);
        assert_eq!(store.snapshot_blocking().fire_risk, vec![1.0]);
    }

    #[tokio::test]
    async fn async_push_and_snapshot() {
        let store = SeriesStore::new(2);
        assert!(store.snapshot().await.is_empty());
        store.push(reading(0)).await;
        store.push(reading(1)).await;
        store.push(reading(2)).await;
        assert_eq!(store.len().await, 2);
        assert_eq!(store.snapshot().await.humidity, vec![51.0, 52.0]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn snapshots_never_see_a_torn_update() {
        let store = SeriesStore::new(10);

        let writer = {
            let store = store.clone();
            tokio::task::spawn_blocking(move || {
                for i in 0..2_000 {
                    store.push_blocking(reading(i));
                }
            })
        };

        while !writer.is_finished() {
            let snap = store.snapshot().await;
            assert_eq!(snap.date.len(), snap.temperature.len());
            assert_eq!(snap.date.len(), snap.humidity.len());
            assert_eq!(snap.date.len(), snap.fire_risk.len());
            assert!(snap.len() <= 10);
            // every ring must describe the same readings
            for (t, r) in snap.temperature.iter().zip(&snap.fire_risk) {
                assert_eq!(*t, 20.0 + *r);
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(store.snapshot().await.fire_risk.last(), Some(&1_999.0));
    }
}

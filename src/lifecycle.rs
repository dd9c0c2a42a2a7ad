//! ==============================================================================
//! lifecycle.rs - start / stop the serial reader
//! ==============================================================================
//!
//! purpose:
//!     the reader blocks on device reads, so it lives on tokio's blocking
//!     pool instead of an async task. IngestService starts it, keeps the
//!     cancellation token and join handle, and on shutdown signals the loop
//!     and waits (bounded) for it to notice.
//!
//! ```text
//!     worst-case shutdown latency is one serial read timeout: the loop checks
//!     the token once per read.
//! ```
//!
//! relationships:
//!     - uses: reader.rs (SerialReader), device.rs (SerialPortConnector)
//!     - used by: main.rs
//!
//! ==============================================================================

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HostConfig;
use crate::device::{Connector, SerialPortConnector};
use crate::reader::{ReaderSettings, ReaderState, ReaderStatus, SerialReader};
use crate::store::SeriesStore;

pub struct IngestService {
    cancel: CancellationToken,
    handle: JoinHandle<ReaderState>,
    status: Arc<ReaderStatus>,
}

impl IngestService {
    /// Start reading from the configured serial port.
    pub fn start(config: &HostConfig, store: SeriesStore) -> Self {
        Self::start_with(
            SerialPortConnector::new(&config.serial),
            store,
            ReaderSettings::from(config),
        )
    }

    pub fn start_with<C>(connector: C, store: SeriesStore, settings: ReaderSettings) -> Self
    where
        C: Connector + 'static,
    {
        let cancel = CancellationToken::new();
        let status = Arc::new(ReaderStatus::default());
        let reader = SerialReader::new(connector, store, status.clone(), cancel.clone(), settings);

        let handle = tokio::task::spawn_blocking(move || reader.run());
        info!("Serial reader started");

        Self { cancel, handle, status }
    }

    pub fn status(&self) -> Arc<ReaderStatus> {
        self.status.clone()
    }

    /// Signal the reader and wait up to `grace` for it to exit.
    pub async fn shutdown(self, grace: Duration) -> Result<ReaderState> {
        self.cancel.cancel();
        match tokio::time::timeout(grace, self.handle).await {
            Ok(Ok(state)) => {
                info!("Serial reader exited cleanly");
                Ok(state)
            }
            Ok(Err(e)) => Err(anyhow!("serial reader task failed: {}", e)),
            Err(_) => {
                warn!(?grace, "Serial reader did not stop in time");
                Err(anyhow!("serial reader did not stop within {:?}", grace))
            }
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StationConfig;
    use crate::device::testing::{ScriptedConnector, ScriptedDevice, Step};
    use crate::query::StationQuery;
    use std::io::ErrorKind;

    fn settings() -> ReaderSettings {
        ReaderSettings {
            show_sensor_data: false,
            ..ReaderSettings::default()
        }
    }

    async fn wait_for(status: &ReaderStatus, state: ReaderState) {
        for _ in 0..500 {
            if status.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("reader never reached {state:?}");
    }

    #[tokio::test]
    async fn shutdown_stops_a_streaming_reader() {
        let device = ScriptedDevice::new(vec![Step::Bytes(b"DATA 1 2 3 ENDATA".to_vec())]);
        let store = SeriesStore::new(10);
        let service = IngestService::start_with(
            ScriptedConnector::new(vec![device]),
            store.clone(),
            settings(),
        );
        let status = service.status();
        wait_for(&status, ReaderState::Streaming).await;

        let state = service.shutdown(Duration::from_secs(2)).await.unwrap();
        assert_eq!(state, ReaderState::Stopped);
        assert_eq!(status.state(), ReaderState::Stopped);
    }

    #[tokio::test]
    async fn queries_keep_working_after_a_disconnect() {
        let device = ScriptedDevice::new(vec![
            Step::Bytes(b"DATA 21.5 55.0 12.0 ENDATA\r\n".to_vec()),
            Step::Fail(ErrorKind::BrokenPipe),
        ]);
        let store = SeriesStore::new(10);
        let service = IngestService::start_with(
            ScriptedConnector::new(vec![device]),
            store.clone(),
            settings(),
        );
        let query = StationQuery::new(StationConfig::default(), store, service.status());

        wait_for(&service.status(), ReaderState::Stopped).await;

        let series = query.sensor_series(1).await.unwrap();
        assert_eq!(series.temperature.len(), 1);
        assert_eq!(series.temperature[0].1, 21.5);
        assert_eq!(query.status().await.state, ReaderState::Stopped);

        // already stopped; shutdown just collects it
        assert_eq!(
            service.shutdown(Duration::from_secs(1)).await.unwrap(),
            ReaderState::Stopped
        );
    }

    #[tokio::test]
    async fn shutdown_gives_up_after_the_grace_period() {
        // every read blocks for half a second, far past the grace period
        let device = ScriptedDevice::new(vec![]).with_idle(Duration::from_millis(500));
        let service = IngestService::start_with(
            ScriptedConnector::new(vec![device]),
            SeriesStore::default(),
            settings(),
        );
        wait_for(&service.status(), ReaderState::Streaming).await;
        // let the loop get into its first read
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = service.shutdown(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.to_string().contains("did not stop within"), "{err}");
    }

    #[tokio::test]
    async fn shutdown_reports_a_crashed_reader() {
        let device = ScriptedDevice::new(vec![Step::Panic]);
        let service = IngestService::start_with(
            ScriptedConnector::new(vec![device]),
            SeriesStore::default(),
            settings(),
        );
        // the panic leaves the state at Streaming
        wait_for(&service.status(), ReaderState::Streaming).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = service.shutdown(Duration::from_secs(2)).await.unwrap_err();
        assert!(err.to_string().contains("serial reader task failed"), "{err}");
    }

    #[tokio::test]
    async fn missing_device_stops_immediately() {
        let service = IngestService::start_with(
            ScriptedConnector::new(vec![]),
            SeriesStore::default(),
            settings(),
        );
        wait_for(&service.status(), ReaderState::Stopped).await;
        assert!(service.shutdown(Duration::from_secs(1)).await.is_ok());
    }
}

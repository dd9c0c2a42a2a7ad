//! ==============================================================================
//! reader.rs - serial reader loop
//! ==============================================================================
//!
//! purpose:
//!     owns the serial connection for its whole life. connects once, then
//!     reads whatever bytes are available, cuts frames out of them and pushes
//!     every valid reading into the series store.
//!
//! states:
//!
//! ```text
//!     CONNECTING ──ok──> STREAMING ──stop signal / io error──> STOPPED
//!         │                  │  ▲
//!         │ gave up          └──┘ bad frame / overflow: log, keep going
//!         ▼
//!      STOPPED
//! ```
//!
//! failure handling is deliberately asymmetric:
//!     - device / stream io errors end the loop (no reconnect once streaming)
//!     - garbled frames are dropped and counted
//!     - anything else is logged and the loop continues
//!
//! relationships:
//!     - uses: device.rs (Connector / SerialDevice), frame.rs, store.rs
//!     - started by: lifecycle.rs on a blocking worker
//!     - status read by: query.rs (/status)
//!
//! ==============================================================================

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{HostConfig, ReconnectConfig};
use crate::device::{Connector, SerialDevice};
use crate::error::IngestError;
use crate::frame::{FrameOutcome, FrameParser};
use crate::store::{Reading, SeriesStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderState {
    Connecting,
    Streaming,
    Stopped,
}

impl ReaderState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ReaderState::Connecting,
            1 => ReaderState::Streaming,
            _ => ReaderState::Stopped,
        }
    }
}

/// Live view of the reader, shared with the http handlers.
#[derive(Debug, Default)]
pub struct ReaderStatus {
    state: AtomicU8,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl ReaderStatus {
    pub fn state(&self) -> ReaderState {
        ReaderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ReaderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn frames_accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn frames_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub read_chunk: usize,
    pub max_pending: usize,
    pub reconnect: ReconnectConfig,
    pub show_sensor_data: bool,
}

impl From<&HostConfig> for ReaderSettings {
    fn from(config: &HostConfig) -> Self {
        Self {
            read_chunk: config.serial.read_chunk,
            max_pending: config.serial.max_pending,
            reconnect: config.reconnect.clone(),
            show_sensor_data: config.logging.show_sensor_data,
        }
    }
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::from(&HostConfig::default())
    }
}

pub struct SerialReader<C: Connector> {
    connector: C,
    store: SeriesStore,
    status: Arc<ReaderStatus>,
    cancel: CancellationToken,
    settings: ReaderSettings,
}

impl<C: Connector> SerialReader<C> {
    pub fn new(
        connector: C,
        store: SeriesStore,
        status: Arc<ReaderStatus>,
        cancel: CancellationToken,
        settings: ReaderSettings,
    ) -> Self {
        Self { connector, store, status, cancel, settings }
    }

    /// Run until the stop signal or a fatal device error. Blocks the calling
    /// thread; always ends in `Stopped`.
    pub fn run(mut self) -> ReaderState {
        self.status.set_state(ReaderState::Connecting);

        if let Some(device) = self.connect() {
            self.status.set_state(ReaderState::Streaming);
            self.stream(device);
        }

        self.status.set_state(ReaderState::Stopped);
        info!(
            accepted = self.status.frames_accepted(),
            rejected = self.status.frames_rejected(),
            "Serial reader stopped"
        );
        ReaderState::Stopped
    }

    fn connect(&mut self) -> Option<C::Device> {
        let target = self.connector.describe();
        let attempts = 1 + self.settings.reconnect.max_attempts;

        for attempt in 1..=attempts {
            if self.cancel.is_cancelled() {
                return None;
            }
            match self.connector.connect() {
                Ok(device) => {
                    info!(%target, "Connected to serial device");
                    return Some(device);
                }
                Err(e) => error!(%target, attempt, attempts, error = %e, "Failed to connect"),
            }
            if attempt < attempts && !self.wait(self.settings.reconnect.backoff()) {
                return None;
            }
        }
        None
    }

    /// Sleep for `delay` unless cancelled first. Returns false on cancel.
    fn wait(&self, delay: Duration) -> bool {
        // CancellationToken can only be awaited, and this runs on a blocking
        // worker with no runtime handle, so poll it between short sleeps
        let deadline = Instant::now() + delay;
        while Instant::now() < deadline {
            if self.cancel.is_cancelled() {
                return false;
            }
            let left = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(left.min(Duration::from_millis(50)));
        }
        !self.cancel.is_cancelled()
    }

    fn stream(&self, mut device: C::Device) {
        let mut parser = FrameParser::new(self.settings.max_pending);
        let mut buf = vec![0u8; self.settings.read_chunk.max(1)];

        loop {
            if self.cancel.is_cancelled() {
                info!("Stop requested, leaving serial loop");
                break;
            }
            match self.cycle(&mut device, &mut parser, &mut buf) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Error reading from serial port");
                    break;
                }
                Err(e) => warn!(error = %e, "Unexpected error in serial loop"),
            }
        }
    }

    /// One read: available bytes (at least one, bounded by the port
    /// timeout), parse, store, flush the device input buffer.
    fn cycle(
        &self,
        device: &mut C::Device,
        parser: &mut FrameParser,
        buf: &mut [u8],
    ) -> Result<(), IngestError> {
        let want = device.bytes_available()?.clamp(1, buf.len());
        let n = device.read_chunk(&mut buf[..want])?;

        let batch = parser.push(&buf[..n]);
        for outcome in batch.frames {
            self.record(outcome);
        }

        device.clear_input()?;

        match batch.overflowed {
            Some(dropped) => Err(IngestError::Overflow { dropped }),
            None => Ok(()),
        }
    }

    fn record(&self, outcome: FrameOutcome) {
        match outcome {
            Ok(m) => {
                self.store.push_blocking(Reading::new(Utc::now(), m));
                self.status.accepted.fetch_add(1, Ordering::Relaxed);
                if self.settings.show_sensor_data {
                    info!(
                        temperature = m.temperature,
                        humidity = m.humidity,
                        fire_risk = m.fire_risk,
                        "Received reading"
                    );
                } else {
                    debug!(?m, "Received reading");
                }
            }
            Err(rejected) => {
                self.status.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(frame = %rejected.frame, reason = %rejected.reason, "Invalid data frame");
            }
        }
    }
}

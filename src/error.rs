//! ==============================================================================
//! error.rs - error categories for the ingestion pipeline
//! ==============================================================================
//!
//! purpose:
//!     the reader loop treats failures differently depending on where they
//!     come from, so each source gets its own type:
//!
//! ```text
//!     - FrameError:  a garbled frame. dropped, counted, never fatal.
//!     - IngestError: device / stream failures. Connect and Io stop the
//!                    reader; Overflow is logged and the loop keeps going.
//!     - QueryError:  unknown sensor or metric. becomes a 404 at the api.
//!     - ConfigError: bad or unreadable station.toml.
//! ```
//!
//! relationships:
//!     - used by: frame.rs, reader.rs, query.rs, api.rs, config.rs
//!
//! ==============================================================================

use thiserror::Error;

/// Why a `DATA ... ENDATA` span was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameError {
    #[error("expected 5 tokens, got {0}")]
    TokenCount(usize),

    #[error("bad sentinels: frame must start with DATA and end with ENDATA")]
    Sentinel,

    #[error("{field} is not a number: {token:?}")]
    Number { field: &'static str, token: String },

    #[error("{field} is not finite: {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("ENDATA without a preceding DATA")]
    Orphan,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {path} @ {baud_rate} baud: {source}")]
    Connect {
        path: String,
        baud_rate: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame buffer overflow: dropped {dropped} pending bytes without ENDATA")]
    Overflow { dropped: usize },
}

impl IngestError {
    /// Connection and stream errors end the reader loop; everything else is
    /// logged and the loop carries on.
    pub fn is_fatal(&self) -> bool {
        matches!(self, IngestError::Connect { .. } | IngestError::Io(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Sensor not found")]
    SensorNotFound(u32),

    #[error("Metric not found")]
    MetricNotFound(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_and_connect_are_fatal_overflow_is_not() {
        let io = IngestError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
        assert!(io.is_fatal());

        let connect = IngestError::Connect {
            path: "/dev/ttyUSB0".into(),
            baud_rate: 9600,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such device"),
        };
        assert!(connect.is_fatal());

        assert!(!IngestError::Overflow { dropped: 10 }.is_fatal());
    }

    #[test]
    fn query_errors_render_the_api_message() {
        assert_eq!(QueryError::SensorNotFound(2).to_string(), "Sensor not found");
        assert_eq!(QueryError::MetricNotFound("wind".into()).to_string(), "Metric not found");
    }
}

//! ==============================================================================
//! frame.rs - DATA ... ENDATA frame extraction
//! ==============================================================================
//!
//! purpose:
//!     turns the raw serial byte stream into validated measurements.
//!     the sensor node sends ascii frames like:
//!
//! ```text
//!         DATA 21.5 55.0 12.0 ENDATA
//! ```
//!
//! ```text
//!     (temperature, humidity, fire_risk). bytes arrive in arbitrary chunks,
//!     so frames are cut out of an accumulating buffer whenever a closing
//!     ENDATA shows up.
//! ```
//!
//! rules:
//!     - a frame starts at the first DATA token and ends at the first ENDATA
//!       after it. the DATA inside "ENDATA" is never a start.
//!     - no ENDATA yet -> nothing extracted, bytes stay pending.
//!     - a frame must have exactly 5 whitespace-separated tokens, the right
//!       sentinels and three finite numbers. anything else is rejected and
//!       the buffer moves past it.
//!     - an ENDATA with no DATA before it is rejected as an orphan.
//!
//! relationships:
//!     - used by: reader.rs (one FrameParser per connection)
//!     - uses: error.rs (FrameError)
//!
//! ==============================================================================

use crate::error::FrameError;

pub const START: &[u8] = b"DATA";
pub const END: &[u8] = b"ENDATA";

/// Pending bytes tolerated without a closing ENDATA.
pub const DEFAULT_MAX_PENDING: usize = 4096;

/// The three metrics carried by one valid frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
    pub fire_risk: f64,
}

/// A dropped frame, kept around long enough to be logged.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    pub frame: String,
    pub reason: FrameError,
}

pub type FrameOutcome = Result<Measurement, Rejected>;

/// Result of feeding one chunk into a [`FrameParser`].
#[derive(Debug, Default)]
pub struct Batch {
    pub frames: Vec<FrameOutcome>,
    /// Bytes discarded because the backlog outgrew the pending limit.
    pub overflowed: Option<usize>,
}

// ==============================================================================
// pure extraction
// ==============================================================================

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

/// first DATA at or after `from` that is not the tail of an ENDATA
fn find_start(buf: &[u8], from: usize) -> Option<usize> {
    let mut at = from;
    while let Some(i) = find(buf, START, at) {
        if i >= 2 && &buf[i - 2..i] == b"EN" {
            at = i + 1;
            continue;
        }
        return Some(i);
    }
    None
}

fn last_start(buf: &[u8]) -> Option<usize> {
    let mut last = None;
    let mut at = 0;
    while let Some(i) = find_start(buf, at) {
        last = Some(i);
        at = i + 1;
    }
    last
}

/// Cut every complete frame out of `buf`.
///
/// Returns the outcome of each frame in stream order and how many leading
/// bytes were consumed. Bytes after the last ENDATA are left for the next
/// call.
pub fn extract_frames(buf: &[u8]) -> (Vec<FrameOutcome>, usize) {
    let mut outcomes = Vec::new();
    let mut consumed = 0;

    while let Some(end) = find(buf, END, consumed) {
        let stop = end + END.len();
        let outcome = match find_start(buf, consumed) {
            Some(start) if start < end => parse_frame(&buf[start..stop]),
            _ => Err(Rejected {
                frame: String::from_utf8_lossy(&buf[consumed..stop]).trim().to_string(),
                reason: FrameError::Orphan,
            }),
        };
        outcomes.push(outcome);
        consumed = stop;
    }

    (outcomes, consumed)
}

/// Validate a single `DATA ... ENDATA` span.
pub fn parse_frame(frame: &[u8]) -> FrameOutcome {
    let text = String::from_utf8_lossy(frame);
    let reject = |reason| Rejected {
        frame: text.trim().to_string(),
        reason,
    };

    let tokens: Vec<&str> = text.split_ascii_whitespace().collect();
    if tokens.len() != 5 {
        return Err(reject(FrameError::TokenCount(tokens.len())));
    }
    if tokens[0] != "DATA" || tokens[4] != "ENDATA" {
        return Err(reject(FrameError::Sentinel));
    }

    metrics(&tokens[1..4]).map_err(reject)
}

fn metrics(tokens: &[&str]) -> Result<Measurement, FrameError> {
    Ok(Measurement {
        temperature: number("temperature", tokens[0])?,
        humidity: number("humidity", tokens[1])?,
        fire_risk: number("fire_risk", tokens[2])?,
    })
}

fn number(field: &'static str, token: &str) -> Result<f64, FrameError> {
    let value: f64 = token.parse().map_err(|_| FrameError::Number {
        field,
        token: token.to_string(),
    })?;
    if !value.is_finite() {
        return Err(FrameError::NonFinite { field, value });
    }
    Ok(value)
}

// ==============================================================================
// stateful parser
// ==============================================================================

/// Accumulates serial bytes and emits frames as they complete.
#[derive(Debug)]
pub struct FrameParser {
    pending: Vec<u8>,
    max_pending: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PENDING)
    }
}

impl FrameParser {
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: Vec::with_capacity(max_pending.min(256)),
            max_pending,
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn push(&mut self, mut bytes: &[u8]) -> Batch {
        let mut batch = Batch::default();

        // never let the backlog grow more than one byte past the limit before
        // checking it, so the trim lands on the same stream byte however the
        // reads were split
        while !bytes.is_empty() {
            let room = (self.max_pending + 1).saturating_sub(self.pending.len()).max(1);
            let (now, rest) = bytes.split_at(room.min(bytes.len()));
            self.pending.extend_from_slice(now);
            bytes = rest;

            let (frames, consumed) = extract_frames(&self.pending);
            self.pending.drain(..consumed);
            batch.frames.extend(frames);

            if let Some(dropped) = self.trim_backlog() {
                *batch.overflowed.get_or_insert(0) += dropped;
            }
        }

        tracing::trace!(
            frames = batch.frames.len(),
            pending = self.pending.len(),
            "Scanned serial buffer"
        );
        batch
    }

    /// Keep only the newest partial frame once the backlog is over the limit.
    /// Leaves at most `max_pending` bytes.
    fn trim_backlog(&mut self) -> Option<usize> {
        if self.pending.len() <= self.max_pending {
            return None;
        }
        let len = self.pending.len();
        let keep_from = last_start(&self.pending)
            .filter(|&s| s > 0 && len - s <= self.max_pending)
            .unwrap_or(len);
        self.pending.drain(..keep_from);
        Some(keep_from)
    }
}

//! Host-side fault reporting.
//!
//! The hardware thread only records faults in the ring. Everything that
//! formats, logs or calls back happens here, on the host thread, once per
//! host step.

use std::fmt;

use crate::error::{Result, StreamError};
use crate::event::{EventCallback, StreamEvent};
use crate::pipeline::ring::{RingFault, SampleRing};

/// Which way samples flow through a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Capture,
    Playback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Playback => f.write_str("playback"),
        }
    }
}

/// Turns ring faults into log lines and [`StreamEvent`]s.
pub(crate) struct FaultReporter {
    direction: Direction,
    events: Option<EventCallback>,
}

impl FaultReporter {
    pub(crate) fn new(direction: Direction, events: Option<EventCallback>) -> Self {
        Self { direction, events }
    }

    /// Reports at most one pending fault.
    ///
    /// Returns `SizeMismatch` if the hardware broke the burst contract.
    pub(crate) fn poll(&self, ring: &SampleRing) -> Result<()> {
        let Some(fault) = ring.take_fault() else {
            return Ok(());
        };

        let stats = ring.stats();
        match fault {
            RingFault::Overrun => {
                tracing::warn!(
                    direction = %self.direction,
                    marker = fault.marker(),
                    total = stats.overruns,
                    "host fell behind, oldest slot dropped"
                );
                self.emit(StreamEvent::Overrun {
                    total: stats.overruns,
                });
                Ok(())
            }
            RingFault::Underrun => {
                tracing::warn!(
                    direction = %self.direction,
                    marker = fault.marker(),
                    total = stats.underruns,
                    "host fell behind, silence sent"
                );
                self.emit(StreamEvent::Underrun {
                    total: stats.underruns,
                });
                Ok(())
            }
            RingFault::SizeMismatch { actual } => {
                let expected = ring.slot_size();
                tracing::error!(
                    direction = %self.direction,
                    marker = fault.marker(),
                    "hardware burst of {} bytes does not match slot size of {} bytes",
                    actual,
                    expected
                );
                self.emit(StreamEvent::SizeMismatch { expected, actual });
                Err(StreamError::SizeMismatch { expected, actual })
            }
        }
    }

    pub(crate) fn stream_stopped(&self) {
        tracing::info!("{} stream stopped by device", self.direction);
        self.emit(StreamEvent::StreamStopped);
    }

    /// Logs a teardown summary if any overrun or underrun happened.
    pub(crate) fn summary(&self, ring: &SampleRing) {
        let stats = ring.stats();
        if ring.had_error() {
            tracing::warn!(
                "{} finished with dropouts: {} overrun(s), {} underrun(s)",
                self.direction,
                stats.overruns,
                stats.underruns
            );
        } else {
            tracing::debug!(
                "{} finished cleanly: {} slot(s) written, {} read",
                self.direction,
                stats.slots_written,
                stats.slots_read
            );
        }
    }

    /// Reports why a host wait failed and hands the error back.
    pub(crate) fn wait_failed(&self, ring: &SampleRing, err: StreamError) -> StreamError {
        match err {
            StreamError::StreamStopped => self.stream_stopped(),
            StreamError::SizeMismatch { .. } => {
                let _ = self.poll(ring);
            }
            _ => {}
        }
        err
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(ref callback) = self.events {
            callback(event);
        }
    }
}

/// Terminal condition remembered by an adapter so later steps fail fast
/// without re-reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    Stopped,
    SizeMismatch { expected: usize, actual: usize },
}

impl Halt {
    pub(crate) fn from_error(err: &StreamError) -> Option<Self> {
        match *err {
            StreamError::StreamStopped => Some(Self::Stopped),
            StreamError::SizeMismatch { expected, actual } => {
                Some(Self::SizeMismatch { expected, actual })
            }
            _ => None,
        }
    }

    pub(crate) fn to_error(self) -> StreamError {
        match self {
            Self::Stopped => StreamError::StreamStopped,
            Self::SizeMismatch { expected, actual } => {
                StreamError::SizeMismatch { expected, actual }
            }
        }
    }
}

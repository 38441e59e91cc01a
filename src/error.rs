//! Error types for iq-stream.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`StreamError`]): the stream cannot start, or must stop
//! - **Recoverable faults**: overruns and underruns recorded by the hardware
//!   thread and surfaced on the next host poll via [`StreamEvent`](crate::StreamEvent)

use crate::config::SampleFormat;

/// Result type for iq-stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors that prevent a stream from starting or force it to stop.
///
/// Overruns and underruns are deliberately absent: the stream keeps running
/// through them and they are reported as [`StreamEvent`](crate::StreamEvent)s.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Slot memory could not be reserved when the ring was created.
    #[error("failed to allocate {slot_count} slots of {slot_size} bytes")]
    Allocation {
        /// Number of slots requested.
        slot_count: usize,
        /// Size of each slot in bytes.
        slot_size: usize,
    },

    /// The stream configuration violates a setup-time invariant.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// The hardware delivered or requested a burst of the wrong size.
    #[error("hardware burst of {actual} bytes does not match slot size of {expected} bytes")]
    SizeMismatch {
        /// Configured slot size in bytes.
        expected: usize,
        /// Burst size the hardware used.
        actual: usize,
    },

    /// The device stopped streaming while the host was waiting on the ring.
    #[error("device stopped streaming")]
    StreamStopped,

    /// A host frame has a different length than the negotiated frame width.
    #[error("frame holds {actual} values, expected {expected}")]
    FrameMismatch {
        /// Values per frame negotiated at setup (two per complex sample).
        expected: usize,
        /// Values in the frame that was passed in.
        actual: usize,
    },

    /// A host frame has a different sample format than the adapter produces.
    #[error("frame format is {actual:?}, expected {expected:?}")]
    FormatMismatch {
        /// Format configured for the adapter.
        expected: SampleFormat,
        /// Format of the frame that was passed in.
        actual: SampleFormat,
    },

    /// An error from the device collaborator.
    #[error("device error: {0}")]
    Device(String),
}

impl StreamError {
    /// Creates an invalid configuration error with the given reason.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Creates a device error with the given message.
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Returns `true` if the stream cannot continue after this error.
    ///
    /// Frame and format mismatches are caller mistakes on a single call;
    /// the ring itself is untouched and the next well-formed call succeeds.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::FrameMismatch { .. } | Self::FormatMismatch { .. }
        )
    }
}

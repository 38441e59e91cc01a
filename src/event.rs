//! Runtime events for monitoring stream health.
//!
//! Events are non-fatal notifications about stream behavior, emitted from the
//! host thread when it polls the ring. The hardware thread only records
//! faults; it never formats, logs or calls back.

use std::sync::Arc;

/// Runtime events emitted while streaming.
///
/// Overruns and underruns are informational: the stream keeps running and
/// the affected interval is dropped or replaced by silence. A size mismatch
/// or a stopped stream is also reported here, right before the host step
/// returns the corresponding fatal error.
///
/// # Example
///
/// ```
/// use iq_stream::StreamEvent;
///
/// fn handle_event(event: StreamEvent) {
///     match event {
///         StreamEvent::Overrun { .. } => eprint!("O"),
///         StreamEvent::Underrun { .. } => eprint!("U"),
///         StreamEvent::SizeMismatch { expected, actual } => {
///             eprintln!("burst of {actual} bytes, expected {expected}");
///         }
///         StreamEvent::StreamStopped => eprintln!("device stopped"),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The host did not drain capture slots fast enough; the oldest unread
    /// slot was overwritten.
    Overrun {
        /// Overruns recorded since the ring was last reset.
        total: u64,
    },

    /// The host did not feed playback slots fast enough; the hardware sent
    /// silence instead.
    Underrun {
        /// Underruns recorded since the ring was last reset.
        total: u64,
    },

    /// The hardware used a burst size that differs from the slot size.
    ///
    /// The stream is terminated.
    SizeMismatch {
        /// Configured slot size in bytes.
        expected: usize,
        /// Burst size the hardware used.
        actual: usize,
    },

    /// The device stopped streaming while the host was waiting.
    StreamStopped,
}

impl StreamEvent {
    /// Returns the terse marker printed for this event.
    ///
    /// Markers are meant to be printed back to back, so a long-running
    /// stream shows dropouts as a visible but compact trail.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Overrun { .. } => "O",
            Self::Underrun { .. } => "U",
            Self::SizeMismatch { .. } => "M",
            Self::StreamStopped => "S",
        }
    }
}

/// Callback type for receiving runtime events.
///
/// Pass an event callback when starting a
/// [`CaptureSession`](crate::CaptureSession) or
/// [`PlaybackSession`](crate::PlaybackSession).
pub type EventCallback = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Creates an [`EventCallback`] from a closure.
///
/// # Example
///
/// ```
/// use iq_stream::{event_callback, StreamEvent};
///
/// let callback = event_callback(|event: StreamEvent| {
///     eprint!("{}", event.marker());
/// });
/// ```
pub fn event_callback<F>(f: F) -> EventCallback
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

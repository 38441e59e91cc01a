//! Playback direction: host frames in, hardware bursts out.

use std::sync::Arc;

use crate::config::{Backpressure, PlaybackConfig};
use crate::device::CallbackFlow;
use crate::error::{Result, StreamError};
use crate::event::EventCallback;
use crate::pipeline::diagnostics::{Direction, FaultReporter, Halt};
use crate::pipeline::ring::SampleRing;

/// Result of [`PlaybackAdapter::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum PushOutcome {
    /// The frame was written into the ring.
    Queued,
    /// The ring was full and the frame was not written.
    ///
    /// Only returned with [`Backpressure::Report`].
    Saturated,
}

/// Device-side transmit callback.
///
/// Handed to [`Transceiver::start_tx`](crate::Transceiver::start_tx). Drop
/// behaves like [`RxHandler`](crate::RxHandler)'s.
pub struct TxHandler {
    ring: Arc<SampleRing>,
    id: u64,
}

impl TxHandler {
    /// Creates a handler draining `ring`.
    pub fn new(ring: Arc<SampleRing>) -> Self {
        let id = ring.attach_handler();
        Self { ring, id }
    }

    /// Fills one outgoing burst.
    ///
    /// Startup bursts and underruns go out as silence.
    pub fn on_burst(&self, burst: &mut [u8]) -> CallbackFlow {
        if !self.ring.is_streaming() {
            burst.fill(0);
            return CallbackFlow::Stop;
        }
        if burst.len() != self.ring.slot_size() {
            self.ring.record_size_mismatch(burst.len());
            return CallbackFlow::Stop;
        }
        if self.ring.startup_skip_tick() {
            burst.fill(0);
            return CallbackFlow::Continue;
        }
        match self.ring.producer_read_slot(burst) {
            Ok(_) => CallbackFlow::Continue,
            Err(_) => CallbackFlow::Stop,
        }
    }

    /// Returns the burst size the handler expects.
    #[must_use]
    pub fn burst_size(&self) -> usize {
        self.ring.slot_size()
    }
}

impl Drop for TxHandler {
    fn drop(&mut self) {
        self.ring.detach_handler(self.id);
    }
}

impl std::fmt::Debug for TxHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxHandler")
            .field("burst_size", &self.ring.slot_size())
            .field("id", &self.id)
            .finish()
    }
}

/// Host-side writer that packs signed 8-bit frames into ring slots.
pub struct PlaybackAdapter {
    ring: Arc<SampleRing>,
    frame_bytes: usize,
    backpressure: Backpressure,
    reporter: FaultReporter,
    halted: Option<Halt>,
    frames_queued: u64,
}

impl PlaybackAdapter {
    /// Creates an adapter feeding `ring`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the frame width does not divide the slot,
    /// or if `ring` was sized differently from `config.ring`.
    pub fn new(
        ring: Arc<SampleRing>,
        config: &PlaybackConfig,
        events: Option<EventCallback>,
    ) -> Result<Self> {
        config.validate()?;
        if ring.slot_size() != config.ring.slot_size {
            return Err(StreamError::invalid_config(format!(
                "ring slot size {} does not match configured {}",
                ring.slot_size(),
                config.ring.slot_size
            )));
        }

        tracing::info!(
            "PlaybackAdapter creating: frame={} samples ({} bytes), backpressure={:?}",
            config.frame_len,
            config.frame_bytes(),
            config.backpressure
        );

        Ok(Self {
            ring,
            frame_bytes: config.frame_bytes(),
            backpressure: config.backpressure,
            reporter: FaultReporter::new(Direction::Playback, events),
            halted: None,
            frames_queued: 0,
        })
    }

    /// Interleaved values expected per frame (two per complex sample).
    #[must_use]
    pub fn frame_values(&self) -> usize {
        self.frame_bytes
    }

    /// Frames written since the adapter was created or re-armed.
    #[must_use]
    pub fn frames_queued(&self) -> u64 {
        self.frames_queued
    }

    /// The ring this adapter fills.
    #[must_use]
    pub fn ring(&self) -> &Arc<SampleRing> {
        &self.ring
    }

    /// One host step: report pending faults, wait for room, queue `frame`.
    ///
    /// With [`Backpressure::Block`] this waits until the hardware frees a
    /// slot; with [`Backpressure::Report`] it returns
    /// [`PushOutcome::Saturated`] instead.
    ///
    /// # Errors
    ///
    /// - `FrameMismatch` if `frame` is not [`frame_values`](Self::frame_values) long
    /// - `SizeMismatch` if the hardware broke the burst contract
    /// - `StreamStopped` once the device has stopped
    pub fn push(&mut self, frame: &[i8]) -> Result<PushOutcome> {
        if let Some(halt) = self.halted {
            return Err(halt.to_error());
        }
        if frame.len() != self.frame_bytes {
            return Err(StreamError::FrameMismatch {
                expected: self.frame_bytes,
                actual: frame.len(),
            });
        }

        let result = self.push_inner(frame);
        if let Err(ref err) = result {
            self.halted = Halt::from_error(err);
        }
        result
    }

    fn push_inner(&mut self, frame: &[i8]) -> Result<PushOutcome> {
        self.reporter.poll(&self.ring)?;

        let space = match self.backpressure {
            Backpressure::Block => self.ring.consumer_wait_space().map(|()| true),
            Backpressure::Report => self.ring.try_space(),
        };
        match space {
            Ok(true) => {}
            Ok(false) => return Ok(PushOutcome::Saturated),
            Err(err) => return Err(self.reporter.wait_failed(&self.ring, err)),
        }

        self.ring.write_tail(self.frame_bytes, |slot| {
            for (dst, &src) in slot.iter_mut().zip(frame) {
                *dst = src as u8;
            }
        });
        self.frames_queued += 1;
        Ok(PushOutcome::Queued)
    }

    /// Blocks until the ring has room, regardless of the backpressure mode.
    ///
    /// # Errors
    ///
    /// Same terminal errors as [`push`](Self::push).
    pub fn wait_space(&mut self) -> Result<()> {
        if let Some(halt) = self.halted {
            return Err(halt.to_error());
        }
        self.ring.consumer_wait_space().map_err(|err| {
            let err = self.reporter.wait_failed(&self.ring, err);
            self.halted = Halt::from_error(&err);
            err
        })
    }

    /// Blocks until the hardware has transmitted every queued frame.
    ///
    /// A partly filled slot is padded with silence and queued first.
    ///
    /// # Errors
    ///
    /// Same terminal errors as [`push`](Self::push).
    pub fn flush(&mut self) -> Result<()> {
        if let Some(halt) = self.halted {
            return Err(halt.to_error());
        }
        let padding = self.ring.seal_tail();
        if padding > 0 {
            tracing::debug!(padding, "partial slot padded with silence");
        }
        self.ring.consumer_wait_empty().map_err(|err| {
            let err = self.reporter.wait_failed(&self.ring, err);
            self.halted = Halt::from_error(&err);
            err
        })
    }

    pub(crate) fn rearm(&mut self) {
        self.halted = None;
        self.frames_queued = 0;
    }

    pub(crate) fn report_summary(&self) {
        let snap = self.ring.snapshot();
        if snap.ready > 0 || snap.fill_offset > 0 {
            tracing::warn!(
                slots = snap.ready,
                partial_bytes = snap.fill_offset,
                "playback stopped with unsent data"
            );
        }
        self.reporter.summary(&self.ring);
    }
}

impl std::fmt::Debug for PlaybackAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackAdapter")
            .field("frame_bytes", &self.frame_bytes)
            .field("backpressure", &self.backpressure)
            .field("halted", &self.halted)
            .field("frames_queued", &self.frames_queued)
            .finish_non_exhaustive()
    }
}

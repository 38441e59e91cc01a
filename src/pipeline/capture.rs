//! Capture direction: hardware bursts in, host frames out.
//!
//! [`RxHandler`] runs on the device thread and stores whole bursts in the
//! ring. [`CaptureAdapter`] runs on the host thread and hands out one
//! fixed-width frame per step, several frames per slot.

use std::sync::Arc;

use crate::config::{CaptureConfig, SampleFormat};
use crate::device::CallbackFlow;
use crate::error::{Result, StreamError};
use crate::event::EventCallback;
use crate::format::{ConversionTable, Frame};
use crate::pipeline::diagnostics::{Direction, FaultReporter, Halt};
use crate::pipeline::ring::SampleRing;

/// Device-side receive callback.
///
/// Handed to [`Transceiver::start_rx`](crate::Transceiver::start_rx). Each
/// call does a bounded amount of work and never waits on the host.
///
/// Dropping the handler ends the stream, unless the ring was reset since it
/// was created or another handler was already live on the ring. A device
/// that refuses a handler can therefore just drop it.
pub struct RxHandler {
    ring: Arc<SampleRing>,
    id: u64,
}

impl RxHandler {
    /// Creates a handler feeding `ring`.
    pub fn new(ring: Arc<SampleRing>) -> Self {
        let id = ring.attach_handler();
        Self { ring, id }
    }

    /// Processes one received burst.
    ///
    /// The size is checked first: a burst of the wrong size stops the stream
    /// and nothing is copied. Startup bursts are then discarded, and
    /// everything after that goes into the ring.
    pub fn on_burst(&self, burst: &[u8]) -> CallbackFlow {
        if !self.ring.is_streaming() {
            return CallbackFlow::Stop;
        }
        if burst.len() != self.ring.slot_size() {
            self.ring.record_size_mismatch(burst.len());
            return CallbackFlow::Stop;
        }
        if self.ring.startup_skip_tick() {
            return CallbackFlow::Continue;
        }
        match self.ring.producer_write_slot(burst) {
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

impl Drop for RxHandler {
    fn drop(&mut self) {
        self.ring.detach_handler(self.id);
    }
}

impl std::fmt::Debug for RxHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxHandler")
            .field("burst_size", &self.ring.slot_size())
            .field("id", &self.id)
            .finish()
    }
}

/// Host-side reader that turns ring slots into [`Frame`]s.
pub struct CaptureAdapter {
    ring: Arc<SampleRing>,
    frame_len: usize,
    frame_bytes: usize,
    format: SampleFormat,
    table: ConversionTable,
    reporter: FaultReporter,
    halted: Option<Halt>,
    frames_delivered: u64,
}

impl CaptureAdapter {
    /// Creates an adapter reading from `ring`.
    ///
    /// The conversion table is built here, once.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the frame width does not divide the slot,
    /// or if `ring` was sized differently from `config.ring`.
    pub fn new(
        ring: Arc<SampleRing>,
        config: &CaptureConfig,
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
            "CaptureAdapter creating: frame={} samples ({} bytes), format={:?}, {} frame(s) per slot",
            config.frame_len,
            config.frame_bytes(),
            config.format,
            ring.slot_size() / config.frame_bytes()
        );

        Ok(Self {
            ring,
            frame_len: config.frame_len,
            frame_bytes: config.frame_bytes(),
            format: config.format,
            table: ConversionTable::new(),
            reporter: FaultReporter::new(Direction::Capture, events),
            halted: None,
            frames_delivered: 0,
        })
    }

    /// Allocates a frame of the right format and width for [`pull`](Self::pull).
    #[must_use]
    pub fn new_frame(&self) -> Frame {
        Frame::new(self.format, self.frame_len)
    }

    /// Complex samples per frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Frames handed out since the adapter was created or re-armed.
    #[must_use]
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    /// The ring this adapter drains.
    #[must_use]
    pub fn ring(&self) -> &Arc<SampleRing> {
        &self.ring
    }

    /// One host step: report pending faults, wait for data, fill `frame`.
    ///
    /// Blocks until a slot is ready. After a terminal error every later
    /// call returns the same error without waiting.
    ///
    /// # Errors
    ///
    /// - `FormatMismatch` / `FrameMismatch` if `frame` was not made by
    ///   [`new_frame`](Self::new_frame); the stream is unaffected
    /// - `SizeMismatch` if the hardware broke the burst contract
    /// - `StreamStopped` once the device has stopped and the ring is drained
    pub fn pull(&mut self, frame: &mut Frame) -> Result<()> {
        if let Some(halt) = self.halted {
            return Err(halt.to_error());
        }
        self.check_frame(frame)?;

        let result = self.pull_inner(frame);
        if let Err(ref err) = result {
            self.halted = Halt::from_error(err);
        }
        result
    }

    fn pull_inner(&mut self, frame: &mut Frame) -> Result<()> {
        self.reporter.poll(&self.ring)?;

        if let Err(err) = self.ring.consumer_wait_slot() {
            return Err(self.reporter.wait_failed(&self.ring, err));
        }

        let table = &self.table;
        self.ring
            .read_head(self.frame_bytes, |bytes| frame.fill_from(bytes, table));
        self.frames_delivered += 1;

        if self.frames_delivered % 1000 == 0 {
            tracing::debug!(
                "CaptureAdapter: delivered frame #{}, ring={:?}",
                self.frames_delivered,
                self.ring.snapshot()
            );
        }
        Ok(())
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        if frame.format() != self.format {
            return Err(StreamError::FormatMismatch {
                expected: self.format,
                actual: frame.format(),
            });
        }
        if frame.len() != self.frame_bytes {
            return Err(StreamError::FrameMismatch {
                expected: self.frame_bytes,
                actual: frame.len(),
            });
        }
        Ok(())
    }

    /// Clears a remembered halt after the ring was reset for a restart.
    pub(crate) fn rearm(&mut self) {
        self.halted = None;
        self.frames_delivered = 0;
    }

    /// Logs the end-of-stream summary.
    pub(crate) fn report_summary(&self) {
        self.reporter.summary(&self.ring);
    }
}

impl std::fmt::Debug for CaptureAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureAdapter")
            .field("frame_len", &self.frame_len)
            .field("format", &self.format)
            .field("halted", &self.halted)
            .field("frames_delivered", &self.frames_delivered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RingConfig;

    fn setup(format: SampleFormat, skip: u32) -> (RxHandler, CaptureAdapter) {
        let config = CaptureConfig {
            ring: RingConfig {
                slot_count: 4,
                slot_size: 16,
                startup_skip: skip,
            },
            frame_len: 4,
            format,
        };
        let ring = Arc::new(SampleRing::create(&config.ring).unwrap());
        let handler = RxHandler::new(Arc::clone(&ring));
        let adapter = CaptureAdapter::new(ring, &config, None).unwrap();
        (handler, adapter)
    }

    #[test]
    fn test_slot_is_split_into_frames() {
        let (handler, mut adapter) = setup(SampleFormat::Int8, 0);
        let burst: Vec<u8> = (0..16).collect();
        assert_eq!(handler.on_burst(&burst), CallbackFlow::Continue);

        let mut frame = adapter.new_frame();
        for chunk in burst.chunks(8) {
            adapter.pull(&mut frame).unwrap();
            let expected: Vec<i8> = chunk.iter().map(|&b| b as i8).collect();
            assert_eq!(frame.as_int8(), Some(&expected[..]));
        }
        assert_eq!(adapter.ring().snapshot().ready, 0);
        assert_eq!(adapter.frames_delivered(), 2);
    }

    #[test]
    fn test_float_frames_are_normalized() {
        let (handler, mut adapter) = setup(SampleFormat::Float64, 0);
        handler.on_burst(&[0x40; 16]);

        let mut frame = adapter.new_frame();
        adapter.pull(&mut frame).unwrap();
        assert!(frame.as_float64().unwrap().iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_startup_bursts_are_discarded() {
        let (handler, mut adapter) = setup(SampleFormat::Int8, 2);
        for value in 1..=3u8 {
            assert_eq!(handler.on_burst(&[value; 16]), CallbackFlow::Continue);
        }
        assert_eq!(adapter.ring().snapshot().ready, 1);

        let mut frame = adapter.new_frame();
        adapter.pull(&mut frame).unwrap();
        assert_eq!(frame.as_int8(), Some(&[3i8; 8][..]));
    }

    #[test]
    fn test_size_mismatch_stops_before_skip() {
        let (handler, mut adapter) = setup(SampleFormat::Int8, 2);
        assert_eq!(handler.on_burst(&[0; 15]), CallbackFlow::Stop);
        assert_eq!(adapter.ring().snapshot().startup_skip, 2);

        let mut frame = adapter.new_frame();
        for _ in 0..2 {
            assert!(matches!(
                adapter.pull(&mut frame),
                Err(StreamError::SizeMismatch {
                    expected: 16,
                    actual: 15
                })
            ));
        }
    }

    #[test]
    fn test_wrong_frame_is_rejected_without_halting() {
        let (handler, mut adapter) = setup(SampleFormat::Int8, 0);
        let mut wrong_format = Frame::new(SampleFormat::Float64, 4);
        assert!(matches!(
            adapter.pull(&mut wrong_format),
            Err(StreamError::FormatMismatch { .. })
        ));
        let mut wrong_len = Frame::new(SampleFormat::Int8, 2);
        assert!(matches!(
            adapter.pull(&mut wrong_len),
            Err(StreamError::FrameMismatch {
                expected: 8,
                actual: 4
            })
        ));

        handler.on_burst(&[1; 16]);
        let mut frame = adapter.new_frame();
        assert!(adapter.pull(&mut frame).is_ok());
    }

    #[test]
    fn test_dropping_handler_ends_stream_after_drain() {
        let (handler, mut adapter) = setup(SampleFormat::Int8, 0);
        handler.on_burst(&[9; 16]);
        drop(handler);

        let mut frame = adapter.new_frame();
        adapter.pull(&mut frame).unwrap();
        adapter.pull(&mut frame).unwrap();
        assert!(matches!(
            adapter.pull(&mut frame),
            Err(StreamError::StreamStopped)
        ));
    }

    #[test]
    fn test_refused_handler_leaves_live_stream_alone() {
        let (handler, adapter) = setup(SampleFormat::Int8, 0);
        drop(RxHandler::new(Arc::clone(adapter.ring())));
        assert!(adapter.ring().is_streaming());
        assert_eq!(handler.on_burst(&[1; 16]), CallbackFlow::Continue);
    }

    #[test]
    fn test_handler_stops_once_ring_is_shut_down() {
        let (handler, adapter) = setup(SampleFormat::Int8, 0);
        adapter.ring().shutdown();
        assert_eq!(handler.on_burst(&[0; 16]), CallbackFlow::Stop);
    }

    #[test]
    fn test_mismatched_ring_rejected() {
        let ring = Arc::new(
            SampleRing::create(&RingConfig {
                slot_count: 2,
                slot_size: 32,
                startup_skip: 0,
            })
            .unwrap(),
        );
        let config = CaptureConfig {
            ring: RingConfig {
                slot_count: 2,
                slot_size: 16,
                startup_skip: 0,
            },
            frame_len: 4,
            format: SampleFormat::Int8,
        };
        assert!(matches!(
            CaptureAdapter::new(ring, &config, None),
            Err(StreamError::InvalidConfig { .. })
        ));
    }
}

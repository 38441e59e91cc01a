//! Stream session management.
//!
//! A session owns one device, one ring and one adapter, and walks them
//! through start, pause, resume and stop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{CaptureConfig, PlaybackConfig};
use crate::device::Transceiver;
use crate::error::{Result, StreamError};
use crate::event::EventCallback;
use crate::format::Frame;
use crate::pipeline::{
    CaptureAdapter, PlaybackAdapter, PushOutcome, RingStats, RxHandler, SampleRing, TxHandler,
};

/// Statistics about a streaming session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Host frames pulled (capture) or pushed (playback) since the last start.
    pub frames_processed: u64,
    /// Ring traffic since the last start.
    pub ring: RingStats,
}

/// Handle to a running receive stream.
///
/// # Lifecycle
///
/// 1. [`start`](Self::start) creates the ring and starts the device
/// 2. Call [`step`](Self::step) once per host tick to get a frame
/// 3. [`pause`](Self::pause) / [`resume`](Self::resume) restart without
///    reallocating
/// 4. Call [`stop`](Self::stop) for shutdown; dropping the session also
///    stops the device
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use iq_stream::{CaptureConfig, CaptureSession, MockTransceiver, RingConfig, StreamError};
///
/// let config = CaptureConfig {
///     ring: RingConfig { slot_count: 4, slot_size: 64, startup_skip: 0 },
///     frame_len: 16,
///     ..Default::default()
/// };
/// let device = MockTransceiver::new(64)
///     .with_interval(Duration::ZERO)
///     .with_max_bursts(2);
///
/// let mut session = CaptureSession::start(device, config, None)?;
/// let mut frame = session.new_frame();
/// let mut frames = 0;
/// loop {
///     match session.step(&mut frame) {
///         Ok(()) => frames += 1,
///         Err(StreamError::StreamStopped) => break,
///         Err(e) => return Err(e),
///     }
/// }
/// let stats = session.stop()?;
/// assert_eq!(frames, 4);
/// assert_eq!(stats.frames_processed, 4);
/// # Ok::<(), StreamError>(())
/// ```
pub struct CaptureSession<D: Transceiver> {
    device: D,
    ring: Arc<SampleRing>,
    adapter: CaptureAdapter,
    active: bool,
}

impl<D: Transceiver> CaptureSession<D> {
    /// Allocates the ring and starts receiving.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` or `Allocation` if the ring cannot be set up,
    /// and `Device` if the device refuses to start.
    pub fn start(
        mut device: D,
        config: CaptureConfig,
        events: Option<EventCallback>,
    ) -> Result<Self> {
        let ring = Arc::new(SampleRing::create(&config.ring)?);
        let adapter = CaptureAdapter::new(Arc::clone(&ring), &config, events)?;
        device.start_rx(RxHandler::new(Arc::clone(&ring)))?;
        tracing::info!("capture session started");

        Ok(Self {
            device,
            ring,
            adapter,
            active: true,
        })
    }

    /// Allocates a frame to pass to [`step`](Self::step).
    #[must_use]
    pub fn new_frame(&self) -> Frame {
        self.adapter.new_frame()
    }

    /// One host tick: reports faults and fills `frame`, waiting for data if
    /// needed.
    ///
    /// # Errors
    ///
    /// See [`CaptureAdapter::pull`].
    pub fn step(&mut self, frame: &mut Frame) -> Result<()> {
        self.adapter.pull(frame)
    }

    /// Stops the device and releases a host thread blocked in `step`.
    ///
    /// Slots already captured can still be drained with `step`.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the device fails to stop.
    pub fn pause(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let stopped = self.device.stop();
        self.ring.shutdown();
        self.adapter.report_summary();
        tracing::info!("capture session paused");
        stopped
    }

    /// Rewinds the ring and restarts receiving after [`pause`](Self::pause),
    /// or after the device ended on its own.
    ///
    /// Undrained slots are discarded and the startup skip applies again.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the device fails to stop or refuses to start.
    pub fn resume(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.pause()?;
        self.ring.reset();
        self.adapter.rearm();
        self.device.start_rx(RxHandler::new(Arc::clone(&self.ring)))?;
        self.active = true;
        tracing::info!("capture session resumed");
        Ok(())
    }

    /// Returns `true` if the session is started and the device still streams.
    pub fn is_running(&self) -> bool {
        self.active && self.ring.is_streaming()
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.adapter.frames_delivered(),
            ring: self.ring.stats(),
        }
    }

    /// The ring shared with the device.
    pub fn ring(&self) -> &Arc<SampleRing> {
        &self.ring
    }

    /// The device driving this session.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Stops the device and returns the final statistics.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the device fails to stop.
    pub fn stop(mut self) -> Result<SessionStats> {
        self.pause()?;
        Ok(self.stats())
    }
}

impl<D: Transceiver + 'static> CaptureSession<D> {
    /// Moves the session onto a blocking task that forwards every frame
    /// into `tx`.
    ///
    /// The task ends when the device stops or the receiver is dropped, and
    /// resolves to the final statistics.
    ///
    /// Each frame sent is a fresh copy owned by the receiver, so this helper
    /// allocates once per frame. Call [`step`](Self::step) directly with one
    /// reused [`Frame`] for an allocation-free loop.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_forwarder(
        mut self,
        tx: mpsc::Sender<Frame>,
    ) -> JoinHandle<Result<SessionStats>> {
        tokio::task::spawn_blocking(move || {
            let mut frame = self.new_frame();
            loop {
                match self.step(&mut frame) {
                    Ok(()) => {
                        if tx.blocking_send(frame.clone()).is_err() {
                            tracing::debug!("frame receiver closed, stopping capture");
                            break;
                        }
                    }
                    Err(StreamError::StreamStopped) => break,
                    Err(err) => {
                        let _ = self.pause();
                        return Err(err);
                    }
                }
            }
            self.stop()
        })
    }
}

impl<D: Transceiver> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if self.active {
            // Session dropped without explicit stop()
            let _ = self.pause();
        }
    }
}

impl<D: Transceiver> std::fmt::Debug for CaptureSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("adapter", &self.adapter)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Handle to a running transmit stream.
///
/// Mirrors [`CaptureSession`]: [`push`](Self::push) queues one frame per
/// host tick.
pub struct PlaybackSession<D: Transceiver> {
    device: D,
    ring: Arc<SampleRing>,
    adapter: PlaybackAdapter,
    active: bool,
}

impl<D: Transceiver> PlaybackSession<D> {
    /// Allocates the ring and starts transmitting.
    ///
    /// The device sends silence until the first slot is queued.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` or `Allocation` if the ring cannot be set up,
    /// and `Device` if the device refuses to start.
    pub fn start(
        mut device: D,
        config: PlaybackConfig,
        events: Option<EventCallback>,
    ) -> Result<Self> {
        let ring = Arc::new(SampleRing::create(&config.ring)?);
        let adapter = PlaybackAdapter::new(Arc::clone(&ring), &config, events)?;
        device.start_tx(TxHandler::new(Arc::clone(&ring)))?;
        tracing::info!("playback session started");

        Ok(Self {
            device,
            ring,
            adapter,
            active: true,
        })
    }

    /// Interleaved values expected per frame.
    #[must_use]
    pub fn frame_values(&self) -> usize {
        self.adapter.frame_values()
    }

    /// One host tick: reports faults and queues `frame`.
    ///
    /// # Errors
    ///
    /// See [`PlaybackAdapter::push`].
    pub fn push(&mut self, frame: &[i8]) -> Result<PushOutcome> {
        self.adapter.push(frame)
    }

    /// Blocks until the ring has room for another frame.
    ///
    /// # Errors
    ///
    /// See [`PlaybackAdapter::wait_space`].
    pub fn wait_space(&mut self) -> Result<()> {
        self.adapter.wait_space()
    }

    /// Blocks until the device has sent every full queued slot.
    ///
    /// # Errors
    ///
    /// See [`PlaybackAdapter::flush`].
    pub fn flush(&mut self) -> Result<()> {
        self.adapter.flush()
    }

    /// Stops the device and releases a host thread blocked in `push`.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the device fails to stop.
    pub fn pause(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        let stopped = self.device.stop();
        self.ring.shutdown();
        self.adapter.report_summary();
        tracing::info!("playback session paused");
        stopped
    }

    /// Rewinds the ring and restarts transmitting after [`pause`](Self::pause),
    /// or after the device ended on its own.
    ///
    /// Queued slots are discarded.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the device fails to stop or refuses to start.
    pub fn resume(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.pause()?;
        self.ring.reset();
        self.adapter.rearm();
        self.device.start_tx(TxHandler::new(Arc::clone(&self.ring)))?;
        self.active = true;
        tracing::info!("playback session resumed");
        Ok(())
    }

    /// Returns `true` if the session is started and the device still streams.
    pub fn is_running(&self) -> bool {
        self.active && self.ring.is_streaming()
    }

    /// Returns current session statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_processed: self.adapter.frames_queued(),
            ring: self.ring.stats(),
        }
    }

    /// The ring shared with the device.
    pub fn ring(&self) -> &Arc<SampleRing> {
        &self.ring
    }

    /// The device driving this session.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Stops the device and returns the final statistics.
    ///
    /// Queued slots that were not sent yet are discarded; call
    /// [`flush`](Self::flush) first to wait for them.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the device fails to stop.
    pub fn stop(mut self) -> Result<SessionStats> {
        self.pause()?;
        Ok(self.stats())
    }

    fn feed(&mut self, frame: &[i8]) -> Result<()> {
        loop {
            match self.push(frame)? {
                PushOutcome::Queued => return Ok(()),
                PushOutcome::Saturated => self.wait_space()?,
            }
        }
    }
}

impl<D: Transceiver + 'static> PlaybackSession<D> {
    /// Moves the session onto a blocking task that queues every frame
    /// received from `rx`.
    ///
    /// Once `rx` closes, the task waits for the queued slots to go out,
    /// stops the device and resolves to the final statistics. It also ends
    /// early if the device stops.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn spawn_feeder(
        mut self,
        mut rx: mpsc::Receiver<Vec<i8>>,
    ) -> JoinHandle<Result<SessionStats>> {
        tokio::task::spawn_blocking(move || {
            while let Some(frame) = rx.blocking_recv() {
                match self.feed(&frame) {
                    Ok(()) => {}
                    Err(StreamError::StreamStopped) => return self.stop(),
                    Err(err) => {
                        let _ = self.pause();
                        return Err(err);
                    }
                }
            }
            tracing::debug!("frame sender closed, flushing playback");
            match self.flush() {
                Ok(()) | Err(StreamError::StreamStopped) => self.stop(),
                Err(err) => {
                    let _ = self.pause();
                    Err(err)
                }
            }
        })
    }
}

impl<D: Transceiver> Drop for PlaybackSession<D> {
    fn drop(&mut self) {
        if self.active {
            // Session dropped without explicit stop()
            let _ = self.pause();
        }
    }
}

impl<D: Transceiver> std::fmt::Debug for PlaybackSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("adapter", &self.adapter)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

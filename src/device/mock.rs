//! Mock transceiver for testing without hardware.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::device::{CallbackFlow, Transceiver};
use crate::error::{Result, StreamError};
use crate::pipeline::{RxHandler, TxHandler};

/// Fills one received burst; gets the zero-based burst index.
pub type BurstFill = Arc<dyn Fn(u64, &mut [u8]) + Send + Sync>;

/// Stop flag shared with the worker, plus a condvar so pacing sleeps can be
/// cut short.
type Control = Arc<(Mutex<bool>, Condvar)>;

/// A transceiver that generates bursts on a plain thread.
///
/// Receive bursts are produced by a fill function (by default every byte is
/// the burst index), transmitted bursts are recorded for inspection. This
/// allows testing the full pipeline without an SDR attached, making it
/// suitable for CI environments.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use iq_stream::MockTransceiver;
///
/// let mock = MockTransceiver::new(4096)
///     .with_interval(Duration::from_millis(1))
///     .with_max_bursts(8)
///     .with_fill(|index, burst| burst.fill(index as u8));
/// assert_eq!(mock.burst_size(), 4096);
/// ```
pub struct MockTransceiver {
    burst_size: usize,
    interval: Duration,
    max_bursts: Option<u64>,
    fill: BurstFill,
    transmitted: Arc<Mutex<Vec<Vec<u8>>>>,
    control: Control,
    worker: Option<JoinHandle<()>>,
}

impl MockTransceiver {
    /// Creates a mock delivering bursts of `burst_size` bytes.
    ///
    /// Pass a size different from the ring's slot size to provoke a size
    /// mismatch.
    pub fn new(burst_size: usize) -> Self {
        Self {
            burst_size,
            interval: Duration::from_millis(1),
            max_bursts: None,
            fill: Arc::new(|index, burst| burst.fill(index as u8)),
            transmitted: Arc::new(Mutex::new(Vec::new())),
            control: Arc::new((Mutex::new(false), Condvar::new())),
            worker: None,
        }
    }

    /// Sets the pause between bursts. Zero runs as fast as possible.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Ends the stream on its own after `count` bursts.
    #[must_use]
    pub fn with_max_bursts(mut self, count: u64) -> Self {
        self.max_bursts = Some(count);
        self
    }

    /// Sets the function that generates received bursts.
    #[must_use]
    pub fn with_fill<F>(mut self, fill: F) -> Self
    where
        F: Fn(u64, &mut [u8]) + Send + Sync + 'static,
    {
        self.fill = Arc::new(fill);
        self
    }

    /// Returns the burst size in bytes.
    pub fn burst_size(&self) -> usize {
        self.burst_size
    }

    /// Returns a copy of every burst transmitted so far.
    pub fn transmitted(&self) -> Vec<Vec<u8>> {
        self.transmitted.lock().clone()
    }

    fn spawn<F>(&mut self, name: &str, mut on_burst: F) -> Result<()>
    where
        F: FnMut(u64) -> CallbackFlow + Send + 'static,
    {
        if self.is_streaming() {
            return Err(StreamError::device("mock transceiver is already streaming"));
        }
        // Reap a worker that ended on its own.
        self.stop()?;
        *self.control.0.lock() = false;

        let control = Arc::clone(&self.control);
        let interval = self.interval;
        let max_bursts = self.max_bursts;

        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut index = 0u64;
                loop {
                    if max_bursts.is_some_and(|max| index >= max) {
                        tracing::debug!("mock burst limit of {} reached", index);
                        break;
                    }
                    if on_burst(index) == CallbackFlow::Stop {
                        tracing::debug!("mock handler stopped the stream after {} bursts", index);
                        break;
                    }
                    index += 1;

                    let (stopped, cond) = &*control;
                    let mut stopped = stopped.lock();
                    if !*stopped && !interval.is_zero() {
                        cond.wait_for(&mut stopped, interval);
                    }
                    if *stopped {
                        break;
                    }
                }
            })
            .map_err(|e| StreamError::device(format!("failed to spawn {name}: {e}")))?;

        self.worker = Some(worker);
        Ok(())
    }
}

impl Transceiver for MockTransceiver {
    fn start_rx(&mut self, handler: RxHandler) -> Result<()> {
        tracing::info!("mock RX starting: {} byte bursts", self.burst_size);
        let fill = Arc::clone(&self.fill);
        let mut burst = vec![0u8; self.burst_size];
        self.spawn("mock-rx", move |index| {
            fill(index, &mut burst);
            handler.on_burst(&burst)
        })
    }

    fn start_tx(&mut self, handler: TxHandler) -> Result<()> {
        tracing::info!("mock TX starting: {} byte bursts", self.burst_size);
        let transmitted = Arc::clone(&self.transmitted);
        let mut burst = vec![0u8; self.burst_size];
        self.spawn("mock-tx", move |_| {
            let flow = handler.on_burst(&mut burst);
            if flow == CallbackFlow::Continue {
                transmitted.lock().push(burst.clone());
            }
            flow
        })
    }

    fn stop(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        {
            let (stopped, cond) = &*self.control;
            *stopped.lock() = true;
            cond.notify_all();
        }
        worker
            .join()
            .map_err(|_| StreamError::device("mock worker panicked"))?;
        tracing::debug!("mock transceiver stopped");
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }
}

impl Drop for MockTransceiver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl std::fmt::Debug for MockTransceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransceiver")
            .field("burst_size", &self.burst_size)
            .field("interval", &self.interval)
            .field("max_bursts", &self.max_bursts)
            .field("streaming", &self.is_streaming())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RingConfig;
    use crate::pipeline::SampleRing;

    fn ring(slot_size: usize) -> Arc<SampleRing> {
        Arc::new(
            SampleRing::create(&RingConfig {
                slot_count: 64,
                slot_size,
                startup_skip: 0,
            })
            .unwrap(),
        )
    }

    fn wait_finished(mock: &MockTransceiver) {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while mock.is_streaming() {
            assert!(std::time::Instant::now() < deadline, "mock never finished");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_rx_delivers_indexed_bursts() {
        let ring = ring(4);
        let mut mock = MockTransceiver::new(4)
            .with_interval(Duration::ZERO)
            .with_max_bursts(3);
        mock.start_rx(RxHandler::new(Arc::clone(&ring))).unwrap();
        wait_finished(&mock);
        mock.stop().unwrap();

        let snap = ring.snapshot();
        assert_eq!(snap.ready, 3);
        assert!(!snap.streaming);
    }

    #[test]
    fn test_rx_stops_on_size_mismatch() {
        let ring = ring(8);
        let mut mock = MockTransceiver::new(4).with_interval(Duration::ZERO);
        mock.start_rx(RxHandler::new(Arc::clone(&ring))).unwrap();
        mock.stop().unwrap();
        assert!(ring.snapshot().fault.is_some_and(|f| f.is_terminal()));
    }

    #[test]
    fn test_tx_records_bursts() {
        let ring = ring(4);
        let mut mock = MockTransceiver::new(4)
            .with_interval(Duration::ZERO)
            .with_max_bursts(2);
        mock.start_tx(TxHandler::new(Arc::clone(&ring))).unwrap();
        wait_finished(&mock);
        mock.stop().unwrap();
        assert_eq!(mock.transmitted(), vec![vec![0; 4], vec![0; 4]]);
    }

    #[test]
    fn test_stop_interrupts_long_interval() {
        let ring = ring(4);
        let mut mock = MockTransceiver::new(4).with_interval(Duration::from_secs(60));
        mock.start_rx(RxHandler::new(ring)).unwrap();
        assert!(mock.is_streaming());

        let started = std::time::Instant::now();
        mock.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!mock.is_streaming());
    }

    #[test]
    fn test_double_start_rejected() {
        let ring = ring(4);
        let mut mock = MockTransceiver::new(4).with_interval(Duration::from_secs(60));
        mock.start_rx(RxHandler::new(Arc::clone(&ring))).unwrap();
        assert!(matches!(
            mock.start_rx(RxHandler::new(Arc::clone(&ring))),
            Err(StreamError::Device(_))
        ));
        assert!(ring.is_streaming());
        assert!(mock.is_streaming());
    }

    #[test]
    fn test_live_stream_survives_refused_start() {
        let ring = ring(4);
        let mut mock = MockTransceiver::new(4).with_interval(Duration::from_millis(1));
        mock.start_rx(RxHandler::new(Arc::clone(&ring))).unwrap();
        assert!(mock.start_rx(RxHandler::new(Arc::clone(&ring))).is_err());

        let written = ring.stats().slots_written;
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while ring.stats().slots_written < written + 3 {
            assert!(std::time::Instant::now() < deadline, "stream stalled");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(ring.is_streaming());
        mock.stop().unwrap();
        assert!(!ring.is_streaming());
    }
}

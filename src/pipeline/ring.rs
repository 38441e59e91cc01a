//! Bounded multi-slot sample ring shared by the hardware and host threads.
//!
//! The ring is a fixed set of equally sized byte slots. One side fills slots
//! at `tail`, the other drains them at `head`, and `ready` counts the filled,
//! undrained slots. The counters live behind a single mutex that is held only
//! long enough to read or bump them; the bulk copy into or out of a slot
//! happens under that slot's own lock.
//!
//! The hardware-facing operations ([`producer_write_slot`], [`producer_read_slot`],
//! [`startup_skip_tick`]) never wait: slot locks are only ever `try_lock`ed
//! from the hardware side, overruns overwrite the oldest slot and underruns
//! substitute silence. Only the host-facing waits block.
//!
//! [`producer_write_slot`]: SampleRing::producer_write_slot
//! [`producer_read_slot`]: SampleRing::producer_read_slot
//! [`startup_skip_tick`]: SampleRing::startup_skip_tick

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::config::RingConfig;
use crate::error::{Result, StreamError};

/// Anomaly recorded by a hardware-facing ring operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingFault {
    /// Capture: the host fell behind and the oldest unread slot was lost.
    Overrun,
    /// Playback: the host fell behind and the hardware sent silence.
    Underrun,
    /// The hardware used a burst size other than the slot size. Terminal.
    SizeMismatch {
        /// Burst size the hardware used.
        actual: usize,
    },
}

impl RingFault {
    /// Returns the terse marker printed for this fault.
    #[must_use]
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Overrun => "O",
            Self::Underrun => "U",
            Self::SizeMismatch { .. } => "M",
        }
    }

    /// Returns `true` if the stream cannot continue after this fault.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. })
    }
}

/// Result of [`SampleRing::producer_write_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The burst was stored in a free slot.
    Stored,
    /// The ring was saturated; the oldest unread data was dropped.
    Overrun,
}

/// Result of [`SampleRing::producer_read_slot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A queued slot was copied out.
    Delivered,
    /// No slot was ready; the buffer was zero-filled.
    Underrun,
}

/// Counters describing ring traffic since the last reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RingStats {
    /// Slots committed by the filling side.
    pub slots_written: u64,
    /// Slots released by the draining side.
    pub slots_read: u64,
    /// Overruns recorded.
    pub overruns: u64,
    /// Underruns recorded.
    pub underruns: u64,
    /// Startup bursts discarded.
    pub bursts_skipped: u64,
}

/// Point-in-time copy of the ring's indices and fault state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSnapshot {
    /// Next slot to drain.
    pub head: usize,
    /// Next slot to fill.
    pub tail: usize,
    /// Filled, undrained slots.
    pub ready: usize,
    /// Byte offset inside the slot being partially filled or drained.
    pub fill_offset: usize,
    /// Startup bursts still to discard.
    pub startup_skip: u32,
    /// Transient fault not yet polled by the host.
    pub fault: Option<RingFault>,
    /// Whether any overrun or underrun happened since the last reset.
    pub had_error: bool,
    /// Whether the driving stream is still live.
    pub streaming: bool,
}

struct RingState {
    head: usize,
    tail: usize,
    ready: usize,
    fill_offset: usize,
    /// Slots ever released at `head`. The host re-checks it under the slot
    /// lock so it never copies from a slot an overrun just reclaimed.
    released: u64,
    /// Handler whose drop ends the stream. Cleared on reset, so handlers
    /// from an earlier start and handlers a device refused go inert.
    owner: Option<u64>,
    startup_skip: u32,
    fault: Option<RingFault>,
    had_error: bool,
    streaming: bool,
}

impl RingState {
    fn new(startup_skip: u32) -> Self {
        Self {
            head: 0,
            tail: 0,
            ready: 0,
            fill_offset: 0,
            released: 0,
            owner: None,
            startup_skip,
            fault: None,
            had_error: false,
            streaming: true,
        }
    }

    /// Records a fault without masking a terminal one.
    fn set_fault(&mut self, fault: RingFault) {
        if !self.fault.is_some_and(|f| f.is_terminal()) {
            self.fault = Some(fault);
        }
        if !fault.is_terminal() {
            self.had_error = true;
        }
    }
}

#[derive(Default)]
struct Counters {
    slots_written: AtomicU64,
    slots_read: AtomicU64,
    overruns: AtomicU64,
    underruns: AtomicU64,
    bursts_skipped: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RingStats {
        RingStats {
            slots_written: self.slots_written.load(Ordering::Relaxed),
            slots_read: self.slots_read.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            underruns: self.underruns.load(Ordering::Relaxed),
            bursts_skipped: self.bursts_skipped.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.slots_written,
            &self.slots_read,
            &self.overruns,
            &self.underruns,
            &self.bursts_skipped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Fixed-capacity ring of equally sized byte slots.
///
/// One ring carries one direction of one stream, with exactly one thread on
/// each side. It is shared through an `Arc` between the hardware-side handler
/// and the host-side adapter.
///
/// # Example
///
/// ```
/// use iq_stream::{RingConfig, SampleRing};
///
/// let ring = SampleRing::create(&RingConfig {
///     slot_count: 4,
///     slot_size: 8,
///     startup_skip: 0,
/// })?;
///
/// ring.producer_write_slot(&[1, 2, 3, 4, 5, 6, 7, 8])?;
/// assert_eq!(ring.snapshot().ready, 1);
/// # Ok::<(), iq_stream::StreamError>(())
/// ```
pub struct SampleRing {
    slots: Box<[Mutex<Box<[u8]>>]>,
    slot_size: usize,
    startup_skip: u32,
    state: Mutex<RingState>,
    cond: Condvar,
    counters: Counters,
    handler_ids: AtomicU64,
}

impl SampleRing {
    /// Allocates `slot_count` zeroed slots of `slot_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty ring and `Allocation` if the slot
    /// memory cannot be reserved.
    pub fn create(config: &RingConfig) -> Result<Self> {
        config.validate()?;

        let alloc_error = || StreamError::Allocation {
            slot_count: config.slot_count,
            slot_size: config.slot_size,
        };

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.slot_count)
            .map_err(|_| alloc_error())?;
        for _ in 0..config.slot_count {
            let mut slot = Vec::new();
            slot.try_reserve_exact(config.slot_size)
                .map_err(|_| alloc_error())?;
            slot.resize(config.slot_size, 0);
            slots.push(Mutex::new(slot.into_boxed_slice()));
        }

        tracing::info!(
            slot_count = config.slot_count,
            slot_size = config.slot_size,
            startup_skip = config.startup_skip,
            "sample ring created"
        );

        Ok(Self {
            slots: slots.into_boxed_slice(),
            slot_size: config.slot_size,
            startup_skip: config.startup_skip,
            state: Mutex::new(RingState::new(config.startup_skip)),
            cond: Condvar::new(),
            counters: Counters::default(),
            handler_ids: AtomicU64::new(0),
        })
    }

    /// Returns the slot size in bytes.
    #[must_use]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Rewinds the ring for a new start without reallocating.
    ///
    /// Zeroes the indices, offset, counters and fault state, re-arms the
    /// startup skip and marks the stream live again. Must only be called
    /// while neither side has an operation in flight.
    pub fn reset(&self) {
        *self.state.lock() = RingState::new(self.startup_skip);
        self.counters.reset();
        tracing::debug!("sample ring reset");
    }

    /// Stores one hardware burst in the slot at `tail`.
    ///
    /// Called from the hardware thread, never blocks. If the host has not
    /// kept up and every slot is full, the oldest unread slot is overwritten,
    /// `head` moves past it and an overrun is recorded.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if `bytes` is not exactly one slot long. The
    /// fault is recorded, the stream is marked stopped and nothing is copied.
    pub fn producer_write_slot(&self, bytes: &[u8]) -> Result<WriteOutcome> {
        if bytes.len() != self.slot_size {
            return Err(self.record_size_mismatch(bytes.len()));
        }

        let index = self.state.lock().tail;

        // The host holds a slot lock only while copying out of `head`, which
        // is `tail` only when the ring is saturated.
        let Some(mut slot) = self.slots[index].try_lock() else {
            self.state.lock().set_fault(RingFault::Overrun);
            Counters::bump(&self.counters.overruns);
            return Ok(WriteOutcome::Overrun);
        };
        slot.copy_from_slice(bytes);

        // Commit before releasing the slot so a host copy can never observe
        // the new bytes under the old indices.
        let slot_count = self.slots.len();
        let mut state = self.state.lock();
        state.tail = (state.tail + 1) % slot_count;
        let outcome = if state.ready == slot_count {
            // The overwritten slot was the oldest; it is now the newest.
            state.head = (state.head + 1) % slot_count;
            state.fill_offset = 0;
            state.released += 1;
            state.set_fault(RingFault::Overrun);
            WriteOutcome::Overrun
        } else {
            state.ready += 1;
            WriteOutcome::Stored
        };
        drop(state);
        drop(slot);

        Counters::bump(&self.counters.slots_written);
        match outcome {
            WriteOutcome::Overrun => Counters::bump(&self.counters.overruns),
            WriteOutcome::Stored => {
                self.cond.notify_one();
            }
        }
        Ok(outcome)
    }

    /// Copies the slot at `head` into `out` for transmission.
    ///
    /// Called from the hardware thread, never blocks. If no slot is ready,
    /// `out` is zero-filled, `head` stays put and an underrun is recorded.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` if `out` is not exactly one slot long.
    pub fn producer_read_slot(&self, out: &mut [u8]) -> Result<ReadOutcome> {
        if out.len() != self.slot_size {
            return Err(self.record_size_mismatch(out.len()));
        }

        let index = {
            let mut state = self.state.lock();
            if state.ready == 0 {
                state.set_fault(RingFault::Underrun);
                drop(state);
                return Ok(self.substitute_silence(out));
            }
            state.head
        };

        // The host only writes the `tail` slot, which is never a ready slot.
        let Some(slot) = self.slots[index].try_lock() else {
            self.state.lock().set_fault(RingFault::Underrun);
            return Ok(self.substitute_silence(out));
        };
        out.copy_from_slice(&slot);
        drop(slot);

        {
            let mut state = self.state.lock();
            state.head = (state.head + 1) % self.slots.len();
            state.ready -= 1;
            state.released += 1;
        }
        self.cond.notify_one();
        Counters::bump(&self.counters.slots_read);
        Ok(ReadOutcome::Delivered)
    }

    fn substitute_silence(&self, out: &mut [u8]) -> ReadOutcome {
        out.fill(0);
        Counters::bump(&self.counters.underruns);
        ReadOutcome::Underrun
    }

    /// Blocks the host until at least one filled slot is ready.
    ///
    /// Slots filled before the stream stopped are still handed out.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` once the hardware reported a bad burst, and
    /// `StreamStopped` if the stream ended with nothing left to drain.
    pub fn consumer_wait_slot(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if let Some(RingFault::SizeMismatch { actual }) = state.fault {
                return Err(self.size_mismatch_error(actual));
            }
            if state.ready > 0 {
                return Ok(());
            }
            if !state.streaming {
                return Err(StreamError::StreamStopped);
            }
            self.cond.wait(&mut state);
        }
    }

    /// Blocks the host until the ring has room for another slot.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` once the hardware reported a bad burst, and
    /// `StreamStopped` if the stream is no longer live.
    pub fn consumer_wait_space(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if let Some(RingFault::SizeMismatch { actual }) = state.fault {
                return Err(self.size_mismatch_error(actual));
            }
            if !state.streaming {
                return Err(StreamError::StreamStopped);
            }
            if state.ready < self.slots.len() {
                return Ok(());
            }
            self.cond.wait(&mut state);
        }
    }

    /// Blocks the host until the hardware has taken every queued slot.
    ///
    /// A partially filled slot at `tail` is not queued and does not count.
    ///
    /// # Errors
    ///
    /// Returns `SizeMismatch` once the hardware reported a bad burst, and
    /// `StreamStopped` if the stream ended with slots still queued.
    pub fn consumer_wait_empty(&self) -> Result<()> {
        let mut state = self.state.lock();
        loop {
            if let Some(RingFault::SizeMismatch { actual }) = state.fault {
                return Err(self.size_mismatch_error(actual));
            }
            if state.ready == 0 {
                return Ok(());
            }
            if !state.streaming {
                return Err(StreamError::StreamStopped);
            }
            self.cond.wait(&mut state);
        }
    }

    /// Non-blocking form of [`consumer_wait_space`](Self::consumer_wait_space).
    ///
    /// Returns `Ok(false)` while the ring is saturated.
    ///
    /// # Errors
    ///
    /// Same as `consumer_wait_space`.
    pub fn try_space(&self) -> Result<bool> {
        let state = self.state.lock();
        if let Some(RingFault::SizeMismatch { actual }) = state.fault {
            return Err(self.size_mismatch_error(actual));
        }
        if !state.streaming {
            return Err(StreamError::StreamStopped);
        }
        Ok(state.ready < self.slots.len())
    }

    /// Consumes one startup skip credit.
    ///
    /// Returns `true` if the caller should discard the current burst. Never
    /// touches `ready`.
    pub fn startup_skip_tick(&self) -> bool {
        let mut state = self.state.lock();
        if state.startup_skip == 0 {
            return false;
        }
        state.startup_skip -= 1;
        drop(state);
        Counters::bump(&self.counters.bursts_skipped);
        true
    }

    /// Hands `len` bytes at the current drain offset of the `head` slot to
    /// `read`, then advances the offset, releasing the slot once it is
    /// fully drained.
    ///
    /// The caller must have seen a ready slot via `consumer_wait_slot` and
    /// `len` must divide the slot size.
    pub(crate) fn read_head<F>(&self, len: usize, read: F)
    where
        F: FnOnce(&[u8]),
    {
        loop {
            let (index, released) = {
                let state = self.state.lock();
                (state.head, state.released)
            };

            let slot = self.slots[index].lock();
            let state = self.state.lock();
            if state.released != released {
                // An overrun reclaimed the slot before we got hold of it.
                continue;
            }
            let offset = state.fill_offset;
            drop(state);

            read(&slot[offset..offset + len]);

            let mut state = self.state.lock();
            state.fill_offset += len;
            if state.fill_offset >= self.slot_size {
                state.fill_offset = 0;
                state.head = (state.head + 1) % self.slots.len();
                state.ready -= 1;
                state.released += 1;
                drop(state);
                Counters::bump(&self.counters.slots_read);
            }
            return;
        }
    }

    /// Lets `write` fill `len` bytes at the current fill offset of the `tail`
    /// slot, then advances the offset, publishing the slot to the hardware
    /// once it is full.
    ///
    /// The caller must have seen free space via `consumer_wait_space` or
    /// `try_space` and `len` must divide the slot size.
    pub(crate) fn write_tail<F>(&self, len: usize, write: F)
    where
        F: FnOnce(&mut [u8]),
    {
        let (index, offset) = {
            let state = self.state.lock();
            (state.tail, state.fill_offset)
        };

        {
            let mut slot = self.slots[index].lock();
            write(&mut slot[offset..offset + len]);
        }

        let mut state = self.state.lock();
        state.fill_offset += len;
        if state.fill_offset >= self.slot_size {
            state.fill_offset = 0;
            state.tail = (state.tail + 1) % self.slots.len();
            state.ready += 1;
            drop(state);
            Counters::bump(&self.counters.slots_written);
        }
    }

    /// Zero-pads a partially written `tail` slot and publishes it.
    ///
    /// Returns the number of padding bytes, or `0` if there was nothing to
    /// publish.
    pub(crate) fn seal_tail(&self) -> usize {
        let (index, offset) = {
            let state = self.state.lock();
            if state.fill_offset == 0 || state.ready == self.slots.len() {
                return 0;
            }
            (state.tail, state.fill_offset)
        };

        self.slots[index].lock()[offset..].fill(0);

        {
            let mut state = self.state.lock();
            state.fill_offset = 0;
            state.tail = (state.tail + 1) % self.slots.len();
            state.ready += 1;
        }
        Counters::bump(&self.counters.slots_written);
        self.slot_size - offset
    }

    /// Records a terminal size mismatch and wakes the host.
    pub(crate) fn record_size_mismatch(&self, actual: usize) -> StreamError {
        {
            let mut state = self.state.lock();
            state.set_fault(RingFault::SizeMismatch { actual });
            state.streaming = false;
        }
        self.cond.notify_all();
        self.size_mismatch_error(actual)
    }

    fn size_mismatch_error(&self, actual: usize) -> StreamError {
        StreamError::SizeMismatch {
            expected: self.slot_size,
            actual,
        }
    }

    /// Marks the stream stopped and wakes any blocked host thread.
    pub fn shutdown(&self) {
        self.state.lock().streaming = false;
        self.cond.notify_all();
    }

    /// Registers a new device-side handler and returns its id.
    ///
    /// The first handler registered since creation or the last reset owns
    /// the stream. Later ones do not.
    pub(crate) fn attach_handler(&self) -> u64 {
        let id = self.handler_ids.fetch_add(1, Ordering::Relaxed);
        let mut state = self.state.lock();
        if state.owner.is_none() {
            state.owner = Some(id);
        }
        id
    }

    /// Like [`shutdown`](Self::shutdown), but only if handler `id` owns the
    /// stream.
    pub(crate) fn detach_handler(&self, id: u64) {
        {
            let mut state = self.state.lock();
            if state.owner != Some(id) {
                return;
            }
            state.owner = None;
            state.streaming = false;
        }
        self.cond.notify_all();
    }

    /// Returns `true` while the driving stream is live.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state.lock().streaming
    }

    /// Reads and clears the transient fault.
    ///
    /// Overruns and underruns are returned once and cleared, so each poll
    /// yields at most one marker. A size mismatch stays in place.
    pub fn take_fault(&self) -> Option<RingFault> {
        let mut state = self.state.lock();
        match state.fault {
            Some(fault) if fault.is_terminal() => Some(fault),
            _ => state.fault.take(),
        }
    }

    /// Returns `true` if an overrun or underrun happened since the last reset.
    #[must_use]
    pub fn had_error(&self) -> bool {
        self.state.lock().had_error
    }

    /// Returns a copy of the indices and fault state.
    #[must_use]
    pub fn snapshot(&self) -> RingSnapshot {
        let state = self.state.lock();
        RingSnapshot {
            head: state.head,
            tail: state.tail,
            ready: state.ready,
            fill_offset: state.fill_offset,
            startup_skip: state.startup_skip,
            fault: state.fault,
            had_error: state.had_error,
            streaming: state.streaming,
        }
    }

    /// Returns traffic counters since the last reset.
    #[must_use]
    pub fn stats(&self) -> RingStats {
        self.counters.snapshot()
    }
}

impl std::fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRing")
            .field("slot_count", &self.slots.len())
            .field("slot_size", &self.slot_size)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn ring(slot_count: usize, slot_size: usize) -> SampleRing {
        SampleRing::create(&RingConfig {
            slot_count,
            slot_size,
            startup_skip: 0,
        })
        .unwrap()
    }

    fn drain_slot(ring: &SampleRing) -> Vec<u8> {
        ring.consumer_wait_slot().unwrap();
        let mut out = Vec::new();
        ring.read_head(ring.slot_size(), |bytes| out.extend_from_slice(bytes));
        out
    }

    fn fill_slot(ring: &SampleRing, value: u8) {
        ring.consumer_wait_space().unwrap();
        ring.write_tail(ring.slot_size(), |slot| slot.fill(value));
    }

    #[test]
    fn test_create_allocates_zeroed_slots() {
        let ring = ring(4, 16);
        assert_eq!(ring.slot_count(), 4);
        assert_eq!(ring.slot_size(), 16);
        for slot in ring.slots.iter() {
            assert!(slot.lock().iter().all(|&b| b == 0));
        }
        let snap = ring.snapshot();
        assert_eq!((snap.head, snap.tail, snap.ready), (0, 0, 0));
        assert!(snap.streaming);
    }

    #[test]
    fn test_create_rejects_empty_ring() {
        let result = SampleRing::create(&RingConfig {
            slot_count: 0,
            ..Default::default()
        });
        assert!(matches!(result, Err(StreamError::InvalidConfig { .. })));
    }

    #[test]
    fn test_create_reports_allocation_failure() {
        let result = SampleRing::create(&RingConfig {
            slot_count: 1,
            slot_size: usize::MAX,
            startup_skip: 0,
        });
        assert!(matches!(
            result,
            Err(StreamError::Allocation {
                slot_count: 1,
                slot_size: usize::MAX
            })
        ));
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let ring = ring(4, 8);
        let payload = [1u8, 2, 3, 4, 250, 251, 252, 253];
        assert_eq!(
            ring.producer_write_slot(&payload).unwrap(),
            WriteOutcome::Stored
        );
        assert_eq!(drain_slot(&ring), payload);
        assert_eq!(ring.snapshot().ready, 0);
        assert_eq!(ring.stats().slots_read, 1);
    }

    #[test]
    fn test_overrun_drops_oldest_slot() {
        let ring = ring(4, 8);
        for payload in 1..=4u8 {
            assert_eq!(
                ring.producer_write_slot(&[payload; 8]).unwrap(),
                WriteOutcome::Stored
            );
        }
        assert_eq!(
            ring.producer_write_slot(&[5; 8]).unwrap(),
            WriteOutcome::Overrun
        );

        let snap = ring.snapshot();
        assert_eq!(snap.ready, 4);
        assert_eq!(snap.fault, Some(RingFault::Overrun));
        assert!(snap.had_error);
        assert_eq!(ring.stats().overruns, 1);

        // The first write is gone; the ring now holds writes 2 through 5.
        for expected in 2..=5u8 {
            assert_eq!(drain_slot(&ring), vec![expected; 8]);
        }
    }

    #[test]
    fn test_overrun_abandons_partial_drain() {
        let ring = ring(2, 8);
        ring.producer_write_slot(&[1; 8]).unwrap();
        ring.producer_write_slot(&[2; 8]).unwrap();

        ring.consumer_wait_slot().unwrap();
        ring.read_head(4, |_| {});
        assert_eq!(ring.snapshot().fill_offset, 4);

        ring.producer_write_slot(&[3; 8]).unwrap();
        let snap = ring.snapshot();
        assert_eq!(snap.fill_offset, 0);
        assert_eq!(snap.head, 1);
        assert_eq!(drain_slot(&ring), vec![2; 8]);
        assert_eq!(drain_slot(&ring), vec![3; 8]);
    }

    #[test]
    fn test_underrun_yields_silence() {
        let ring = ring(4, 8);
        let mut out = [0xaau8; 8];
        assert_eq!(
            ring.producer_read_slot(&mut out).unwrap(),
            ReadOutcome::Underrun
        );
        assert_eq!(out, [0; 8]);

        let snap = ring.snapshot();
        assert_eq!(snap.head, 0);
        assert_eq!(snap.fault, Some(RingFault::Underrun));
        assert!(snap.had_error);
        assert_eq!(ring.stats().underruns, 1);
    }

    #[test]
    fn test_playback_slots_delivered_in_order() {
        let ring = ring(4, 8);
        fill_slot(&ring, 7);
        fill_slot(&ring, 9);

        let mut out = [0u8; 8];
        assert_eq!(
            ring.producer_read_slot(&mut out).unwrap(),
            ReadOutcome::Delivered
        );
        assert_eq!(out, [7; 8]);
        ring.producer_read_slot(&mut out).unwrap();
        assert_eq!(out, [9; 8]);
        assert_eq!(ring.snapshot().ready, 0);
    }

    #[test]
    fn test_size_mismatch_is_terminal_and_copies_nothing() {
        let ring = ring(4, 8);
        let err = ring.producer_write_slot(&[1; 5]).unwrap_err();
        assert!(matches!(
            err,
            StreamError::SizeMismatch {
                expected: 8,
                actual: 5
            }
        ));

        let snap = ring.snapshot();
        assert_eq!(snap.fault, Some(RingFault::SizeMismatch { actual: 5 }));
        assert_eq!((snap.tail, snap.ready), (0, 0));
        assert!(!snap.streaming);
        assert!(ring.slots[0].lock().iter().all(|&b| b == 0));

        assert!(matches!(
            ring.consumer_wait_slot(),
            Err(StreamError::SizeMismatch { .. })
        ));
        // Polling does not clear it.
        assert_eq!(ring.take_fault(), Some(RingFault::SizeMismatch { actual: 5 }));
        assert_eq!(ring.take_fault(), Some(RingFault::SizeMismatch { actual: 5 }));
    }

    #[test]
    fn test_overrun_does_not_mask_size_mismatch() {
        let ring = ring(1, 4);
        ring.producer_write_slot(&[1; 4]).unwrap();
        let _ = ring.producer_write_slot(&[1; 3]);
        ring.producer_write_slot(&[2; 4]).unwrap();
        assert!(ring.snapshot().fault.is_some_and(|f| f.is_terminal()));
    }

    #[test]
    fn test_startup_skip_ticks() {
        let ring = SampleRing::create(&RingConfig {
            slot_count: 4,
            slot_size: 8,
            startup_skip: 2,
        })
        .unwrap();

        assert!(ring.startup_skip_tick());
        assert!(ring.startup_skip_tick());
        assert!(!ring.startup_skip_tick());

        let snap = ring.snapshot();
        assert_eq!((snap.tail, snap.ready, snap.startup_skip), (0, 0, 0));
        assert_eq!(ring.stats().bursts_skipped, 2);
    }

    #[test]
    fn test_take_fault_clears_once() {
        let ring = ring(1, 4);
        ring.producer_write_slot(&[1; 4]).unwrap();
        ring.producer_write_slot(&[2; 4]).unwrap();
        ring.producer_write_slot(&[3; 4]).unwrap();

        assert_eq!(ring.take_fault(), Some(RingFault::Overrun));
        assert_eq!(ring.take_fault(), None);
        assert!(ring.had_error());
        assert_eq!(ring.stats().overruns, 2);
    }

    #[test]
    fn test_reset_rewinds_without_reallocating() {
        let ring = SampleRing::create(&RingConfig {
            slot_count: 2,
            slot_size: 4,
            startup_skip: 1,
        })
        .unwrap();
        assert!(ring.startup_skip_tick());
        ring.producer_write_slot(&[1; 4]).unwrap();
        ring.producer_write_slot(&[2; 4]).unwrap();
        ring.producer_write_slot(&[3; 4]).unwrap();
        ring.shutdown();

        ring.reset();

        let snap = ring.snapshot();
        assert_eq!((snap.head, snap.tail, snap.ready, snap.fill_offset), (0, 0, 0, 0));
        assert_eq!(snap.startup_skip, 1);
        assert_eq!(snap.fault, None);
        assert!(!snap.had_error);
        assert!(snap.streaming);
        assert_eq!(ring.stats(), RingStats::default());
    }

    #[test]
    fn test_handler_from_before_reset_is_inert() {
        let ring = ring(2, 4);
        let stale = ring.attach_handler();
        ring.reset();
        let live = ring.attach_handler();
        ring.detach_handler(stale);
        assert!(ring.is_streaming());
        ring.detach_handler(live);
        assert!(!ring.is_streaming());
    }

    #[test]
    fn test_only_first_handler_owns_stream() {
        let ring = ring(2, 4);
        let first = ring.attach_handler();
        let second = ring.attach_handler();
        ring.detach_handler(second);
        assert!(ring.is_streaming());
        ring.detach_handler(first);
        assert!(!ring.is_streaming());
    }

    #[test]
    fn test_seal_tail_pads_partial_slot() {
        let ring = ring(2, 8);
        ring.write_tail(4, |bytes| bytes.fill(7));
        assert_eq!(ring.snapshot().ready, 0);

        assert_eq!(ring.seal_tail(), 4);
        let snap = ring.snapshot();
        assert_eq!((snap.tail, snap.ready, snap.fill_offset), (1, 1, 0));
        assert_eq!(ring.stats().slots_written, 1);

        let mut out = [0xaau8; 8];
        ring.producer_read_slot(&mut out).unwrap();
        assert_eq!(out, [7, 7, 7, 7, 0, 0, 0, 0]);
        assert_eq!(ring.seal_tail(), 0);
    }

    #[test]
    fn test_drains_remaining_slots_after_stop() {
        let ring = ring(4, 4);
        ring.producer_write_slot(&[1; 4]).unwrap();
        ring.shutdown();
        assert_eq!(drain_slot(&ring), vec![1; 4]);
        assert!(matches!(
            ring.consumer_wait_slot(),
            Err(StreamError::StreamStopped)
        ));
    }

    #[test]
    fn test_shutdown_wakes_waiting_consumer() {
        let ring = Arc::new(ring(4, 4));
        let waiter = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.consumer_wait_slot())
        };

        thread::sleep(Duration::from_millis(50));
        ring.shutdown();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(StreamError::StreamStopped)));
    }

    #[test]
    fn test_wait_space_blocks_until_hardware_drains() {
        let ring = Arc::new(ring(2, 4));
        fill_slot(&ring, 1);
        fill_slot(&ring, 2);
        assert!(!ring.try_space().unwrap());

        let waiter = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.consumer_wait_space())
        };

        thread::sleep(Duration::from_millis(50));
        let mut out = [0u8; 4];
        ring.producer_read_slot(&mut out).unwrap();

        assert!(waiter.join().unwrap().is_ok());
        assert!(ring.try_space().unwrap());
    }

    #[test]
    fn test_wait_empty_returns_once_hardware_drains() {
        let ring = Arc::new(ring(2, 4));
        fill_slot(&ring, 1);
        let waiter = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.consumer_wait_empty())
        };

        thread::sleep(Duration::from_millis(50));
        let mut out = [0u8; 4];
        ring.producer_read_slot(&mut out).unwrap();
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_wait_space_reports_stopped_stream() {
        let ring = ring(2, 4);
        ring.shutdown();
        assert!(matches!(
            ring.consumer_wait_space(),
            Err(StreamError::StreamStopped)
        ));
        assert!(matches!(ring.try_space(), Err(StreamError::StreamStopped)));
    }

    /// Real threads on both sides: every drained slot is intact and slots
    /// come out in the order they went in, minus any dropped by overruns.
    #[test]
    fn test_concurrent_capture_preserves_order() {
        let ring = Arc::new(ring(4, 64));
        let bursts = 2000u32;

        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut burst = [0u8; 64];
                for seq in 0..bursts {
                    for chunk in burst.chunks_exact_mut(4) {
                        chunk.copy_from_slice(&seq.to_le_bytes());
                    }
                    ring.producer_write_slot(&burst).unwrap();
                }
                ring.shutdown();
            })
        };

        let mut last = None;
        let mut drained = 0u64;
        while ring.consumer_wait_slot().is_ok() {
            let mut slot = Vec::with_capacity(64);
            ring.read_head(64, |bytes| slot.extend_from_slice(bytes));
            let seq = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]);
            for chunk in slot.chunks_exact(4) {
                assert_eq!(chunk, &seq.to_le_bytes(), "torn slot {seq}");
            }
            if let Some(prev) = last {
                assert!(seq > prev, "slot {seq} drained after {prev}");
            }
            last = Some(seq);
            drained += 1;
        }
        producer.join().unwrap();

        let stats = ring.stats();
        assert_eq!(drained, stats.slots_read);
        assert_eq!(drained + stats.overruns, u64::from(bursts));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// One complex sample per host step.
        const FRAME: usize = 2;

        fn check_bounds(ring: &SampleRing) -> std::result::Result<(), TestCaseError> {
            let snap = ring.snapshot();
            let n = ring.slot_count();
            prop_assert!(snap.ready <= n);
            prop_assert!(snap.head < n);
            prop_assert!(snap.tail < n);
            prop_assert!(snap.fill_offset < ring.slot_size());
            prop_assert_eq!((snap.head + snap.ready) % n, snap.tail);
            Ok(())
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(64))]

            #[test]
            fn property_capture_interleavings_stay_in_bounds(
                slot_count in 1usize..6,
                frames_per_slot in 1usize..4,
                steps in prop::collection::vec(any::<bool>(), 1..400)
            ) {
                let ring = ring(slot_count, frames_per_slot * FRAME);
                let burst = vec![0u8; ring.slot_size()];

                for hardware in steps {
                    if hardware {
                        ring.producer_write_slot(&burst).unwrap();
                    } else if ring.snapshot().ready > 0 {
                        ring.read_head(FRAME, |_| {});
                    }
                    check_bounds(&ring)?;
                }

                let stats = ring.stats();
                prop_assert_eq!(
                    stats.slots_written - stats.slots_read - stats.overruns,
                    ring.snapshot().ready as u64
                );
            }

            #[test]
            fn property_playback_interleavings_stay_in_bounds(
                slot_count in 1usize..6,
                frames_per_slot in 1usize..4,
                steps in prop::collection::vec(any::<bool>(), 1..400)
            ) {
                let ring = ring(slot_count, frames_per_slot * FRAME);
                let mut out = vec![0u8; ring.slot_size()];
                let mut underruns = 0u64;

                for hardware in steps {
                    if hardware {
                        match ring.producer_read_slot(&mut out).unwrap() {
                            ReadOutcome::Delivered => prop_assert!(out.iter().all(|&b| b == 1)),
                            ReadOutcome::Underrun => {
                                underruns += 1;
                                prop_assert!(out.iter().all(|&b| b == 0));
                            }
                        }
                    } else if ring.try_space().unwrap() {
                        ring.write_tail(FRAME, |bytes| bytes.fill(1));
                    }
                    check_bounds(&ring)?;
                }

                let stats = ring.stats();
                prop_assert_eq!(stats.underruns, underruns);
                prop_assert_eq!(
                    stats.slots_written - stats.slots_read,
                    ring.snapshot().ready as u64
                );
            }
        }
    }
}

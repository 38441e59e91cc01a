//! Configuration types for IQ streams.

use crate::error::{Result, StreamError};

/// Size of one hardware burst, and therefore of one ring slot, in bytes.
pub const BUFFER_SIZE: usize = 16 * 32 * 512;

/// Number of slots in the reference ring sizing.
pub const NUMBER_OF_BUFFERS: usize = 16;

/// Bytes per complex sample: the device moves 8-bit I and 8-bit Q.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Bursts discarded right after streaming starts.
///
/// The first transfers after a start carry warm-up garbage.
pub const DEFAULT_STARTUP_SKIP: u32 = 2;

/// Sizing of a [`SampleRing`](crate::SampleRing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    /// Number of slots in the ring.
    pub slot_count: usize,
    /// Bytes per slot. Must equal the hardware burst size.
    pub slot_size: usize,
    /// Bursts to discard after every (re)start.
    pub startup_skip: u32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            slot_count: NUMBER_OF_BUFFERS,
            slot_size: BUFFER_SIZE,
            startup_skip: DEFAULT_STARTUP_SKIP,
        }
    }
}

impl RingConfig {
    /// Checks that the ring has at least one non-empty slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the slot count or slot size is zero.
    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 {
            return Err(StreamError::invalid_config("slot count must be non-zero"));
        }
        if self.slot_size == 0 {
            return Err(StreamError::invalid_config("slot size must be non-zero"));
        }
        Ok(())
    }
}

/// Sample format handed to the host pipeline by the capture adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// Raw signed 8-bit interleaved I/Q, copied without conversion.
    #[default]
    Int8,
    /// Interleaved I/Q normalized to `[-1.0, 1.0)` through the lookup table.
    Float64,
}

/// What the playback adapter does when the ring is saturated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backpressure {
    /// Block the host thread until the hardware frees a slot.
    ///
    /// Trades host latency for zero sample loss.
    #[default]
    Block,
    /// Return [`PushOutcome::Saturated`](crate::PushOutcome::Saturated) and
    /// let the caller retry.
    Report,
}

/// Configuration for the capture (hardware to host) direction.
///
/// # Example
///
/// ```
/// use iq_stream::{CaptureConfig, SampleFormat};
///
/// let config = CaptureConfig {
///     frame_len: 1024,
///     format: SampleFormat::Float64,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Ring sizing.
    pub ring: RingConfig,
    /// Complex samples per host frame.
    ///
    /// `frame_len * BYTES_PER_SAMPLE` must evenly divide the slot size.
    /// Default: 4096
    pub frame_len: usize,
    /// Format of the frames handed to the host.
    pub format: SampleFormat,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ring: RingConfig::default(),
            frame_len: 4096,
            format: SampleFormat::Int8,
        }
    }
}

impl CaptureConfig {
    /// Bytes consumed from the ring per host frame.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.frame_len * BYTES_PER_SAMPLE
    }

    /// Validates the ring sizing and the frame width against it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the ring is empty or the frame width does
    /// not evenly divide the slot.
    pub fn validate(&self) -> Result<()> {
        self.ring.validate()?;
        validate_frame(self.frame_len, self.ring.slot_size)
    }
}

/// Configuration for the playback (host to hardware) direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Ring sizing.
    pub ring: RingConfig,
    /// Complex samples per host frame.
    ///
    /// Default: one full slot.
    pub frame_len: usize,
    /// Behavior when the host outpaces the hardware.
    pub backpressure: Backpressure,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ring: RingConfig::default(),
            frame_len: BUFFER_SIZE / BYTES_PER_SAMPLE,
            backpressure: Backpressure::Block,
        }
    }
}

impl PlaybackConfig {
    /// Bytes written into the ring per host frame.
    #[must_use]
    pub fn frame_bytes(&self) -> usize {
        self.frame_len * BYTES_PER_SAMPLE
    }

    /// Validates the ring sizing and the frame width against it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the ring is empty or the frame width does
    /// not evenly divide the slot.
    pub fn validate(&self) -> Result<()> {
        self.ring.validate()?;
        validate_frame(self.frame_len, self.ring.slot_size)
    }
}

fn validate_frame(frame_len: usize, slot_size: usize) -> Result<()> {
    if frame_len == 0 {
        return Err(StreamError::invalid_config("frame length must be non-zero"));
    }
    if slot_size % BYTES_PER_SAMPLE != 0 {
        return Err(StreamError::invalid_config(format!(
            "slot size {slot_size} is not a whole number of {BYTES_PER_SAMPLE}-byte samples"
        )));
    }
    let samples_per_slot = slot_size / BYTES_PER_SAMPLE;
    if samples_per_slot % frame_len != 0 {
        return Err(StreamError::invalid_config(format!(
            "frame length {frame_len} must evenly divide {samples_per_slot} samples per slot"
        )));
    }
    Ok(())
}

//! Reusable host frame buffer.

use crate::config::{SampleFormat, BYTES_PER_SAMPLE};
use crate::format::ConversionTable;

/// One host frame of interleaved I/Q values.
///
/// Even indices hold I, odd indices hold Q. A frame is allocated once at
/// setup (see [`CaptureAdapter::new_frame`](crate::CaptureAdapter::new_frame))
/// and refilled in place on every host step, so the steady-state path does
/// not allocate.
///
/// # Example
///
/// ```
/// use iq_stream::{Frame, SampleFormat};
///
/// let frame = Frame::new(SampleFormat::Float64, 256);
/// assert_eq!(frame.sample_count(), 256);
/// assert_eq!(frame.len(), 512);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Raw signed 8-bit values.
    Int8(Vec<i8>),
    /// Values normalized through the lookup table.
    Float64(Vec<f64>),
}

impl Frame {
    /// Creates a zeroed frame holding `sample_count` complex samples.
    #[must_use]
    pub fn new(format: SampleFormat, sample_count: usize) -> Self {
        let values = sample_count * BYTES_PER_SAMPLE;
        match format {
            SampleFormat::Int8 => Self::Int8(vec![0; values]),
            SampleFormat::Float64 => Self::Float64(vec![0.0; values]),
        }
    }

    /// Returns the sample format of this frame.
    #[must_use]
    pub fn format(&self) -> SampleFormat {
        match self {
            Self::Int8(_) => SampleFormat::Int8,
            Self::Float64(_) => SampleFormat::Float64,
        }
    }

    /// Returns the number of interleaved values (two per complex sample).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(values) => values.len(),
            Self::Float64(values) => values.len(),
        }
    }

    /// Returns `true` if the frame holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of complex samples.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.len() / BYTES_PER_SAMPLE
    }

    /// Returns the raw values, if this is an `Int8` frame.
    #[must_use]
    pub fn as_int8(&self) -> Option<&[i8]> {
        match self {
            Self::Int8(values) => Some(values),
            Self::Float64(_) => None,
        }
    }

    /// Returns the normalized values, if this is a `Float64` frame.
    #[must_use]
    pub fn as_float64(&self) -> Option<&[f64]> {
        match self {
            Self::Float64(values) => Some(values),
            Self::Int8(_) => None,
        }
    }

    /// Returns the I/Q pair at `index`, normalized to `[-1.0, 1.0)`.
    #[must_use]
    pub fn iq(&self, index: usize) -> Option<(f64, f64)> {
        let i = index * BYTES_PER_SAMPLE;
        match self {
            Self::Int8(values) => values
                .get(i..i + 2)
                .map(|p| (f64::from(p[0]) / 128.0, f64::from(p[1]) / 128.0)),
            Self::Float64(values) => values.get(i..i + 2).map(|p| (p[0], p[1])),
        }
    }

    /// Overwrites the frame with `bytes` taken from a ring slot.
    ///
    /// `bytes.len()` must equal `self.len()`; the caller checks this.
    /// `Float64` frames go through `table`.
    pub(crate) fn fill_from(&mut self, bytes: &[u8], table: &ConversionTable) {
        match self {
            Self::Int8(values) => {
                for (dst, &src) in values.iter_mut().zip(bytes) {
                    *dst = src as i8;
                }
            }
            Self::Float64(values) => table.convert_into(bytes, values),
        }
    }
}

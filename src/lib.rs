//! # iq-stream
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time IQ sample streaming between SDR driver threads and host pipelines.
//!
//! `iq-stream` moves interleaved 8-bit I/Q samples between a transceiver's
//! callback thread and a host processing loop through a bounded ring of
//! fixed-size slots. The hardware side never blocks: when the host falls
//! behind, capture drops the oldest slot and playback sends silence, and the
//! host is told about it on its next step.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iq_stream::{event_callback, CaptureConfig, CaptureSession, MockTransceiver, SampleFormat};
//!
//! let config = CaptureConfig {
//!     format: SampleFormat::Float64,
//!     ..Default::default()
//! };
//! let device = MockTransceiver::new(config.ring.slot_size);
//! let events = event_callback(|e| eprint!("{}", e.marker()));
//!
//! let mut session = CaptureSession::start(device, config, Some(events))?;
//! let mut frame = session.new_frame();
//! loop {
//!     session.step(&mut frame)?;
//!     // Demodulate, decode, plot...
//! }
//! # Ok::<(), iq_stream::StreamError>(())
//! ```
//!
//! ## Architecture
//!
//! The crate maintains a strict thread boundary:
//!
//! - **Device thread**: calls [`RxHandler`] / [`TxHandler`] once per burst;
//!   never waits on the host
//! - **Sample ring**: fixed slots sized to the hardware burst, allocated once
//! - **Host thread**: [`CaptureAdapter`] / [`PlaybackAdapter`] move one frame
//!   per step and report overruns, underruns and size mismatches

#![warn(missing_docs)]
// Sample code requires intentional numeric casts between byte and sample types
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::missing_panics_doc)]

mod config;
mod device;
mod error;
mod event;
pub mod format;
mod pipeline;
mod session;

pub use config::{
    Backpressure, CaptureConfig, PlaybackConfig, RingConfig, SampleFormat, BUFFER_SIZE,
    BYTES_PER_SAMPLE, DEFAULT_STARTUP_SKIP, NUMBER_OF_BUFFERS,
};
pub use device::{CallbackFlow, MockTransceiver, Transceiver};
pub use error::{Result, StreamError};
pub use event::{event_callback, EventCallback, StreamEvent};
pub use format::Frame;
pub use pipeline::{
    CaptureAdapter, PlaybackAdapter, PushOutcome, ReadOutcome, RingFault, RingSnapshot, RingStats,
    RxHandler, SampleRing, TxHandler, WriteOutcome,
};
pub use session::{CaptureSession, PlaybackSession, SessionStats};

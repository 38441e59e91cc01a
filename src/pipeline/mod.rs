//! Sample pipeline between the device thread and the host thread.
//!
//! ```text
//!            capture                                playback
//! device ── RxHandler ──► SampleRing ──► CaptureAdapter ──► host frames
//! device ◄── TxHandler ◄── SampleRing ◄── PlaybackAdapter ◄── host frames
//! ```
//!
//! - **Handlers** run on the device thread, move whole bursts and never wait
//! - **Sample ring**: fixed slots; overruns drop the oldest slot, underruns
//!   send silence
//! - **Adapters** run on the host thread, move one frame per step and block
//!   only while the ring is empty (capture) or full (playback)
//! - **Diagnostics**: faults are recorded by the device side and reported by
//!   the host side on its next step

mod capture;
mod diagnostics;
mod playback;
mod ring;

pub use capture::{CaptureAdapter, RxHandler};
pub use playback::{PlaybackAdapter, PushOutcome, TxHandler};
pub use ring::{ReadOutcome, RingFault, RingSnapshot, RingStats, SampleRing, WriteOutcome};

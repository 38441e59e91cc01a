//! Device boundary.
//!
//! A [`Transceiver`] owns the hardware thread. It calls an [`RxHandler`] once
//! per received burst and a [`TxHandler`] once per burst it is about to send.
//! Handlers never block, so the driver's callback thread keeps its timing no
//! matter what the host is doing.
//!
//! Real drivers live outside this crate; [`MockTransceiver`] drives the same
//! handlers from a plain thread for tests and demos.

mod mock;

pub use mock::MockTransceiver;

use crate::error::Result;
use crate::pipeline::{RxHandler, TxHandler};

/// What a handler asks the driver to do after a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    /// Keep streaming.
    Continue,
    /// End the stream; the driver should stop calling the handler.
    Stop,
}

/// A half-duplex SDR transceiver.
///
/// Only one direction streams at a time. Dropping the handler a driver was
/// started with marks the stream stopped and wakes the host, so a driver that
/// ends on its own must drop it.
pub trait Transceiver: Send {
    /// Starts receiving; `handler` gets one call per burst.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the hardware refuses to start.
    fn start_rx(&mut self, handler: RxHandler) -> Result<()>;

    /// Starts transmitting; `handler` fills one buffer per burst.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the hardware refuses to start.
    fn start_tx(&mut self, handler: TxHandler) -> Result<()>;

    /// Stops the active direction and waits for the callback thread to exit.
    ///
    /// Stopping an idle device is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Device` if the hardware fails to stop cleanly.
    fn stop(&mut self) -> Result<()>;

    /// Returns `true` while a direction is streaming.
    fn is_streaming(&self) -> bool;
}

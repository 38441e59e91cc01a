//! Host-side sample formats.
//!
//! The device moves interleaved signed 8-bit I/Q bytes. The only conversion
//! offered is normalization to `f64` through a 256-entry lookup table:
//! - [`ConversionTable`]: raw byte to normalized amplitude
//! - [`Frame`]: a reusable host frame in either format

mod frame;
mod lut;

pub use frame::Frame;
pub use lut::ConversionTable;

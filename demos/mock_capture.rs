//! Capture example.
//!
//! Streams normalized IQ frames from a mock transceiver into a channel and
//! prints the mean power of each frame.
//!
//! Run with: cargo run --example mock_capture

use std::time::Duration;

use iq_stream::{
    event_callback, CaptureConfig, CaptureSession, Frame, MockTransceiver, RingConfig,
    SampleFormat,
};
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = CaptureConfig {
        ring: RingConfig {
            slot_count: 8,
            slot_size: 4096,
            ..Default::default()
        },
        frame_len: 512,
        format: SampleFormat::Float64,
    };

    // A slow ramp so successive frames differ
    let device = MockTransceiver::new(config.ring.slot_size)
        .with_interval(Duration::from_millis(10))
        .with_max_bursts(50)
        .with_fill(|index, burst| {
            for (i, byte) in burst.iter_mut().enumerate() {
                *byte = (index as usize + i) as u8;
            }
        });

    let events = event_callback(|e| eprint!("{}", e.marker()));
    let session = CaptureSession::start(device, config, Some(events))?;

    let (tx, mut rx) = mpsc::channel::<Frame>(16);
    let forwarder = session.spawn_forwarder(tx);

    let mut frames = 0u64;
    while let Some(frame) = rx.recv().await {
        let power: f64 = (0..frame.sample_count())
            .filter_map(|i| frame.iq(i))
            .map(|(i, q)| i * i + q * q)
            .sum::<f64>()
            / frame.sample_count() as f64;
        frames += 1;
        if frames % 16 == 0 {
            println!("frame {frames}: mean power {power:.4}");
        }
    }

    let stats = forwarder.await??;
    println!();
    println!("Stats: {stats:?}");

    Ok(())
}

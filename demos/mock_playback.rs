//! Playback example.
//!
//! Feeds a square wave to a mock transceiver at the host's own pace and
//! reports how many bursts went out as silence.
//!
//! Run with: cargo run --example mock_playback

use std::time::Duration;

use iq_stream::{Backpressure, MockTransceiver, PlaybackConfig, PlaybackSession, RingConfig};
use tokio::sync::mpsc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for debug output
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = PlaybackConfig {
        ring: RingConfig {
            slot_count: 4,
            slot_size: 2048,
            ..Default::default()
        },
        frame_len: 256,
        backpressure: Backpressure::Block,
    };

    let device = MockTransceiver::new(config.ring.slot_size).with_interval(Duration::from_millis(5));
    let session = PlaybackSession::start(device, config, None)?;
    let values = session.frame_values();

    let (tx, rx) = mpsc::channel::<Vec<i8>>(8);
    let feeder = session.spawn_feeder(rx);

    for n in 0..64 {
        let level = if n % 2 == 0 { 100 } else { -100 };
        tx.send(vec![level; values]).await?;
    }
    drop(tx);

    let stats = feeder.await??;
    println!(
        "Sent {} frames in {} slots, {} bursts of silence",
        stats.frames_processed, stats.ring.slots_read, stats.ring.underruns
    );

    Ok(())
}

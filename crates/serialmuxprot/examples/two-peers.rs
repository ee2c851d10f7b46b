//! Two sessions over an in-memory pipe — the single-process rendition of
//! two boards wired RX↔TX.
//!
//! Run with:
//!   cargo run --example two-peers

use serialmux_peer::SerialMuxPeer;
use serialmux_stream::LoopbackPipe;

fn main() {
    let (publisher_stream, monitor_stream) = LoopbackPipe::pair();
    let mut publisher: SerialMuxPeer<_, 10> = SerialMuxPeer::new(publisher_stream);
    let mut monitor: SerialMuxPeer<_, 10> = SerialMuxPeer::new(monitor_stream);

    publisher.on_synced(|| eprintln!("[publisher] synced"));
    monitor.on_synced(|| eprintln!("[monitor] synced"));

    let channel = publisher.create_channel("COUNTER", 4);
    assert_ne!(channel, 0, "COUNTER channel should be created");

    monitor.subscribe_to_channel("COUNTER", |payload| {
        let value = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        eprintln!("[monitor] COUNTER = {value}");
    });

    // Simulated clock: both sessions tick once per millisecond. The
    // publisher pushes a counter update every second while synced.
    let mut counter = 0u32;
    let mut last_sent = 0u32;
    for now in 0..=10_000u32 {
        publisher.process(now);
        monitor.process(now);

        if publisher.is_synced() && now.wrapping_sub(last_sent) >= 1000 {
            counter += 1;
            if publisher.send_data_by_name("COUNTER", &counter.to_be_bytes()) {
                last_sent = now;
            }
        }
    }

    eprintln!("[publisher] sent {counter} updates");
}

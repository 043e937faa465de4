//! A simulated 100 Hz control loop logging through the throttle cache.
//!
//! Run with `cargo run --example control_loop`. Repeated warnings show up
//! at most once per second, while direct errors always come through.

use std::thread;
use std::time::Duration;
use throttled_log::{ParameterMap, SeverityRouter};

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(tracing::Level::INFO)
        .init();

    let router = SeverityRouter::builder()
        .with_max_size(200)
        .with_clear_ratio(0.35)
        .build()
        .unwrap();

    println!("=== Throttled Control Loop ===\n");
    println!("Running 300 ticks at 100 Hz (3 seconds)\n");

    for tick in 0..300u32 {
        let position_error = (tick as f64 * 0.05).sin() * 0.2;

        if position_error.abs() > 0.15 {
            router
                .warn_throttle(1.0, "position error above tolerance")
                .unwrap();
        }
        router
            .info_throttle(0.5, &format!("heartbeat from joint {}", tick % 3))
            .unwrap();
        if tick == 150 {
            router.error("watchdog missed a deadline");
        }

        thread::sleep(Duration::from_millis(10));
    }

    println!("\nShrinking the cache from host parameters");
    let mut params = ParameterMap::new();
    params.insert("max_throttle_logging_size", 2_i64);
    router.apply_parameters(&params).unwrap();

    let snapshot = router.metrics().snapshot();
    println!("\n=== Loop Complete ===");
    println!("Admitted:   {}", snapshot.events_admitted);
    println!("Suppressed: {}", snapshot.events_suppressed);
    println!("Direct:     {}", snapshot.direct_emissions);
    println!("Evicted:    {}", snapshot.identities_evicted);
    println!(
        "Suppression rate: {:.1}%",
        snapshot.suppression_rate() * 100.0
    );
    println!("Cache: {}/{}", router.cache_size(), router.cache_capacity());
}

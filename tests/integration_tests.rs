//! End-to-end behavior of the router over a bounded throttle cache.

use std::sync::Arc;
use std::time::{Duration, Instant};
use throttled_log::infrastructure::mocks::{MockClock, RecordingSink};
use throttled_log::{Emission, LogSink, Severity, SeverityRouter, ThrottleInterval};

fn router(max_size: usize, clear_ratio: f64) -> (SeverityRouter, Arc<MockClock>, RecordingSink) {
    let clock = Arc::new(MockClock::new(Instant::now()));
    let sink = RecordingSink::new();
    let router = SeverityRouter::builder()
        .with_max_size(max_size)
        .with_clear_ratio(clear_ratio)
        .with_clock(clock.clone())
        .with_sink(Arc::new(sink.clone()) as Arc<dyn LogSink>)
        .build()
        .unwrap();
    (router, clock, sink)
}

#[test]
fn test_zero_interval_single_slot_cache() {
    let (router, clock, sink) = router(1, 0.25);

    for _ in 0..200 {
        assert_eq!(router.error_throttle(0.0, "0_test").unwrap(), Emission::Emitted);
        assert_eq!(router.cache_size(), 1);
        clock.advance(Duration::from_millis(1));
    }

    assert_eq!(sink.count(), 200);
    assert_eq!(router.metrics().identities_evicted(), 0);
}

#[test]
fn test_distinct_identities_stay_bounded() {
    let (router, clock, sink) = router(200, 0.35);

    for i in 0..1_000 {
        let message = format!("{}_test", i);
        assert_eq!(
            router.error_throttle(0.01, &message).unwrap(),
            Emission::Emitted
        );
        let size = router.cache_size();
        assert!(size <= 200, "cache grew to {}", size);
        if i > 0 {
            assert!(size > 1);
        }
        clock.advance(Duration::from_millis(1));
    }

    // 200 full, 70 evicted, one inserted
    assert!(router.cache_size() >= 131);
    assert_eq!(sink.count(), 1_000);
    assert!(router.metrics().identities_evicted() > 0);
}

fn run_multi_severity_ticks(max_size: usize, clear_ratio: f64) {
    let (router, clock, sink) = router(max_size, clear_ratio);

    assert!(router.error_throttle(0.01, "0_test").unwrap().is_emitted());

    for tick in 1..=500 {
        router.error("direct");
        let message = format!("{}_test", tick);
        router.error_throttle(0.0, &message).unwrap();
        router.warn_throttle(0.0, &message).unwrap();
        router.info_throttle(0.0, &message).unwrap();
        router.hint_throttle(0.0, &message).unwrap();

        let size = router.cache_size();
        assert!(size > 1, "tick {}: cache size {}", tick, size);
        assert!(size <= max_size, "tick {}: cache size {}", tick, size);
        clock.advance(Duration::from_millis(1));
    }

    // Zero intervals always admit, and direct calls are never throttled
    assert_eq!(sink.count(), 1 + 500 * 5);
    assert_eq!(sink.count_of(Severity::Hint), 500);
    assert_eq!(router.metrics().direct_emissions(), 500);
    assert_eq!(router.metrics().events_suppressed(), 0);
}

#[test]
fn test_multi_severity_ticks_large_ratio() {
    run_multi_severity_ticks(100, 0.7);
}

#[test]
fn test_multi_severity_ticks_small_ratio() {
    run_multi_severity_ticks(120, 0.22);
}

#[test]
fn test_repeats_suppressed_until_interval_elapses() {
    let (router, clock, sink) = router(100, 0.25);

    assert!(router.warn_throttle(1.0, "gripper stalled").unwrap().is_emitted());
    clock.advance(Duration::from_millis(999));
    assert!(router.warn_throttle(1.0, "gripper stalled").unwrap().is_suppressed());
    clock.advance(Duration::from_millis(1));
    assert!(router.warn_throttle(1.0, "gripper stalled").unwrap().is_emitted());

    assert_eq!(sink.messages(), vec!["gripper stalled", "gripper stalled"]);
    let snapshot = router.metrics().snapshot();
    assert_eq!(snapshot.events_admitted, 2);
    assert_eq!(snapshot.events_suppressed, 1);
}

#[test]
fn test_suppression_measured_from_last_emission() {
    let (router, clock, _sink) = router(100, 0.25);

    router.info_throttle(1.0, "odometry lag").unwrap();
    // Suppressed calls must not push the window forward
    for _ in 0..9 {
        clock.advance(Duration::from_millis(100));
        router.info_throttle(1.0, "odometry lag").unwrap();
    }
    clock.advance(Duration::from_millis(100));
    assert!(router.info_throttle(1.0, "odometry lag").unwrap().is_emitted());
}

#[test]
fn test_severities_share_message_identity() {
    let (router, _clock, sink) = router(100, 0.25);

    assert!(router.error_throttle(5.0, "encoder fault").unwrap().is_emitted());
    assert!(router.warn_throttle(5.0, "encoder fault").unwrap().is_suppressed());
    assert!(router.info_throttle(5.0, "other fault").unwrap().is_emitted());

    assert_eq!(sink.count(), 2);
    assert_eq!(router.cache_size(), 2);
}

#[test]
fn test_evicted_identity_is_emitted_again() {
    let (router, clock, _sink) = router(2, 0.5);

    router.error_throttle(60.0, "a").unwrap();
    clock.advance(Duration::from_millis(1));
    router.error_throttle(60.0, "b").unwrap();
    clock.advance(Duration::from_millis(1));
    // Cache is full; "a" is the oldest and goes
    router.error_throttle(60.0, "c").unwrap();

    assert_eq!(router.cache_size(), 2);
    assert!(router.error_throttle(60.0, "b").unwrap().is_suppressed());
    assert!(router.error_throttle(60.0, "a").unwrap().is_emitted());
}

#[test]
fn test_throttled_records_carry_call_site() {
    let (router, _clock, sink) = router(100, 0.25);

    router.emit_throttled(Severity::Warn, ThrottleInterval::ZERO, "with site");
    router.warn("without site");

    let records = sink.records();
    let site = records[0].call_site.expect("throttled call site");
    assert!(site.file.ends_with("integration_tests.rs"));
    assert!(records[0].throttled);
    assert!(records[1].call_site.is_none());
    assert!(!records[1].throttled);
}

#[test]
fn test_invalid_interval_is_rejected() {
    let (router, _clock, sink) = router(100, 0.25);

    assert!(router.error_throttle(-1.0, "negative").is_err());
    assert!(router.error_throttle(f64::NAN, "nan").is_err());
    assert_eq!(sink.count(), 0);
    assert_eq!(router.cache_size(), 0);
}

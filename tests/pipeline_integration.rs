//! End-to-end pipeline test: simulated sources through workers, the
//! coordinator and the analysis chain into an in-memory store.

use oscimon::config::AppConfig;
use oscimon::pipeline::{Coordinator, RunOutcome};
use oscimon::source::{self, MockPhasorSource, PhasorSource, SignalPattern};
use oscimon::store::MemoryStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Small windows and fast cadences so a full cycle fits in seconds
fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.sources.truncate(2);
    config.ingest.min_sources = 2;
    config.ingest.tick_interval_ms = 2;
    config.analysis.window_lengths = vec![160, 250];
    config.analysis.model_orders = vec![6, 8, 10];
    config.analysis.cadence_s = 0.05;
    config.emission.min_interval_s = 0.2;
    config.emission.flush_interval_s = 0.05;
    // Generous watchdog bounds: escalation is not under test here.
    config.supervision.restart_after_degraded_s = 300.0;
    config.supervision.low_rate_duration_s = 300.0;
    config.validate().expect("test config");
    config
}

fn oscillating_source(name: &str, sample_rate: f64, phase: f64) -> Box<dyn PhasorSource> {
    Box::new(
        MockPhasorSource::new(name, sample_rate)
            .with_pattern(SignalPattern::DecayingSine {
                frequency: 0.6,
                damping_pct: 5.0,
                amplitude: 0.05,
                period_s: 10.0,
            })
            .with_phase(phase)
            .with_noise(0.0005)
            // ~100x real time: long windows fill in fractions of a second.
            .with_time_compression(100.0),
    )
}

#[test]
fn test_full_pipeline_produces_mode_records() {
    let config = test_config();
    let stop = Arc::new(AtomicBool::new(false));
    let (event_tx, event_rx) = crossbeam_channel::bounded(config.ingest.queue_capacity);
    let store = MemoryStore::new();

    let sample_rate = config.ingest.sampling_rate_hz;
    let workers = source::spawn_workers(
        &config,
        |s| oscillating_source(&s.name, sample_rate, s.idcode as f64 * 0.5),
        event_tx,
        stop.clone(),
    );

    let coordinator_stop = stop.clone();
    let coordinator_config = config.clone();
    let coordinator_store = store.clone();
    let handle = std::thread::spawn(move || {
        let mut coordinator = Coordinator::new(
            coordinator_config,
            event_rx,
            Box::new(coordinator_store),
            coordinator_stop,
        );
        let outcome = coordinator.run();
        (outcome, coordinator.stats())
    });

    // Let the pipeline run until records appear or a deadline passes.
    let deadline = Instant::now() + Duration::from_secs(30);
    while store.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }

    stop.store(true, Ordering::SeqCst);
    let (outcome, stats) = handle.join().expect("coordinator thread");
    source::join_workers(workers, &config.supervision);

    assert_eq!(outcome, RunOutcome::Stopped);
    assert!(
        stats.frames_aligned >= 250,
        "window never filled: {} frames",
        stats.frames_aligned
    );

    let records = store.records();
    assert!(
        !records.is_empty(),
        "no mode records were emitted within the deadline"
    );

    // The 0.6 Hz mode lands in the low band with plausible damping.
    let with_low = records
        .iter()
        .find(|r| r.field("low_f").is_some())
        .expect("a record with a low-band mode");
    let low_f = with_low.field("low_f").expect("low_f");
    let low_d = with_low.field("low_d").expect("low_d");
    let low_d_smooth = with_low.field("low_d_smooth").expect("low_d_smooth");
    assert!(
        (low_f - 0.6).abs() < 0.1,
        "low-band frequency {} not near 0.6 Hz",
        low_f
    );
    assert!(
        (0.1..=20.0).contains(&low_d),
        "damping {} outside plausible bounds",
        low_d
    );
    assert!((0.1..=20.0).contains(&low_d_smooth));

    // Both sources contributed.
    let sources_tag = with_low
        .tags
        .iter()
        .find(|(k, _)| k == "sources")
        .map(|(_, v)| v.clone())
        .expect("sources tag");
    assert!(sources_tag.contains("PMU 1") && sources_tag.contains("PMU 3"));
}

#[test]
fn test_watchdog_escalates_on_sustained_source_loss() {
    let mut config = test_config();
    // Compressed supervision timeline: losing one source for half a second
    // forces the restart path. The lost source never reconnects in time.
    config.supervision.stale_timeout_s = 0.2;
    config.supervision.restart_after_degraded_s = 0.5;
    config.supervision.initial_reconnect_delay_s = 30.0;
    config.supervision.low_rate_duration_s = 300.0;
    config.supervision.startup_grace_s = 300.0;

    let stop = Arc::new(AtomicBool::new(false));
    let (event_tx, event_rx) = crossbeam_channel::bounded(config.ingest.queue_capacity);

    let sample_rate = config.ingest.sampling_rate_hz;
    let workers = source::spawn_workers(
        &config,
        |s| {
            let source = MockPhasorSource::new(&s.name, sample_rate)
                .with_time_compression(2.0)
                .with_phase(s.idcode as f64 * 0.5);
            if s.name == "PMU 3" {
                // This source dies shortly after startup and stays down.
                Box::new(source.with_disconnect_after(10))
            } else {
                Box::new(source)
            }
        },
        event_tx,
        stop.clone(),
    );

    let coordinator_stop = stop.clone();
    let coordinator_config = config.clone();
    let handle = std::thread::spawn(move || {
        let mut coordinator = Coordinator::new(
            coordinator_config,
            event_rx,
            Box::new(MemoryStore::new()),
            coordinator_stop,
        );
        coordinator.run()
    });

    // The coordinator must exit on its own with a restart request.
    let deadline = Instant::now() + Duration::from_secs(30);
    while !handle.is_finished() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(handle.is_finished(), "watchdog never escalated");

    let outcome = handle.join().expect("coordinator thread");
    stop.store(true, Ordering::SeqCst);
    source::join_workers(workers, &config.supervision);

    match outcome {
        RunOutcome::RestartRequired(_) => {}
        other => panic!("expected a restart request, got {:?}", other),
    }
}

#[test]
fn test_emission_rate_limit_holds_end_to_end() {
    let mut config = test_config();
    // One emission per 100 s of data time: at most one record can appear
    // during this test, regardless of how many cycles accept.
    config.emission.min_interval_s = 100.0;

    let stop = Arc::new(AtomicBool::new(false));
    let (event_tx, event_rx) = crossbeam_channel::bounded(config.ingest.queue_capacity);
    let store = MemoryStore::new();

    let sample_rate = config.ingest.sampling_rate_hz;
    let workers = source::spawn_workers(
        &config,
        |s| oscillating_source(&s.name, sample_rate, s.idcode as f64 * 0.5),
        event_tx,
        stop.clone(),
    );

    let coordinator_stop = stop.clone();
    let coordinator_config = config.clone();
    let coordinator_store = store.clone();
    let handle = std::thread::spawn(move || {
        let mut coordinator = Coordinator::new(
            coordinator_config,
            event_rx,
            Box::new(coordinator_store),
            coordinator_stop,
        );
        coordinator.run()
    });

    let deadline = Instant::now() + Duration::from_secs(20);
    while store.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    // Give further cycles a chance to (incorrectly) emit again.
    std::thread::sleep(Duration::from_millis(500));

    stop.store(true, Ordering::SeqCst);
    let outcome = handle.join().expect("coordinator thread");
    source::join_workers(workers, &config.supervision);

    assert_eq!(outcome, RunOutcome::Stopped);
    assert!(
        store.len() <= 1,
        "rate limit violated: {} records emitted",
        store.len()
    );
}

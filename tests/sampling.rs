//! End-to-end sampling scenarios. Every test probes perf availability first
//! and bails out quietly where the environment denies `perf_event_open`.

use std::hint::black_box;
use std::sync::Arc;
use std::time::{Duration, Instant};

use perfmon::config::{SampleConfig, SampleOn, SampleSkid};
use perfmon::event::CounterDefinition;
use perfmon::sample::{Record, Sampler, Trigger};

fn definitions() -> Arc<CounterDefinition> {
    Arc::new(CounterDefinition::new())
}

fn test_config() -> SampleConfig {
    let mut config = SampleConfig::default();
    config.base.include_kernel = false;
    config.base.include_hypervisor = false;
    config.buffer_pages = 16 + 1;
    config.sample_on = SampleOn::Count(10_000);
    config
}

fn perf_available() -> bool {
    let mut probe = Sampler::new(definitions(), test_config());
    probe.values_mut().ip = true;
    probe.trigger([["cycles"]]).unwrap();
    match probe.start() {
        Ok(()) => {
            let _ = probe.stop();
            true
        }
        Err(err) => {
            eprintln!("skipping: sampling not usable here ({err})");
            false
        }
    }
}

fn busy_loop(duration: Duration) {
    let start = Instant::now();
    let mut acc = 0u64;
    while start.elapsed() < duration {
        for i in 0..1_000u64 {
            acc = black_box(acc.wrapping_add(i));
        }
    }
    black_box(acc);
}

#[test]
fn cycle_triggers_produce_timestamped_samples() {
    if !perf_available() {
        return;
    }

    let mut sampler = Sampler::new(definitions(), test_config());
    sampler.values_mut().ip = true;
    sampler.values_mut().time = true;
    sampler.trigger([["cycles"]]).unwrap();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(300));
    sampler.stop().unwrap();

    let samples = sampler.result(true);
    let events: Vec<_> = samples
        .iter()
        .filter_map(|sample| match &sample.kind {
            Record::Event(event) => Some(event),
            _ => None,
        })
        .collect();
    assert!(!events.is_empty(), "a 300ms busy loop must produce samples");

    let mut last_time = 0;
    for event in &events {
        let ip = event.ip.expect("IP was requested for every sample");
        assert_ne!(ip, 0);
        let time = event.time.expect("TIME was requested for every sample");
        assert!(time >= last_time, "timestamps must be non-decreasing");
        last_time = time;
    }
}

#[test]
fn a_tiny_buffer_reports_losses() {
    if !perf_available() {
        return;
    }

    let mut config = test_config();
    // One data page and a hot period: the ring overflows immediately.
    config.buffer_pages = 1 + 1;
    config.sample_on = SampleOn::Count(10);

    let mut sampler = Sampler::new(definitions(), config);
    sampler.values_mut().ip = true;
    sampler.values_mut().time = true;
    sampler.trigger([["cycles"]]).unwrap();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(100));
    // Drain mid-run: freeing space lets the kernel flush the accumulated
    // loss count as a LOST record into the ring.
    let _ = sampler.result(false);
    busy_loop(Duration::from_millis(200));
    sampler.stop().unwrap();

    let samples = sampler.result(false);
    let lost: u64 = samples
        .iter()
        .filter_map(|sample| match &sample.kind {
            Record::Loss(loss) => Some(loss.lost),
            _ => None,
        })
        .sum();
    assert!(lost > 0, "an overflowed one-page ring must report losses");
}

#[test]
fn draining_twice_without_workload_is_empty() {
    if !perf_available() {
        return;
    }

    let mut sampler = Sampler::new(definitions(), test_config());
    sampler.values_mut().ip = true;
    sampler.values_mut().time = true;
    sampler.trigger([["cycles"]]).unwrap();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(100));
    sampler.stop().unwrap();

    let first = sampler.result(true);
    assert!(!first.is_empty());
    let second = sampler.result(true);
    assert!(
        second.is_empty(),
        "the second drain without workload must be empty, got {}",
        second.len()
    );
}

#[test]
fn sampler_can_be_closed_and_reopened() {
    if !perf_available() {
        return;
    }

    let mut sampler = Sampler::new(definitions(), test_config());
    sampler.values_mut().ip = true;
    sampler.trigger([["cycles"]]).unwrap();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(50));
    sampler.stop().unwrap();
    sampler.close();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(50));
    sampler.stop().unwrap();
    assert!(!sampler.result(false).is_empty());
}

#[test]
fn maximum_skid_requests_degrade_instead_of_failing() {
    if !perf_available() {
        return;
    }

    // Whatever the PMU supports, requesting zero skid must not fail the
    // open: the precision is stepped down until the kernel accepts it.
    let mut sampler = Sampler::new(definitions(), test_config());
    sampler.values_mut().ip = true;
    sampler
        .trigger_with(vec![vec![
            Trigger::new("cycles").with_skid(SampleSkid::Zero),
        ]])
        .unwrap();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(50));
    sampler.stop().unwrap();
}

#[test]
fn companion_counters_ride_along_in_samples() {
    if !perf_available() {
        return;
    }

    let mut sampler = Sampler::new(definitions(), test_config());
    sampler.values_mut().ip = true;
    sampler.values_mut().read = true;
    sampler.values_mut().counters.push("instructions".into());
    sampler.trigger([["cycles"]]).unwrap();

    sampler.start().unwrap();
    busy_loop(Duration::from_millis(200));
    sampler.stop().unwrap();

    let samples = sampler.result(false);
    let with_counters = samples.iter().any(|sample| match &sample.kind {
        Record::Event(event) => event
            .counter_values
            .as_ref()
            .is_some_and(|counters| {
                counters.get("cycles").is_some() && counters.get("instructions").is_some()
            }),
        _ => false,
    });
    assert!(
        with_counters,
        "samples must carry the trigger and companion counter values"
    );
}

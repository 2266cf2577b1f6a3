//! End-to-end dispatch behavior across threads and runtimes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use courier_config::Config;
use courier_events::prelude::*;
use courier_events::{AsyncBackend, BusConfig};
use courier_test::{CallLog, OverlapGauge, Counter, Rendezvous, init_test_tracing};

fn threaded_bus() -> EventBus {
    EventBus::from_config(&BusConfig::new("test").with_async_backend(AsyncBackend::Thread))
}

#[test]
fn test_transactional_invocations_never_overlap() {
    init_test_tracing();
    let bus = threaded_bus();
    let gauge = OverlapGauge::new();
    // Read-sleep-write: lost updates show up if two invocations interleave.
    let total = Arc::new(Mutex::new(0_u32));

    let handler_gauge = gauge.clone();
    let handler_total = Arc::clone(&total);
    bus.subscribe_async(
        "ledger",
        move |amount: u32| {
            let _section = handler_gauge.enter();
            let current = *handler_total.lock().unwrap();
            thread::sleep(Duration::from_millis(2));
            *handler_total.lock().unwrap() = current.saturating_add(amount);
        },
        true,
    )
    .unwrap();

    let publishers: Vec<_> = (0..4)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    bus.publish("ledger", (1_u32,));
                }
            })
        })
        .collect();
    for publisher in publishers {
        publisher.join().unwrap();
    }
    bus.wait_async();

    assert_eq!(gauge.entries(), 20);
    assert_eq!(gauge.max(), 1);
    assert_eq!(*total.lock().unwrap(), 20);
}

#[test]
fn test_non_transactional_invocations_may_overlap() {
    let bus = threaded_bus();
    let gauge = OverlapGauge::new();
    // Both invocations must be inside the handler at once to meet; serialized
    // invocations time out instead.
    let rendezvous = Rendezvous::new(2);
    let met = CallLog::new();

    let handler_gauge = gauge.clone();
    let handler_met = met.clone();
    bus.subscribe_async(
        "fanout",
        move || {
            let _section = handler_gauge.enter();
            handler_met.record(rendezvous.arrive(Duration::from_secs(5)));
        },
        false,
    )
    .unwrap();

    bus.publish("fanout", ());
    bus.publish("fanout", ());
    bus.wait_async();

    assert_eq!(met.calls(), vec![true, true]);
    assert_eq!(gauge.entries(), 2);
    assert!(gauge.overlapped());
}

#[test]
fn test_wait_async_observes_every_dispatch() {
    const N: usize = 25;
    const DELAYS_MS: [u64; 5] = [0, 3, 6, 9, 12];

    let bus = threaded_bus();
    let done = Counter::new();

    let handler_done = done.clone();
    bus.subscribe_async(
        "slow",
        move |delay_ms: u64| {
            thread::sleep(Duration::from_millis(delay_ms));
            handler_done.incr();
        },
        false,
    )
    .unwrap();

    for delay in DELAYS_MS.iter().cycle().take(N) {
        bus.publish("slow", (*delay,));
    }
    bus.wait_async();

    assert_eq!(done.get(), N);
    assert_eq!(bus.pending_async(), 0);
}

#[test]
fn test_wait_async_spans_topics() {
    let bus = threaded_bus();
    let log = CallLog::new();

    for topic in ["a", "b", "c"] {
        let log = log.clone();
        bus.subscribe_async(
            topic,
            move || {
                thread::sleep(Duration::from_millis(5));
                log.record(topic);
            },
            false,
        )
        .unwrap();
    }

    bus.publish("a", ());
    bus.publish("b", ());
    bus.publish("c", ());
    bus.wait_async();

    let mut seen = log.calls();
    seen.sort_unstable();
    assert_eq!(seen, vec!["a", "b", "c"]);
}

#[test]
fn test_wait_async_without_work_returns() {
    let bus = EventBus::new();
    bus.wait_async();
    bus.subscribe("sync-only", || {}).unwrap();
    bus.publish("sync-only", ());
    bus.wait_async();
}

#[test]
fn test_once_fires_once_under_concurrent_publishers() {
    let bus = EventBus::new();
    let fired = Counter::new();
    let handler_fired = fired.clone();
    bus.subscribe_once("boot", move || handler_fired.incr()).unwrap();

    let start = Arc::new(Barrier::new(8));
    let publishers: Vec<_> = (0..8)
        .map(|_| {
            let bus = bus.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                bus.publish("boot", ());
            })
        })
        .collect();
    for publisher in publishers {
        publisher.join().unwrap();
    }

    assert_eq!(fired.get(), 1);
    assert!(!bus.has_callback("boot"));
}

#[test]
fn test_concurrent_subscribe_publish_unsubscribe() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 100;

    init_test_tracing();
    let bus = threaded_bus();
    let persistent = Counter::new();
    let persistent_handler = persistent.clone();
    bus.subscribe("stress", move || persistent_handler.incr()).unwrap();

    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let bus = bus.clone();
            thread::spawn(move || {
                for _ in 0..ROUNDS {
                    let id = bus.subscribe("stress", || {}).unwrap();
                    let async_id = bus.subscribe_async("stress", || {}, false).unwrap();
                    bus.publish("stress", ());
                    bus.unsubscribe("stress", id).unwrap();
                    bus.unsubscribe("stress", async_id).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    bus.wait_async();

    assert_eq!(persistent.get(), THREADS * ROUNDS);
    assert_eq!(bus.handler_count("stress"), 1);
    assert_eq!(bus.subscriber_count(), 1);
}

#[test]
fn test_async_panic_reported_and_tracked() {
    let bus = threaded_bus();
    let failures = CallLog::new();
    let hook_failures = failures.clone();
    bus.on_failure(move |failure| hook_failures.record(failure.clone()));

    fn explode(_code: i32) {
        panic!("async handler exploded");
    }
    let id = bus.subscribe_async("risky", explode, false).unwrap();

    bus.publish("risky", (7_i32,));
    bus.wait_async();

    let failures = failures.calls();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subscription, id);
    assert_eq!(failures[0].mode, DispatchMode::Async);
    assert_eq!(
        failures[0].kind,
        FailureKind::Panicked("async handler exploded".to_owned())
    );

    let stats = bus.stats();
    assert_eq!(stats.panics, 1);
    assert_eq!(stats.async_completed, 1);
    assert_eq!(bus.pending_async(), 0);
}

#[test]
fn test_async_mismatch_rejected_before_scheduling() {
    let bus = threaded_bus();
    let ran = Counter::new();
    let handler_ran = ran.clone();
    bus.subscribe_async("typed", move |_name: String| handler_ran.incr(), false)
        .unwrap();

    bus.publish("typed", (1_u8,));
    bus.publish("typed", ());

    assert_eq!(bus.pending_async(), 0);
    let stats = bus.stats();
    assert_eq!(stats.argument_mismatches, 2);
    assert_eq!(stats.async_scheduled, 0);
    assert_eq!(ran.get(), 0);
}

#[test]
fn test_heterogeneous_signatures_on_one_topic() {
    let bus = EventBus::new();
    let log = CallLog::new();

    let full = log.clone();
    bus.subscribe("order", move |id: u64, sku: String| full.record(format!("{id}:{sku}")))
        .unwrap();
    let id_only = log.clone();
    bus.subscribe("order", move |id: u64| id_only.record(format!("{id}")))
        .unwrap();

    bus.publish("order", (9_u64, "A-1".to_owned()));

    // The second handler rejects the two-argument publish; the first runs.
    assert_eq!(log.calls(), vec!["9:A-1".to_owned()]);
    assert_eq!(bus.stats().argument_mismatches, 1);
}

#[test]
fn test_bus_from_loaded_config() {
    let config = Config::from_toml_str(
        "[bus]\nname = \"orders\"\nasync_backend = \"thread\"\nlog_failures = false\n",
    )
    .unwrap();

    let bus = EventBus::from_config(&config.bus);

    assert_eq!(bus.name(), "orders");
    assert_eq!(bus.async_backend(), AsyncBackend::Thread);
}

#[test]
fn test_stats_serialize() {
    let bus = EventBus::new();
    bus.subscribe("t", || {}).unwrap();
    bus.publish("t", ());

    let json = serde_json::to_value(bus.stats()).unwrap();
    assert_eq!(json["published"], 1);
    assert_eq!(json["sync_invocations"], 1);
}

#[test]
fn test_dispatch_after_runtime_shutdown_is_reported() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let bus = runtime.block_on(async { EventBus::new() });
    assert_eq!(bus.async_backend(), AsyncBackend::Tokio);
    drop(runtime);

    let failures = CallLog::new();
    let hook_failures = failures.clone();
    bus.on_failure(move |failure| hook_failures.record(failure.clone()));

    let ran = Counter::new();
    let handler_ran = ran.clone();
    let id = bus
        .subscribe_async("orphaned", move || handler_ran.incr(), false)
        .unwrap();

    bus.publish("orphaned", ());
    bus.wait_async();

    assert_eq!(ran.get(), 0);
    let failures = failures.calls();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].subscription, id);
    assert!(matches!(failures[0].kind, FailureKind::SpawnFailed(_)));

    let stats = bus.stats();
    assert_eq!(stats.async_scheduled, 1);
    assert_eq!(stats.async_completed, 0);
    assert_eq!(stats.spawn_failures, 1);
    assert_eq!(bus.pending_async(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_backend_drain() {
    let bus = EventBus::new();
    assert_eq!(bus.async_backend(), AsyncBackend::Tokio);

    let done = Arc::new(AtomicUsize::new(0));
    let handler_done = Arc::clone(&done);
    bus.subscribe_async(
        "jobs",
        move |n: usize| {
            thread::sleep(Duration::from_millis(2));
            handler_done.fetch_add(n, Ordering::SeqCst);
        },
        true,
    )
    .unwrap();

    for n in 1..=10_usize {
        bus.publish("jobs", (n,));
    }
    bus.drain().await;

    assert_eq!(done.load(Ordering::SeqCst), 55);
    assert_eq!(bus.pending_async(), 0);
}

#[tokio::test]
async fn test_drain_without_work_returns() {
    let bus = EventBus::new();
    bus.drain().await;
    assert_eq!(bus.pending_async(), 0);
}

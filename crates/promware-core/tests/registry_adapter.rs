//! Idempotent get-or-create behaviour of the registry adapter.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::thread;

use promware_core::{Collector, Registry};

#[test]
fn same_name_same_labels_share_one_series() {
    let r = Registry::new();
    let a = r.get_or_create_counter("api_requests_total", "Requests", &["method"]);
    let b = r.get_or_create_counter("api_requests_total", "Requests", &["method"]);

    a.inc(&[("method", "GET")]).unwrap();
    b.inc(&[("method", "GET")]).unwrap();

    assert_eq!(a.get(&[("method", "GET")]).unwrap(), 2.0);
    assert_eq!(b.get(&[("method", "GET")]).unwrap(), 2.0);
    assert_eq!(r.names(), vec!["api_requests_total"]);
}

#[test]
fn histogram_and_gauge_are_idempotent_too() {
    let r = Registry::new();
    let h1 = r.get_or_create_histogram("dur_seconds", "d", &["endpoint"], &[0.1, 1.0]);
    let h2 = r.get_or_create_histogram("dur_seconds", "d", &["endpoint"], &[0.1, 1.0]);
    h1.observe(&[("endpoint", "/")], 0.05).unwrap();
    h2.observe(&[("endpoint", "/")], 0.5).unwrap();
    assert_eq!(h1.get(&[("endpoint", "/")]).unwrap().unwrap().count, 2);

    let g1 = r.get_or_create_gauge("active", "a", &[]);
    let g2 = r.get_or_create_gauge("active", "a", &[]);
    g1.inc(&[]).unwrap();
    g2.inc(&[]).unwrap();
    assert_eq!(g1.get(&[]).unwrap(), 2.0);
}

#[test]
fn adapter_resolves_strictly_registered_collector() {
    let r = Registry::new();
    let strict = r.register_counter("errors_total", "e", &["error_type"]).unwrap();
    let adapted = r.get_or_create_counter("errors_total", "e", &["error_type"]);
    adapted.inc(&[("error_type", "Timeout")]).unwrap();
    assert_eq!(strict.get(&[("error_type", "Timeout")]).unwrap(), 1.0);

    match r.get("errors_total") {
        Some(Collector::Counter(c)) => assert_eq!(c.desc().label_names, vec!["error_type"]),
        other => panic!("unexpected collector: {other:?}"),
    }
}

#[test]
fn concurrent_get_or_create_converges() {
    let r = Arc::new(Registry::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let r = Arc::clone(&r);
            thread::spawn(move || {
                let c = r.get_or_create_counter("race_total", "r", &["k"]);
                for _ in 0..100 {
                    c.inc(&[("k", "v")]).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let c = r.get_or_create_counter("race_total", "r", &["k"]);
    assert_eq!(c.get(&[("k", "v")]).unwrap(), 800.0);
    assert_eq!(r.names(), vec!["race_total"]);
}

#[test]
fn label_mismatch_is_an_error_not_a_panic() {
    let r = Registry::new();
    let c = r.get_or_create_counter("m_total", "m", &["method", "endpoint"]);
    let err = c.inc(&[("method", "GET")]).unwrap_err();
    assert_eq!(err.code().as_str(), "LABEL_MISMATCH");
    assert!(err.to_string().contains("expected [method,endpoint]"));
}

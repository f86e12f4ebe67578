//! Metric registry: name -> collector, shared by every request task.
//!
//! Two access styles:
//! - strict `register_*` calls that fail with `AlreadyRegistered`,
//! - best-effort `get_or_create_*` calls that never fail. They return the
//!   existing collector when the definition is compatible, fall back to a
//!   `<name>_new` registration otherwise, and as a last resort hand out a
//!   detached collector so the caller keeps working.

mod family;

use std::sync::{Arc, OnceLock};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::{PromwareError, Result};

pub use family::{Counter, Gauge, Histogram, HistogramSnapshot, MetricDesc, MetricKind};

/// A registered metric family.
#[derive(Debug, Clone)]
pub enum Collector {
    Counter(Counter),
    Gauge(Gauge),
    Histogram(Histogram),
}

impl Collector {
    pub fn desc(&self) -> &MetricDesc {
        match self {
            Collector::Counter(c) => c.desc(),
            Collector::Gauge(g) => g.desc(),
            Collector::Histogram(h) => h.desc(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    collectors: DashMap<String, Collector>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            collectors: DashMap::new(),
        }
    }

    /// Process-wide registry, created on first access and never torn down.
    ///
    /// Prefer threading an explicit `Arc<Registry>` through application state;
    /// this exists for call sites that cannot receive one.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    pub fn register_counter(&self, name: &str, help: &str, labels: &[&str]) -> Result<Counter> {
        let desc = MetricDesc::new(name, help, labels, MetricKind::Counter)?;
        let counter = Counter::new(desc);
        self.insert(name, Collector::Counter(counter.clone()))?;
        Ok(counter)
    }

    pub fn register_gauge(&self, name: &str, help: &str, labels: &[&str]) -> Result<Gauge> {
        let desc = MetricDesc::new(name, help, labels, MetricKind::Gauge)?;
        let gauge = Gauge::new(desc);
        self.insert(name, Collector::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    /// Register a histogram. A trailing `+Inf` bound is accepted and dropped;
    /// the renderer always emits it.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: &[f64],
    ) -> Result<Histogram> {
        let desc = MetricDesc::new(name, help, labels, MetricKind::Histogram)?;
        let bounds = validate_buckets(name, buckets)?;
        let histogram = Histogram::new(desc, bounds);
        self.insert(name, Collector::Histogram(histogram.clone()))?;
        Ok(histogram)
    }

    fn insert(&self, name: &str, collector: Collector) -> Result<()> {
        match self.collectors.entry(name.to_string()) {
            Entry::Occupied(_) => Err(PromwareError::AlreadyRegistered(name.to_string())),
            Entry::Vacant(v) => {
                v.insert(collector);
                Ok(())
            }
        }
    }

    /// Look up a collector by name.
    pub fn get(&self, name: &str) -> Option<Collector> {
        self.collectors.get(name).map(|r| r.value().clone())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.collectors.remove(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collectors.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// All collectors sorted by name (stable exposition order).
    pub fn collectors(&self) -> Vec<Collector> {
        let mut all: Vec<Collector> = self.collectors.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.desc().name.cmp(&b.desc().name));
        all
    }

    /// Render every collector in the Prometheus text format.
    pub fn render(&self) -> String {
        crate::exposition::encode(self)
    }

    pub fn get_or_create_counter(&self, name: &str, help: &str, labels: &[&str]) -> Counter {
        self.get_or_create(
            name,
            |n| self.register_counter(n, help, labels),
            |c| match c {
                Collector::Counter(c) if c.desc().same_labels(labels) => Some(c.clone()),
                _ => None,
            },
            || Counter::new(detached_desc(name, help, labels, MetricKind::Counter)),
        )
    }

    pub fn get_or_create_gauge(&self, name: &str, help: &str, labels: &[&str]) -> Gauge {
        self.get_or_create(
            name,
            |n| self.register_gauge(n, help, labels),
            |c| match c {
                Collector::Gauge(g) if g.desc().same_labels(labels) => Some(g.clone()),
                _ => None,
            },
            || Gauge::new(detached_desc(name, help, labels, MetricKind::Gauge)),
        )
    }

    pub fn get_or_create_histogram(
        &self,
        name: &str,
        help: &str,
        labels: &[&str],
        buckets: &[f64],
    ) -> Histogram {
        self.get_or_create(
            name,
            |n| self.register_histogram(n, help, labels, buckets),
            |c| match c {
                Collector::Histogram(h) if h.desc().same_labels(labels) => Some(h.clone()),
                _ => None,
            },
            || {
                let bounds = validate_buckets(name, buckets).unwrap_or_default();
                Histogram::new(detached_desc(name, help, labels, MetricKind::Histogram), bounds)
            },
        )
    }

    fn get_or_create<T>(
        &self,
        name: &str,
        register: impl Fn(&str) -> Result<T>,
        existing: impl Fn(&Collector) -> Option<T>,
        detached: impl FnOnce() -> T,
    ) -> T {
        let fallback = format!("{name}_new");
        for candidate in [name, fallback.as_str()] {
            match register(candidate) {
                Ok(m) => return m,
                Err(PromwareError::AlreadyRegistered(_)) => {
                    if let Some(m) = self.collectors.get(candidate).and_then(|c| existing(c.value())) {
                        return m;
                    }
                    tracing::warn!(metric = %candidate, "metric registered with an incompatible definition");
                }
                Err(e) => {
                    tracing::warn!(metric = %candidate, error = %e, "metric registration failed");
                }
            }
        }
        tracing::warn!(metric = %name, "using a detached metric; its values will not be exported");
        detached()
    }
}

fn validate_buckets(name: &str, buckets: &[f64]) -> Result<Vec<f64>> {
    let mut bounds: Vec<f64> = buckets.to_vec();
    if bounds.last().is_some_and(|b| *b == f64::INFINITY) {
        bounds.pop();
    }
    let ascending = bounds.windows(2).all(|w| w[0] < w[1]);
    if bounds.is_empty() || !ascending || bounds.iter().any(|b| !b.is_finite()) {
        return Err(PromwareError::InvalidBuckets(name.to_string()));
    }
    Ok(bounds)
}

/// Definition for a collector that is never registered. Names that fail
/// validation are replaced so construction itself cannot fail.
fn detached_desc(name: &str, help: &str, labels: &[&str], kind: MetricKind) -> MetricDesc {
    MetricDesc::new(name, help, labels, kind).unwrap_or_else(|_| MetricDesc {
        name: "detached".to_string(),
        help: help.to_string(),
        label_names: labels.iter().map(|l| l.to_string()).collect(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn strict_register_rejects_duplicates() {
        let r = Registry::new();
        r.register_counter("dup_total", "d", &[]).unwrap();
        let err = r.register_counter("dup_total", "d", &[]).unwrap_err();
        assert_eq!(err.code().as_str(), "ALREADY_REGISTERED");
        let err = r.register_gauge("dup_total", "d", &[]).unwrap_err();
        assert_eq!(err.code().as_str(), "ALREADY_REGISTERED");
    }

    #[test]
    fn buckets_must_ascend() {
        let r = Registry::new();
        assert!(r.register_histogram("h1", "", &[], &[1.0, 1.0]).is_err());
        assert!(r.register_histogram("h2", "", &[], &[]).is_err());
        assert!(r.register_histogram("h3", "", &[], &[f64::NAN]).is_err());
        let h = r
            .register_histogram("h4", "", &[], &[0.5, 1.0, f64::INFINITY])
            .unwrap();
        assert_eq!(h.bounds(), &[0.5, 1.0]);
    }

    #[test]
    fn incompatible_redefinition_falls_back_to_new_suffix() {
        let r = Registry::new();
        r.register_counter("req_total", "", &["method"]).unwrap();
        let c = r.get_or_create_counter("req_total", "", &["endpoint"]);
        assert_eq!(c.desc().name, "req_total_new");
        assert!(r.get("req_total_new").is_some());

        // A kind clash on the fallback name too ends in a detached collector.
        let g = r.get_or_create_gauge("req_total", "", &["x"]);
        g.inc(&[("x", "1")]).unwrap();
        assert_eq!(r.names(), vec!["req_total", "req_total_new"]);
    }

    #[test]
    fn invalid_name_never_panics() {
        let r = Registry::new();
        let c = r.get_or_create_counter("bad name", "", &[]);
        c.inc(&[]).unwrap();
        assert!(r.names().is_empty());
    }
}

//! Metric families: counter, gauge and histogram with declared label names.
//!
//! Each family owns a `DashMap` keyed by label values in declared order, so
//! concurrent request tasks update series without any lock of ours. Values
//! are `f64` stored as bits in an `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{PromwareError, Result};

/// Label values in declared label-name order.
pub(crate) type LabelKey = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Metric definition: name, help text, ordered label names, kind.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDesc {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
    pub kind: MetricKind,
}

impl MetricDesc {
    pub(crate) fn new(name: &str, help: &str, label_names: &[&str], kind: MetricKind) -> Result<Self> {
        if !is_valid_metric_name(name) {
            return Err(PromwareError::InvalidName(name.to_string()));
        }
        let mut names: Vec<String> = Vec::with_capacity(label_names.len());
        for l in label_names {
            let reserved = kind == MetricKind::Histogram && *l == "le";
            if !is_valid_label_name(l) || reserved || names.iter().any(|n| n == l) {
                return Err(PromwareError::InvalidLabel {
                    metric: name.to_string(),
                    label: l.to_string(),
                });
            }
            names.push(l.to_string());
        }
        Ok(Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: names,
            kind,
        })
    }

    /// Whether a caller asking for `label_names` can share this definition.
    pub fn same_labels(&self, label_names: &[&str]) -> bool {
        self.label_names.len() == label_names.len()
            && self.label_names.iter().zip(label_names).all(|(a, b)| a == b)
    }

    /// Resolve a label assignment into a series key.
    ///
    /// The assignment must name every declared label exactly once, in any order.
    pub(crate) fn label_key(&self, labels: &[(&str, &str)]) -> Result<LabelKey> {
        if labels.len() != self.label_names.len() {
            return Err(self.mismatch(labels));
        }
        let mut key = Vec::with_capacity(labels.len());
        for name in &self.label_names {
            match labels.iter().find(|(k, _)| k == name) {
                Some((_, v)) => key.push((*v).to_string()),
                None => return Err(self.mismatch(labels)),
            }
        }
        Ok(key)
    }

    fn mismatch(&self, labels: &[(&str, &str)]) -> PromwareError {
        PromwareError::LabelMismatch {
            metric: self.name.clone(),
            expected: self.label_names.join(","),
            got: labels.iter().map(|(k, _)| *k).collect::<Vec<_>>().join(","),
        }
    }
}

fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `f64` with atomic add/set (bit-cast through `AtomicU64`).
#[derive(Debug, Default)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn add(&self, v: f64) {
        let mut cur = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(cur) + v).to_bits();
            match self
                .0
                .compare_exchange_weak(cur, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => cur = actual,
            }
        }
    }
}

/// Shared storage for one family: its definition plus labeled series.
#[derive(Debug)]
struct Family<V> {
    desc: MetricDesc,
    series: DashMap<LabelKey, V>,
}

impl<V> Family<V> {
    fn new(desc: MetricDesc, init: impl FnOnce() -> V) -> Self {
        let series = DashMap::new();
        // Unlabeled families expose a single series from the start.
        if desc.label_names.is_empty() {
            series.insert(Vec::new(), init());
        }
        Self { desc, series }
    }

    fn with_series<R>(
        &self,
        labels: &[(&str, &str)],
        init: impl FnOnce() -> V,
        f: impl FnOnce(&V) -> R,
    ) -> Result<R> {
        let key = self.desc.label_key(labels)?;
        if let Some(v) = self.series.get(&key) {
            return Ok(f(v.value()));
        }
        let entry = self.series.entry(key).or_insert_with(init);
        Ok(f(entry.value()))
    }

    fn peek<R>(&self, labels: &[(&str, &str)], f: impl FnOnce(&V) -> R) -> Result<Option<R>> {
        let key = self.desc.label_key(labels)?;
        Ok(self.series.get(&key).map(|v| f(v.value())))
    }

    fn snapshot<R>(&self, f: impl Fn(&V) -> R) -> Vec<(LabelKey, R)> {
        let mut out: Vec<(LabelKey, R)> = self
            .series
            .iter()
            .map(|r| (r.key().clone(), f(r.value())))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

/// Monotonic counter family. Cloning shares the same series.
#[derive(Debug, Clone)]
pub struct Counter {
    inner: Arc<Family<AtomicF64>>,
}

impl Counter {
    pub(crate) fn new(desc: MetricDesc) -> Self {
        Self {
            inner: Arc::new(Family::new(desc, AtomicF64::default)),
        }
    }

    pub fn desc(&self) -> &MetricDesc {
        &self.inner.desc
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) -> Result<()> {
        self.add(labels, 1.0)
    }

    /// Increment by an arbitrary non-negative value.
    pub fn add(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        if v < 0.0 || v.is_nan() {
            return Err(PromwareError::NegativeIncrement(self.inner.desc.name.clone()));
        }
        self.inner.with_series(labels, AtomicF64::default, |c| c.add(v))
    }

    /// Current value (0 for a series never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> Result<f64> {
        Ok(self.inner.peek(labels, AtomicF64::get)?.unwrap_or(0.0))
    }

    pub(crate) fn samples(&self) -> Vec<(LabelKey, f64)> {
        self.inner.snapshot(AtomicF64::get)
    }
}

/// Gauge family (can go up and down).
#[derive(Debug, Clone)]
pub struct Gauge {
    inner: Arc<Family<AtomicF64>>,
}

impl Gauge {
    pub(crate) fn new(desc: MetricDesc) -> Self {
        Self {
            inner: Arc::new(Family::new(desc, AtomicF64::default)),
        }
    }

    pub fn desc(&self) -> &MetricDesc {
        &self.inner.desc
    }

    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) -> Result<()> {
        self.add(labels, 1.0)
    }

    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) -> Result<()> {
        self.add(labels, -1.0)
    }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        self.inner.with_series(labels, AtomicF64::default, |g| g.add(v))
    }

    pub fn set(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        self.inner.with_series(labels, AtomicF64::default, |g| g.set(v))
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> Result<f64> {
        Ok(self.inner.peek(labels, AtomicF64::get)?.unwrap_or(0.0))
    }

    pub(crate) fn samples(&self) -> Vec<(LabelKey, f64)> {
        self.inner.snapshot(AtomicF64::get)
    }
}

#[derive(Debug)]
pub(crate) struct HistogramSeries {
    count: AtomicU64,
    sum: AtomicF64,
    /// Cumulative: bucket `i` counts observations `<= bounds[i]`.
    buckets: Vec<AtomicU64>,
}

impl HistogramSeries {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicF64::default(),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Point-in-time copy of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// `(upper_bound, cumulative_count)`; `+Inf` is implied by `count`.
    pub buckets: Vec<(f64, u64)>,
}

#[derive(Debug)]
struct HistogramInner {
    family: Family<HistogramSeries>,
    bounds: Vec<f64>,
}

/// Histogram family with fixed, ascending bucket bounds.
#[derive(Debug, Clone)]
pub struct Histogram {
    inner: Arc<HistogramInner>,
}

impl Histogram {
    pub(crate) fn new(desc: MetricDesc, bounds: Vec<f64>) -> Self {
        let n = bounds.len();
        Self {
            inner: Arc::new(HistogramInner {
                family: Family::new(desc, || HistogramSeries::new(n)),
                bounds,
            }),
        }
    }

    pub fn desc(&self) -> &MetricDesc {
        &self.inner.family.desc
    }

    pub fn bounds(&self) -> &[f64] {
        &self.inner.bounds
    }

    /// Record one observation.
    pub fn observe(&self, labels: &[(&str, &str)], v: f64) -> Result<()> {
        let bounds = &self.inner.bounds;
        self.inner
            .family
            .with_series(labels, || HistogramSeries::new(bounds.len()), |h| {
                h.count.fetch_add(1, Ordering::Relaxed);
                h.sum.add(v);
                // Cumulative buckets: every bound at or above the value.
                for (i, &b) in bounds.iter().enumerate() {
                    if v <= b {
                        h.buckets[i].fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
    }

    /// Snapshot of one series, `None` if it was never observed.
    pub fn get(&self, labels: &[(&str, &str)]) -> Result<Option<HistogramSnapshot>> {
        self.inner.family.peek(labels, |h| self.snapshot_of(h))
    }

    pub(crate) fn samples(&self) -> Vec<(LabelKey, HistogramSnapshot)> {
        self.inner.family.snapshot(|h| self.snapshot_of(h))
    }

    fn snapshot_of(&self, h: &HistogramSeries) -> HistogramSnapshot {
        HistogramSnapshot {
            count: h.count.load(Ordering::Relaxed),
            sum: h.sum.get(),
            buckets: self
                .inner
                .bounds
                .iter()
                .zip(&h.buckets)
                .map(|(b, c)| (*b, c.load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

//! Prometheus text exposition format (version 0.0.4).
//!
//! Collectors are rendered in name order and series in label-value order so
//! output is deterministic for scrapes, file snapshots, and tests.

use std::fmt::Write;

use crate::registry::{Collector, MetricDesc, Registry};

/// Content type for the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

fn fmt_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

fn label_pairs(desc: &MetricDesc, values: &[String]) -> Vec<String> {
    desc.label_names
        .iter()
        .zip(values)
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect()
}

fn braces(pairs: &[String]) -> String {
    if pairs.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", pairs.join(","))
    }
}

/// Render every collector of the registry.
pub fn encode(registry: &Registry) -> String {
    let mut out = String::new();
    for collector in registry.collectors() {
        encode_collector(&collector, &mut out);
    }
    out
}

/// Render one collector (HELP, TYPE, then one line per series).
pub fn encode_collector(collector: &Collector, out: &mut String) {
    let desc = collector.desc();
    let _ = writeln!(out, "# HELP {} {}", desc.name, escape_help(&desc.help));
    let _ = writeln!(out, "# TYPE {} {}", desc.name, desc.kind.as_str());

    match collector {
        Collector::Counter(c) => {
            for (key, v) in c.samples() {
                let _ = writeln!(out, "{}{} {}", desc.name, braces(&label_pairs(desc, &key)), fmt_value(v));
            }
        }
        Collector::Gauge(g) => {
            for (key, v) in g.samples() {
                let _ = writeln!(out, "{}{} {}", desc.name, braces(&label_pairs(desc, &key)), fmt_value(v));
            }
        }
        Collector::Histogram(h) => {
            for (key, snap) in h.samples() {
                let pairs = label_pairs(desc, &key);
                for (le, count) in &snap.buckets {
                    let mut with_le = pairs.clone();
                    with_le.push(format!("le=\"{}\"", fmt_value(*le)));
                    let _ = writeln!(out, "{}_bucket{} {}", desc.name, braces(&with_le), count);
                }
                let mut inf = pairs.clone();
                inf.push("le=\"+Inf\"".to_string());
                let _ = writeln!(out, "{}_bucket{} {}", desc.name, braces(&inf), snap.count);
                let _ = writeln!(out, "{}_sum{} {}", desc.name, braces(&pairs), fmt_value(snap.sum));
                let _ = writeln!(out, "{}_count{} {}", desc.name, braces(&pairs), snap.count);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn renders_help_type_and_series() {
        let r = Registry::new();
        let c = r
            .register_counter("app_requests_total", "Total requests", &["method", "endpoint"])
            .unwrap();
        c.inc(&[("method", "GET"), ("endpoint", "/items/:id")]).unwrap();
        c.add(&[("endpoint", "/"), ("method", "POST")], 2.0).unwrap();

        let text = r.render();
        let expected = "\
# HELP app_requests_total Total requests
# TYPE app_requests_total counter
app_requests_total{method=\"GET\",endpoint=\"/items/:id\"} 1
app_requests_total{method=\"POST\",endpoint=\"/\"} 2
";
        assert_eq!(text, expected);
    }

    #[test]
    fn unlabeled_counter_starts_at_zero_without_braces() {
        let r = Registry::new();
        r.register_counter("app_global_total", "All", &[]).unwrap();
        assert!(r.render().contains("\napp_global_total 0\n"));
    }

    #[test]
    fn histogram_renders_buckets_sum_count() {
        let r = Registry::new();
        let h = r
            .register_histogram("lat_seconds", "Latency", &["endpoint"], &[0.5, 1.0])
            .unwrap();
        h.observe(&[("endpoint", "/a")], 0.25).unwrap();
        h.observe(&[("endpoint", "/a")], 2.0).unwrap();

        let text = r.render();
        assert!(text.contains("# TYPE lat_seconds histogram\n"));
        assert!(text.contains("lat_seconds_bucket{endpoint=\"/a\",le=\"0.5\"} 1\n"));
        assert!(text.contains("lat_seconds_bucket{endpoint=\"/a\",le=\"1\"} 1\n"));
        assert!(text.contains("lat_seconds_bucket{endpoint=\"/a\",le=\"+Inf\"} 2\n"));
        assert!(text.contains("lat_seconds_sum{endpoint=\"/a\"} 2.25\n"));
        assert!(text.contains("lat_seconds_count{endpoint=\"/a\"} 2\n"));
    }

    #[test]
    fn escapes_label_values_and_help() {
        let r = Registry::new();
        let g = r.register_gauge("g", "line1\nline2", &["path"]).unwrap();
        g.set(&[("path", "a\"b\\c")], 1.5).unwrap();
        let text = r.render();
        assert!(text.contains("# HELP g line1\\nline2\n"));
        assert!(text.contains("g{path=\"a\\\"b\\\\c\"} 1.5\n"));
    }
}

//! Timing histograms for the translation pipeline, served on `/metrics`.
//! Each stage keeps its most recent samples and reports p50/p95/p99.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

const RING_CAPACITY: usize = 1024;

/// Times one pipeline stage; the sample lands in the registry on `finish`.
pub struct TimingSpan {
    name: &'static str,
    start: Instant,
    registry: Arc<MetricsRegistry>,
}

impl TimingSpan {
    pub fn finish(self) {
        let elapsed_us = self.start.elapsed().as_micros() as f64;
        self.registry.record(self.name, elapsed_us);
    }
}

/// Latest `capacity` samples of one stage.
struct SampleRing {
    samples: Vec<f64>,
    pos: usize,
    count: usize,
}

impl SampleRing {
    fn new(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity],
            pos: 0,
            count: 0,
        }
    }

    fn push(&mut self, value: f64) {
        self.samples[self.pos] = value;
        self.pos = (self.pos + 1) % self.samples.len();
        self.count = (self.count + 1).min(self.samples.len());
    }

    fn percentile(&self, p: f64) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples[..self.count].to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let idx = ((p / 100.0) * (self.count as f64 - 1.0)).round() as usize;
        sorted[idx.min(self.count - 1)]
    }

    fn summary(&self) -> MetricSummary {
        MetricSummary {
            p50_us: self.percentile(50.0),
            p95_us: self.percentile(95.0),
            p99_us: self.percentile(99.0),
            count: self.count,
        }
    }
}

#[derive(Default)]
pub struct MetricsRegistry {
    histograms: Mutex<HashMap<&'static str, SampleRing>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &'static str, value_us: f64) {
        self.histograms
            .lock()
            .entry(name)
            .or_insert_with(|| SampleRing::new(RING_CAPACITY))
            .push(value_us);
        tracing::trace!(metric = name, value_us, "metric_recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> TimingSpan {
        TimingSpan {
            name,
            start: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    /// Every stage seen so far, keyed by metric name.
    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.histograms
            .lock()
            .iter()
            .map(|(&name, ring)| (name.to_string(), ring.summary()))
            .collect()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricSummary {
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub count: usize,
}

pub mod metric_names {
    pub const TAG: &str = "t_tag";
    pub const CACHE_LOOKUP: &str = "t_cache_lookup";
    pub const GENERATE: &str = "t_generate";
    pub const REQUEST: &str = "t_request";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_over_samples() {
        let registry = MetricsRegistry::new();
        for v in 1..=100 {
            registry.record(metric_names::TAG, v as f64);
        }
        let tag = &registry.summary()[metric_names::TAG];
        assert_eq!(tag.count, 100);
        assert_eq!(tag.p50_us, 51.0);
        assert_eq!(tag.p95_us, 95.0);
        assert_eq!(tag.p99_us, 99.0);
    }

    #[test]
    fn ring_keeps_latest_samples() {
        let mut ring = SampleRing::new(2);
        assert_eq!(ring.percentile(50.0), 0.0);
        ring.push(1.0);
        ring.push(5.0);
        ring.push(9.0);
        assert_eq!(ring.count, 2);
        assert_eq!(ring.percentile(0.0), 5.0);
        assert_eq!(ring.percentile(100.0), 9.0);
    }

    #[test]
    fn span_records_on_finish() {
        let registry = Arc::new(MetricsRegistry::new());
        let span = registry.span(metric_names::REQUEST);
        assert!(registry.summary().is_empty());
        span.finish();
        assert_eq!(registry.summary()[metric_names::REQUEST].count, 1);
    }
}

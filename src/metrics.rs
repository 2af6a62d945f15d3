//! Runtime metrics: query latency percentiles, ingest/remove throughput.

use std::time::Duration;

/// Collects runtime metrics for the query engine.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    query_latencies_us: Vec<f64>,
    total_queries: u64,
    total_degraded_queries: u64,
    total_ingested_vectors: u64,
    total_removes: u64,
}

/// Point-in-time summary of collected metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsReport {
    pub total_queries: u64,
    pub total_degraded_queries: u64,
    pub total_ingested_vectors: u64,
    pub total_removes: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed query with its duration; `degraded` marks a
    /// query that fell back to a single modality.
    pub fn record_query(&mut self, duration: Duration, degraded: bool) {
        self.total_queries += 1;
        if degraded {
            self.total_degraded_queries += 1;
        }
        self.query_latencies_us.push(duration.as_micros() as f64);
    }

    /// Record ingested vectors (one item may add two).
    pub fn record_ingest(&mut self, vectors: u64) {
        self.total_ingested_vectors += vectors;
    }

    pub fn record_remove(&mut self) {
        self.total_removes += 1;
    }

    pub fn total_queries(&self) -> u64 {
        self.total_queries
    }

    /// Average query latency in microseconds.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// A percentile of query latency (e.g. 50.0, 95.0, 99.0).
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }

        let mut sorted = self.query_latencies_us.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let index = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_queries: self.total_queries,
            total_degraded_queries: self.total_degraded_queries,
            total_ingested_vectors: self.total_ingested_vectors,
            total_removes: self.total_removes,
            avg_query_latency_us: self.avg_query_latency_us(),
            p50_query_latency_us: self.percentile_query_latency_us(50.0),
            p95_query_latency_us: self.percentile_query_latency_us(95.0),
            p99_query_latency_us: self.percentile_query_latency_us(99.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut m = MetricsCollector::new();
        m.record_ingest(2);
        m.record_ingest(1);
        m.record_remove();

        let report = m.report();
        assert_eq!(report.total_ingested_vectors, 3);
        assert_eq!(report.total_removes, 1);
        assert_eq!(report.total_queries, 0);
    }

    #[test]
    fn test_latency_percentiles() {
        let mut m = MetricsCollector::new();
        m.record_query(Duration::from_micros(100), false);
        m.record_query(Duration::from_micros(200), true);
        m.record_query(Duration::from_micros(300), false);

        let report = m.report();
        assert_eq!(report.total_queries, 3);
        assert_eq!(report.total_degraded_queries, 1);
        assert!((report.avg_query_latency_us - 200.0).abs() < 1.0);
        assert!((report.p50_query_latency_us - 200.0).abs() < 1.0);
    }

    #[test]
    fn test_empty_report() {
        let m = MetricsCollector::new();
        let report = m.report();
        assert_eq!(report.avg_query_latency_us, 0.0);
        assert_eq!(report.p99_query_latency_us, 0.0);
    }
}

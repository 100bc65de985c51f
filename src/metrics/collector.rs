// src/metrics/collector.rs
use crate::health::{AggregateResult, Status};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Probe endpoint
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: Histogram,

    // Per dependency
    pub dependency_checks_total: IntCounterVec,
    pub dependency_check_duration_seconds: HistogramVec,
    pub dependency_status: IntGaugeVec,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new("heartbeat_requests_total", "Total heartbeat requests by overall status"),
            &["status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "heartbeat_request_duration_seconds",
            "Time spent checking all dependencies for one heartbeat request",
        ))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let dependency_checks_total = IntCounterVec::new(
            Opts::new(
                "heartbeat_dependency_checks_total",
                "Total dependency checks by outcome",
            ),
            &["dependency", "status"],
        )?;
        registry.register(Box::new(dependency_checks_total.clone()))?;

        let dependency_check_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "heartbeat_dependency_check_duration_seconds",
                "Dependency check latency",
            ),
            &["dependency"],
        )?;
        registry.register(Box::new(dependency_check_duration_seconds.clone()))?;

        let dependency_status = IntGaugeVec::new(
            Opts::new(
                "heartbeat_dependency_status",
                "Last observed status rank (0=NotSet, 1=OK, 2=Warning, 3=Critical)",
            ),
            &["dependency"],
        )?;
        registry.register(Box::new(dependency_status.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
            dependency_checks_total,
            dependency_check_duration_seconds,
            dependency_status,
        })
    }

    pub fn record_request(&self, status: Status, duration: Duration) {
        self.requests_total
            .with_label_values(&[status.as_str()])
            .inc();
        self.request_duration_seconds.observe(duration.as_secs_f64());
    }

    pub fn record_dependencies(&self, aggregate: &AggregateResult) {
        for result in &aggregate.results {
            let name = result.name.as_str();
            self.dependency_checks_total
                .with_label_values(&[name, result.status.as_str()])
                .inc();
            self.dependency_check_duration_seconds
                .with_label_values(&[name])
                .observe(result.latency_ms / 1000.0);
            self.dependency_status
                .with_label_values(&[name])
                .set(i64::from(result.status.rank()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::CheckResult;

    #[test]
    fn test_records_dependencies_and_requests() {
        let registry = MetricsRegistry::new().unwrap();
        let collector = registry.collector();

        let aggregate = AggregateResult {
            overall_status: Status::Warning,
            results: vec![CheckResult {
                name: "db".to_string(),
                latency_ms: 12.0,
                ..CheckResult::warning("slow response")
            }],
        };
        collector.record_dependencies(&aggregate);
        collector.record_request(aggregate.overall_status, Duration::from_millis(15));

        assert_eq!(
            collector
                .dependency_checks_total
                .with_label_values(&["db", "Warning"])
                .get(),
            1
        );
        assert_eq!(collector.dependency_status.with_label_values(&["db"]).get(), 2);

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("heartbeat_requests_total{status=\"Warning\"} 1"));
    }
}

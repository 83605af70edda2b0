//! Prometheus metrics registry for Stratus
//!
//! Provides typed, labeled counters, gauges, and histograms for the sync
//! scheduler, the reconciliation passes, the recycle bin and leader election.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Central metrics registry holding all Prometheus metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: applied store mutations by (vendor, resource_type, operation)
    pub reconcile_operations_total: IntCounterVec,
    /// Counter: failed reconciliation passes by (vendor, resource_type)
    pub reconcile_failures_total: IntCounterVec,
    /// Histogram: duration of one reconciliation pass, by vendor
    pub reconcile_duration_seconds: HistogramVec,
    /// Counter: scheduler ticks by result
    pub sweeps_total: IntCounterVec,
    /// Counter: recycle records settled by (resource_type, outcome)
    pub recycle_records_total: IntCounterVec,
    /// Gauge: 1 while this instance holds leadership, 0 otherwise
    pub leader_status: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new_custom(Some("stratus".to_string()), None)?;

        let reconcile_operations_total = IntCounterVec::new(
            Opts::new(
                "reconcile_operations_total",
                "Store mutations applied by reconciliation",
            ),
            &["vendor", "resource_type", "operation"],
        )?;
        registry.register(Box::new(reconcile_operations_total.clone()))?;

        let reconcile_failures_total = IntCounterVec::new(
            Opts::new(
                "reconcile_failures_total",
                "Reconciliation passes that ended with an error",
            ),
            &["vendor", "resource_type"],
        )?;
        registry.register(Box::new(reconcile_failures_total.clone()))?;

        let reconcile_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "reconcile_duration_seconds",
                "Duration of one reconciliation pass in seconds",
            )
            .buckets(vec![0.1, 1.0, 5.0, 30.0, 120.0, 600.0]),
            &["vendor"],
        )?;
        registry.register(Box::new(reconcile_duration_seconds.clone()))?;

        let sweeps_total = IntCounterVec::new(
            Opts::new("sweeps_total", "Sync scheduler ticks by result"),
            &["result"],
        )?;
        registry.register(Box::new(sweeps_total.clone()))?;

        let recycle_records_total = IntCounterVec::new(
            Opts::new("recycle_records_total", "Recycle records settled by outcome"),
            &["resource_type", "outcome"],
        )?;
        registry.register(Box::new(recycle_records_total.clone()))?;

        let leader_status = IntGauge::new(
            "leader_status",
            "Whether this instance currently holds leadership",
        )?;
        registry.register(Box::new(leader_status.clone()))?;

        Ok(Self {
            registry,
            reconcile_operations_total,
            reconcile_failures_total,
            reconcile_duration_seconds,
            sweeps_total,
            recycle_records_total,
            leader_status,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record `count` applied mutations of one kind (`create`, `update`, `delete`).
    pub fn record_reconcile_operations(
        &self,
        vendor: &str,
        resource_type: &str,
        operation: &str,
        count: u64,
    ) {
        if count > 0 {
            self.reconcile_operations_total
                .with_label_values(&[vendor, resource_type, operation])
                .inc_by(count);
        }
    }

    /// Record a reconciliation pass that ended with an error.
    pub fn record_reconcile_failure(&self, vendor: &str, resource_type: &str) {
        self.reconcile_failures_total
            .with_label_values(&[vendor, resource_type])
            .inc();
    }

    /// Observe the duration of one reconciliation pass.
    pub fn observe_reconcile_duration(&self, vendor: &str, duration_secs: f64) {
        self.reconcile_duration_seconds
            .with_label_values(&[vendor])
            .observe(duration_secs);
    }

    /// Record one scheduler tick (`completed`, `partial`, `not_leader`).
    pub fn record_sweep(&self, result: &str) {
        self.sweeps_total.with_label_values(&[result]).inc();
    }

    /// Record settled recycle records (`recycled`, `failed`, `related`).
    pub fn record_recycle(&self, resource_type: &str, outcome: &str, count: u64) {
        if count > 0 {
            self.recycle_records_total
                .with_label_values(&[resource_type, outcome])
                .inc_by(count);
        }
    }

    /// Set the leadership gauge.
    pub fn set_leader(&self, is_leader: bool) {
        self.leader_status.set(i64::from(is_leader));
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

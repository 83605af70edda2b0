//! Stratus Telemetry - Observability for the control loops
//!
//! Provides:
//! - `MetricsRegistry`: Prometheus counters, gauges and histograms for
//!   reconciliation, sweeps, the recycle bin and leadership
//! - `MetricsServer`: HTTP server for Prometheus scraping

pub mod metrics;
pub mod server;

pub use metrics::MetricsRegistry;
pub use server::MetricsServer;

//! Leader gate helpers
//!
//! - [`StandaloneLeader`] always answers yes, for single-instance deployments.
//! - [`ObservedLeader`] wraps any gate, logs leadership changes and keeps
//!   the `leader_status` gauge current.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use stratus_core::ports::ILeaderGate;
use stratus_telemetry::MetricsRegistry;
use tracing::info;

/// Leader gate for a single process: always the leader
#[derive(Debug, Default, Clone, Copy)]
pub struct StandaloneLeader;

#[async_trait::async_trait]
impl ILeaderGate for StandaloneLeader {
    async fn is_master(&self) -> bool {
        true
    }
}

const UNKNOWN: u8 = 0;
const FOLLOWER: u8 = 1;
const LEADER: u8 = 2;

/// Gate decorator reporting leadership transitions
pub struct ObservedLeader {
    inner: Arc<dyn ILeaderGate>,
    metrics: Option<Arc<MetricsRegistry>>,
    last: AtomicU8,
}

impl ObservedLeader {
    pub fn new(inner: Arc<dyn ILeaderGate>) -> Self {
        Self {
            inner,
            metrics: None,
            last: AtomicU8::new(UNKNOWN),
        }
    }

    /// Attaches the metrics registry whose gauge should follow leadership
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait::async_trait]
impl ILeaderGate for ObservedLeader {
    async fn is_master(&self) -> bool {
        let leader = self.inner.is_master().await;
        let state = if leader { LEADER } else { FOLLOWER };

        let previous = self.last.swap(state, Ordering::AcqRel);
        if previous != state {
            if leader {
                info!("Acquired leadership");
            } else if previous == LEADER {
                info!("Lost leadership");
            } else {
                info!("Running as follower");
            }
        }

        if let Some(ref metrics) = self.metrics {
            metrics.set_leader(leader);
        }
        leader
    }
}

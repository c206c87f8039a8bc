//! Vendor-agnostic decoration metrics via a pluggable sink.
//!
//! Implement [`MetricsSink`] and install it once with [`set_sink`]:
//!
//! ```ignore
//! use acl_decorator::metrics::{DecorationStats, MetricsSink, set_sink};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct BackendCalls(AtomicU64);
//!
//! impl MetricsSink for BackendCalls {
//!     fn on_decoration(&self, stats: &DecorationStats) {
//!         self.0.fetch_add(stats.backend_calls as u64, Ordering::Relaxed);
//!     }
//! }
//!
//! set_sink(Arc::new(BackendCalls(AtomicU64::new(0))));
//! ```
//!
//! Without a sink, events go to a no-op sink.

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::warn;

/// Summary of one successful decoration call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecorationStats {
    /// Wall-clock time of the whole call.
    pub duration: Duration,
    /// Entities in the input tree.
    pub entities: usize,
    /// Decorated descriptions built (inline entities plus distinct shared groups).
    pub descriptions: usize,
    /// Distinct (shape, chain key) groups among shared entities.
    pub shared_groups: usize,
    /// Entities in the whole-entity query.
    pub entity_queries: usize,
    /// Operation signatures across the per-operation query.
    pub operation_queries: usize,
    /// Requests sent to the permission backend.
    pub backend_calls: usize,
    /// Defined policy ids under the prefix.
    pub policies: usize,
}

/// Per-phase timings of one decoration call, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecorationPhases {
    pub list_policies_ms: f64,
    pub resolve_ms: f64,
    pub query_ms: f64,
    pub write_back_ms: f64,
    pub total_ms: f64,
}

impl DecorationPhases {
    /// Time not accounted for by a measured phase.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms - (self.list_policies_ms + self.resolve_ms + self.query_ms + self.write_back_ms)
    }
}

pub trait MetricsSink: Send + Sync {
    /// Called after every call that produced a decorated tree.
    fn on_decoration(&self, stats: &DecorationStats);

    /// Phase breakdown for the same call. Default: ignored.
    fn on_decoration_phases(&self, _stats: &DecorationStats, _phases: &DecorationPhases) {}

    /// Called when a call returned the input unchanged, with the reason.
    fn on_skipped(&self, _reason: &str) {}
}

struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_decoration(&self, _stats: &DecorationStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

fn sink() -> Arc<dyn MetricsSink> {
    SINK.get_or_init(|| Arc::new(NoOpSink)).clone()
}

/// Set the global metrics sink. Only the first call takes effect.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            "Metrics sink was already initialized. Ignoring subsequent set_sink call. Set the sink before the first decoration."
        );
    }
}

pub(crate) fn record_decoration(stats: &DecorationStats, phases: &DecorationPhases) {
    let sink = sink();
    sink.on_decoration(stats);
    sink.on_decoration_phases(stats, phases);
}

pub(crate) fn record_skipped(reason: &str) {
    sink().on_skipped(reason);
}

use crate::util::errors::Error;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub revisions_advanced: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "controller_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["instance"],
        )
        .expect("valid histogram options");
        let failures = IntCounterVec::new(
            opts!("controller_reconciliation_errors_total", "reconciliation errors",),
            &["instance", "error"],
        )
        .expect("valid counter options");
        let reconciliations =
            IntCounter::new("reconciliations_total", "reconciliations").expect("valid counter options");
        let revisions_advanced = IntCounterVec::new(
            opts!("git_revisions_advanced_total", "git volume revisions advanced",),
            &["kind"],
        )
        .expect("valid counter options");
        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            revisions_advanced,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.revisions_advanced.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, kind: &str, e: &Error) {
        self.failures
            .with_label_values(&[kind, e.metric_label().as_ref()])
            .inc()
    }

    pub fn revisions_advanced(&self, kind: &str, count: usize) {
        self.revisions_advanced
            .with_label_values(&[kind])
            .inc_by(count as u64)
    }

    pub fn count_and_measure(&self, kind: &str) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            instance: kind.to_lowercase(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    instance: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.instance.as_str()])
            .observe(duration);
    }
}

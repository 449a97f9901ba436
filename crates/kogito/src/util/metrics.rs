use crate::util::errors::Error;
use kube::ResourceExt;
use prometheus::{histogram_opts, opts, HistogramVec, IntCounterVec, Registry};
use tokio::time::Instant;
use tracing::*;

#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounterVec,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "kogito_operator_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["controller"],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!(
                "kogito_operator_reconciliation_errors_total",
                "reconciliation errors",
            ),
            &["controller", "instance", "error"],
        )
        .unwrap();
        let reconciliations = IntCounterVec::new(
            opts!("kogito_operator_reconciliations_total", "reconciliations"),
            &["controller"],
        )
        .unwrap();
        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure<K: ResourceExt>(&self, controller: &str, obj: &K, e: &Error) {
        let label = e.metric_label();
        debug!("reconcile failure: {:?}", &[controller, obj.name_any().as_str(), label.as_str()]);
        self.failures
            .with_label_values(&[controller, obj.name_any().as_str(), label.as_str()])
            .inc()
    }

    pub fn count_and_measure(&self, controller: &str) -> ReconcileMeasurer {
        self.reconciliations.with_label_values(&[controller]).inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            controller: controller.to_string(),
        }
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    controller: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric
            .with_label_values(&[self.controller.as_str()])
            .observe(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1beta1::KogitoInfra;

    #[test]
    fn test_failures_are_labelled_by_error() {
        let registry = Registry::new();
        let metrics = Metrics::default().register(&registry).unwrap();
        let infra = KogitoInfra::new("kafka", Default::default());

        metrics.reconcile_failure("infra", &infra, &Error::not_ready("not ready"));
        {
            let _timer = metrics.count_and_measure("infra");
        }

        assert_eq!(
            metrics
                .failures
                .with_label_values(&["infra", "kafka", "resourcenotready"])
                .get(),
            1
        );
        assert_eq!(metrics.reconciliations.with_label_values(&["infra"]).get(), 1);
        assert_eq!(registry.gather().len(), 3);
    }
}

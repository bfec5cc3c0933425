//! Observability: Prometheus metrics (feature `metrics`) and tracing spans
//! (feature `tracing`).

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{FieldbookMetrics, METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider as _};
    use opentelemetry::{global, KeyValue};
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Registry, TextEncoder};
    use std::time::Duration;

    pub static METRICS: Lazy<FieldbookMetrics> = Lazy::new(FieldbookMetrics::init);

    pub struct FieldbookMetrics {
        pub registry: Registry,
        pub resources_created: Counter<u64>,
        pub derivations: Counter<u64>,
        pub query_errors: Counter<u64>,
        pub filter_errors: Counter<u64>,
        pub query_duration: Histogram<f64>,
    }

    impl FieldbookMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            global::set_meter_provider(provider.clone());
            let meter = provider.meter("fieldbook");

            let resources_created = meter
                .u64_counter("fieldbook_resources_created_total")
                .with_description("Resources created, by resource type")
                .build();

            let derivations = meter
                .u64_counter("fieldbook_derivations_total")
                .with_description("Derivation rules that wrote a field, by rule")
                .build();

            let query_errors = meter
                .u64_counter("fieldbook_query_errors_total")
                .with_description("Failed SQL statements")
                .build();

            let filter_errors = meter
                .u64_counter("fieldbook_filter_errors_total")
                .with_description("Listing filters or orderings that did not compile")
                .build();

            let query_duration = meter
                .f64_histogram("fieldbook_query_duration_seconds")
                .with_description("Duration of SQL statements")
                .build();

            Self {
                registry,
                resources_created,
                derivations,
                query_errors,
                filter_errors,
                query_duration,
            }
        }

        pub fn record_resource_created(&self, resource_type: &str) {
            self.resources_created
                .add(1, &[KeyValue::new("resource_type", resource_type.to_string())]);
        }

        pub fn record_derivation(&self, rule: &'static str) {
            self.derivations.add(1, &[KeyValue::new("rule", rule)]);
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors.add(1, &[]);
        }

        pub fn record_filter_error(&self) {
            self.filter_errors.add(1, &[]);
        }

        /// Prometheus text exposition of every collected metric.
        pub fn render(&self) -> String {
            TextEncoder::new()
                .encode_to_string(&self.registry.gather())
                .unwrap_or_default()
        }
    }
}

/// Span constructors shared by the executor, transactions and the store.
#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;
    use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

    pub fn execute_query_span(query: &str) -> Span {
        tracing::debug_span!("fieldbook.query", db.statement = %query)
    }

    pub fn begin_transaction_span() -> Span {
        tracing::debug_span!("fieldbook.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::debug_span!("fieldbook.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::debug_span!("fieldbook.transaction.rollback")
    }

    pub fn acquire_connection_span() -> Span {
        tracing::debug_span!("fieldbook.connect")
    }

    /// Span around one public store operation.
    pub fn store_operation_span(operation: &'static str, resource_type: &str) -> Span {
        tracing::info_span!("fieldbook.store", operation, resource_type = %resource_type)
    }

    pub fn derivation_span(resource_type: &str) -> Span {
        tracing::debug_span!("fieldbook.derive", resource_type = %resource_type)
    }

    /// Installs a bare registry as the global subscriber so spans get ids.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already set.
    pub fn install_registry() -> Result<(), TryInitError> {
        tracing_subscriber::registry().try_init()
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::METRICS;

    #[test]
    fn test_filter_errors_have_their_own_counter() {
        METRICS.record_filter_error();
        let rendered = METRICS.render();
        assert!(rendered.contains("fieldbook_filter_errors"), "{rendered}");
        assert!(rendered.contains("Listing filters or orderings that did not compile"), "{rendered}");
    }
}

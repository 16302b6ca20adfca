//! # Logging and metrics
//!
//! Logs always go through `tracing_subscriber::fmt`, filtered by `RUST_LOG`
//! (default `info`), either human-readable or as JSON lines.
//!
//! ## Feature matrix
//!
//! - `metrics`: Enables OpenTelemetry metrics for the retrieval surface
//!   (request, served, unavailable and invalid-request counters, plus a serve
//!   duration histogram).
//! - `stdout`: Exports those metrics periodically to stdout.
//!
//! Without `metrics`, every recording helper below compiles to a no-op.
//!
//! ## Example usage
//!
//! ```bash
//! cargo run --features metrics,stdout
//! ```

// Disallow using `stdout` without `metrics`
#[cfg(all(feature = "stdout", not(feature = "metrics")))]
compile_error!("The 'stdout' feature requires 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Histogram, Meter};
#[cfg(feature = "metrics")]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::Resource;
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use opentelemetry_semantic_conventions as semvcns;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

pub struct TelemetryProviders {
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down exporters. Errors are reported on stderr since
    /// logging may already be gone.
    pub fn shutdown(self) {
        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {:#?}", err);
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {:#?}", err);
            }
        }
    }
}

pub fn init_telemetry(json: bool) -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
    });
    let pretty_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_line_number(true)
            .with_target(false)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
            .with_file(true)
            .pretty()
    });

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(json_layer)
        .with(pretty_layer);

    #[cfg(feature = "metrics")]
    let registry = {
        let scope = InstrumentationScope::builder("dhpool")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url(semvcns::SCHEMA_URL)
            .build();
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(feature = "metrics")]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("dhpool")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        use opentelemetry_stdout::MetricExporter;
        let exporter = MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(30))
            .build();

        builder.with_reader(reader)
    };

    builder.build()
}

// Metric handles - only compiled when metrics feature is enabled
#[cfg(feature = "metrics")]
static REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static ARTIFACTS_SERVED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static UNAVAILABLE: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static INVALID_REQUESTS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static SERVE_DURATION_MS: OnceLock<Histogram<f64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = REQUESTS.set(
        meter
            .u64_counter("requests")
            .with_description("Total parameter download requests")
            .build(),
    );

    let _ = ARTIFACTS_SERVED.set(
        meter
            .u64_counter("artifacts_served")
            .with_description("Parameter files streamed to clients")
            .build(),
    );

    let _ = UNAVAILABLE.set(
        meter
            .u64_counter("unavailable")
            .with_description("Requests answered with 503 because the class was empty")
            .build(),
    );

    let _ = INVALID_REQUESTS.set(
        meter
            .u64_counter("invalid_requests")
            .with_description("Requests for a size class that is not served")
            .build(),
    );

    let _ = SERVE_DURATION_MS.set(
        meter
            .f64_histogram("serve_duration")
            .with_unit("ms")
            .with_description("Time from request to response headers")
            .build(),
    );
}

#[cfg(feature = "metrics")]
fn class_attr(class: &str) -> [KeyValue; 1] {
    [KeyValue::new("size_class", class.to_string())]
}

// Convenience functions that compile to no-ops when metrics are disabled
#[cfg(feature = "metrics")]
pub fn increment_requests(class: &str) {
    if let Some(counter) = REQUESTS.get() {
        counter.add(1, &class_attr(class));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_requests(_class: &str) {}

#[cfg(feature = "metrics")]
pub fn increment_artifacts_served(class: &str) {
    if let Some(counter) = ARTIFACTS_SERVED.get() {
        counter.add(1, &class_attr(class));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_artifacts_served(_class: &str) {}

#[cfg(feature = "metrics")]
pub fn increment_unavailable(class: &str) {
    if let Some(counter) = UNAVAILABLE.get() {
        counter.add(1, &class_attr(class));
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_unavailable(_class: &str) {}

#[cfg(feature = "metrics")]
pub fn increment_invalid_requests() {
    if let Some(counter) = INVALID_REQUESTS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_invalid_requests() {}

#[cfg(feature = "metrics")]
pub fn record_serve_duration(duration_ms: f64) {
    if let Some(histogram) = SERVE_DURATION_MS.get() {
        histogram.record(duration_ms, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn record_serve_duration(_duration_ms: f64) {}

//! Logging and trace-export bootstrap for flow hosts.
//!
//! The core crates emit structured `tracing` events (compression triggers,
//! artifact records, skipped step files, unreachable graph nodes). A binary
//! embedding a flow calls [`init`] once at startup; the returned
//! [`TelemetryGuard`] owns the OpenTelemetry provider and flushes buffered
//! spans when it is dropped at the end of the run.
//!
//! ```no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let _telemetry = stagehand_observe::tracing_setup::init(false)?;
//!     // run flows; spans flush when _telemetry drops
//!     Ok(())
//! }
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset: workflow internals at debug,
/// everything else at info.
const DEFAULT_FILTER: &str = "info,stagehand_core=debug";

/// Keeps the OTel pipeline alive for the duration of a run.
///
/// Dropping the guard flushes and shuts down the provider; with OTel
/// disabled it is inert.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("telemetry: provider shutdown error: {e}");
            }
        }
    }
}

/// Installs the global tracing subscriber.
///
/// Always installs a structured `fmt` layer; span-close events are enabled
/// so per-step latency shows up from the flow hooks. When `export_otel` is
/// true, spans are additionally bridged to OpenTelemetry with a stdout
/// exporter -- suitable for local runs; hosts wanting OTLP build their own
/// provider and layer instead.
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed (e.g. a
/// second `init` call, or a test harness that set one up first).
pub fn init(export_otel: bool) -> Result<TelemetryGuard, Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    if !export_otel {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
        return Ok(TelemetryGuard { provider: None });
    }

    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(provider.tracer("stagehand-flow"));
    opentelemetry::global::set_tracer_provider(provider.clone());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(TelemetryGuard {
        provider: Some(provider),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_without_provider_is_inert() {
        let guard = TelemetryGuard { provider: None };
        drop(guard);
    }

    #[test]
    fn test_default_filter_parses() {
        // A typo here would make init silently fall back to nothing
        EnvFilter::try_new(DEFAULT_FILTER).unwrap();
    }
}

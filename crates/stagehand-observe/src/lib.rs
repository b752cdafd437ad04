//! Telemetry for stagehand.
//!
//! Two layers:
//!
//! - `tracing_setup` -- structured logging bootstrap with optional
//!   OpenTelemetry trace export; the returned guard flushes spans on drop.
//! - `tracer` -- a process-wide `Tracer`/`Span` facade with a zero-overhead
//!   no-op default. The core never requires a real tracer; upper layers may
//!   install one.

pub mod tracer;
pub mod tracing_setup;

pub use tracing_setup::{init as init_telemetry, TelemetryGuard};

pub use tracer::{
    get, init, is_enabled, noop, shutdown, start_span, with_attributes, Attribute, Span,
    SpanConfig, SpanOption, Status, Tracer,
};

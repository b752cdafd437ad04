//! Process-wide tracer facade.
//!
//! Abstracting behind a trait keeps the core independent of any particular
//! tracing backend. The default is a no-op tracer with zero overhead;
//! `init` swaps in a real one.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

/// A traced attribute key/value pair.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Span status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// Configuration accumulated from span options.
#[derive(Debug, Clone, Default)]
pub struct SpanConfig {
    pub attributes: HashMap<String, String>,
}

/// Option applied when starting a span.
pub type SpanOption = Box<dyn FnOnce(&mut SpanConfig)>;

/// Attaches initial attributes to a span.
pub fn with_attributes(attrs: HashMap<String, String>) -> SpanOption {
    Box::new(move |cfg: &mut SpanConfig| {
        cfg.attributes.extend(attrs);
    })
}

/// A single tracing interval.
pub trait Span: Send + Sync {
    fn set_attributes(&self, attrs: &[Attribute]);
    fn set_status(&self, status: Status, description: &str);
    fn record_error(&self, err: &dyn std::error::Error);
    fn end(&self);
}

/// An observability tracing backend.
pub trait Tracer: Send + Sync {
    /// Starts a new span.
    fn start_span(&self, name: &str, opts: Vec<SpanOption>) -> Arc<dyn Span>;

    /// Flushes and shuts the tracer down.
    fn shutdown(&self);

    /// Whether this tracer records anything.
    fn is_enabled(&self) -> bool;
}

// ---------------------------------------------------------------------------
// No-op implementation
// ---------------------------------------------------------------------------

struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
    fn set_attributes(&self, _attrs: &[Attribute]) {}
    fn set_status(&self, _status: Status, _description: &str) {}
    fn record_error(&self, _err: &dyn std::error::Error) {}
    fn end(&self) {}
}

impl Tracer for NoopTracer {
    fn start_span(&self, _name: &str, _opts: Vec<SpanOption>) -> Arc<dyn Span> {
        Arc::new(NoopSpan)
    }

    fn shutdown(&self) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// The no-op tracer.
pub fn noop() -> Arc<dyn Tracer> {
    Arc::new(NoopTracer)
}

// ---------------------------------------------------------------------------
// Global registry
// ---------------------------------------------------------------------------

static GLOBAL_TRACER: LazyLock<RwLock<Arc<dyn Tracer>>> = LazyLock::new(|| RwLock::new(noop()));

/// Installs the global tracer. Optional; the default no-op tracer costs
/// nothing.
pub fn init(tracer: Arc<dyn Tracer>) {
    *GLOBAL_TRACER.write().expect("tracer lock poisoned") = tracer;
}

/// The current global tracer.
pub fn get() -> Arc<dyn Tracer> {
    GLOBAL_TRACER.read().expect("tracer lock poisoned").clone()
}

/// Starts a span on the global tracer.
pub fn start_span(name: &str, opts: Vec<SpanOption>) -> Arc<dyn Span> {
    get().start_span(name, opts)
}

/// Shuts down the global tracer.
pub fn shutdown() {
    get().shutdown();
}

/// Whether the global tracer records anything.
pub fn is_enabled() -> bool {
    get().is_enabled()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

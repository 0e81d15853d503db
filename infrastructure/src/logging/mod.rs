//! Logging infrastructure: script diagnostic sinks.
//!
//! Provides [`JsonlDiagnosticLogger`], a JSONL file writer, and
//! [`TracingDiagnosticSink`], both implementing the
//! [`DiagnosticSink`](tactica_application::DiagnosticSink) port.

mod jsonl_logger;
mod tracing_sink;

pub use jsonl_logger::JsonlDiagnosticLogger;
pub use tracing_sink::TracingDiagnosticSink;

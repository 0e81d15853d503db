//! Diagnostic sink that forwards script diagnostics to `tracing`.

use tactica_application::DiagnosticSink;
use tactica_domain::{DiagnosticKind, ScriptDiagnostic};
use tracing::{error, warn};

/// Emits load and callback failures as `error!`, everything else as `warn!`.
pub struct TracingDiagnosticSink;

impl DiagnosticSink for TracingDiagnosticSink {
    fn report(&self, diagnostic: &ScriptDiagnostic) {
        let location = diagnostic
            .location
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let context = diagnostic.context.as_deref().unwrap_or("");

        match diagnostic.kind {
            DiagnosticKind::Load | DiagnosticKind::Callback => error!(
                kind = diagnostic.kind.as_str(),
                location = %location,
                context = %context,
                "{}",
                diagnostic.message
            ),
            DiagnosticKind::Access | DiagnosticKind::Runtime => warn!(
                kind = diagnostic.kind.as_str(),
                location = %location,
                context = %context,
                "{}",
                diagnostic.message
            ),
        }
    }
}

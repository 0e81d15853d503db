//! Diagnostic sink port: the single destination for script diagnostics.

use std::sync::{Arc, Mutex};
use tactica_domain::ScriptDiagnostic;

/// Receives every diagnostic produced while script content runs.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: &ScriptDiagnostic);
}

/// No-op implementation for when diagnostics are not needed
pub struct NoDiagnostics;

impl DiagnosticSink for NoDiagnostics {
    fn report(&self, _diagnostic: &ScriptDiagnostic) {}
}

/// Keeps diagnostics in memory so callers can summarise them afterwards.
#[derive(Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<ScriptDiagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<ScriptDiagnostic> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn report(&self, diagnostic: &ScriptDiagnostic) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(diagnostic.clone());
        }
    }
}

/// A diagnostic sink that delegates to multiple inner sinks.
///
/// ```text
/// LuaScriptRuntime ──report──▶ CompositeDiagnosticSink
///                                   ├─▶ TracingDiagnosticSink  → tracing::warn!
///                                   ├─▶ JsonlDiagnosticLogger  → diagnostics.jsonl
///                                   └─▶ CollectingDiagnostics  → CLI summary
/// ```
pub struct CompositeDiagnosticSink {
    delegates: Vec<Arc<dyn DiagnosticSink>>,
}

impl CompositeDiagnosticSink {
    pub fn new(delegates: Vec<Arc<dyn DiagnosticSink>>) -> Self {
        Self { delegates }
    }

    pub fn push(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.delegates.push(sink);
    }
}

impl DiagnosticSink for CompositeDiagnosticSink {
    fn report(&self, diagnostic: &ScriptDiagnostic) {
        for d in &self.delegates {
            d.report(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactica_domain::DiagnosticKind;

    #[test]
    fn test_composite_fans_out() {
        let a = Arc::new(CollectingDiagnostics::new());
        let b = Arc::new(CollectingDiagnostics::new());
        let mut composite = CompositeDiagnosticSink::new(vec![a.clone()]);
        composite.push(b.clone());
        composite.push(Arc::new(NoDiagnostics));

        composite.report(&ScriptDiagnostic::new(DiagnosticKind::Runtime, "boom"));
        assert_eq!(a.len(), 1);
        assert_eq!(b.snapshot()[0].message, "boom");
    }
}

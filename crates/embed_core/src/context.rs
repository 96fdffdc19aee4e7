use std::time::Duration;

use tokio::sync::broadcast;

use crate::{
    document::SourceDocument,
    reconciler::{ReconcileEvent, Reconciler},
};

pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_millis(1000);

/// Per-embed state handed explicitly to whatever needs it.
///
/// Owns the user's source document, the test-method document, and the
/// reconciler keyed to the source document.
pub struct EmbedContext {
    source: SourceDocument,
    test_method: SourceDocument,
    reconciler: Reconciler,
}

impl EmbedContext {
    pub fn new(
        source: impl Into<String>,
        test_method: impl Into<String>,
        reconcile_delay: Duration,
    ) -> Self {
        Self {
            source: SourceDocument::new(source),
            test_method: SourceDocument::new(test_method),
            reconciler: Reconciler::new(reconcile_delay),
        }
    }

    pub fn source(&self) -> &SourceDocument {
        &self.source
    }

    pub fn test_method(&self) -> &SourceDocument {
        &self.test_method
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Applies an edit from the editing surface. Emits `Dirty` before returning and
    /// (re)arms the debounced reconcile. Requires a tokio runtime.
    pub fn set_source(&self, text: impl Into<String>) {
        self.source.set_value(text);
        self.reconciler.notify_change();
    }

    pub fn set_test_method(&self, text: impl Into<String>) {
        self.test_method.set_value(text);
    }

    pub fn subscribe_reconcile(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.reconciler.subscribe()
    }

    pub fn mark_clean(&self) {
        self.source.mark_clean();
    }
}

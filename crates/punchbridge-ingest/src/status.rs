use std::sync::Arc;

use arc_swap::ArcSwap;
use punchbridge_types::IngestStatus;

/// Last-ingest snapshot shared between the ingest worker (writer) and the
/// HTTP surface (readers).
///
/// Writers swap in a whole new snapshot, so a reader always sees either the
/// previous outcome or the next one, never a mix.
#[derive(Clone)]
pub struct StatusTracker {
    current: Arc<ArcSwap<IngestStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(IngestStatus::default())),
        }
    }

    pub fn snapshot(&self) -> Arc<IngestStatus> {
        self.current.load_full()
    }

    pub fn record(&self, status: IngestStatus) {
        self.current.store(Arc::new(status));
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}

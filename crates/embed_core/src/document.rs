use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

/// Emitted after every mutation of a [`SourceDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentChange {
    pub revision: u64,
}

struct DocumentState {
    text: String,
    dirty: bool,
    revision: u64,
}

/// Current text of one editing surface plus its dirty flag.
///
/// The editing widget owns keystroke capture; it pushes each new value through
/// [`SourceDocument::set_value`]. `dirty` is raised on every mutation and is only
/// cleared by [`SourceDocument::mark_clean`].
pub struct SourceDocument {
    state: Mutex<DocumentState>,
    changes: broadcast::Sender<DocumentChange>,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(DocumentState {
                text: text.into(),
                dirty: false,
                revision: 0,
            }),
            changes,
        }
    }

    pub fn value(&self) -> String {
        self.lock().text.clone()
    }

    pub fn set_value(&self, text: impl Into<String>) -> DocumentChange {
        let change = {
            let mut state = self.lock();
            state.text = text.into();
            state.dirty = true;
            state.revision += 1;
            DocumentChange {
                revision: state.revision,
            }
        };
        let _ = self.changes.send(change);
        change
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    pub fn mark_clean(&self) {
        self.lock().dirty = false;
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<DocumentChange> {
        self.changes.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SourceDocument {
    fn default() -> Self {
        Self::new(String::new())
    }
}

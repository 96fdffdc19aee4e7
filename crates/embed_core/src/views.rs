//! Capabilities the orchestration core needs from the view layer, plus headless
//! implementations for tests and non-graphical hosts.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Mutex, MutexGuard, PoisonError,
};

use shared::domain::{ConsoleLine, TabKind};
use tokio::sync::watch;

/// The single capability a tab's view exposes to the orchestrator.
pub trait TabView: Send + Sync {
    fn set_selected(&self, selected: bool);
}

pub trait ConsoleView: Send + Sync {
    fn append(&self, line: ConsoleLine);
    fn clear(&self);
}

/// A clickable affordance such as the run or test-submit button.
pub trait ActionControl: Send + Sync {
    fn set_disabled(&self, disabled: bool);
    fn hide(&self);
}

pub struct HeadlessTabView {
    kind: TabKind,
    selected: AtomicBool,
}

impl HeadlessTabView {
    pub fn new(kind: TabKind) -> Self {
        Self {
            kind,
            selected: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> TabKind {
        self.kind
    }

    pub fn is_selected(&self) -> bool {
        self.selected.load(Ordering::SeqCst)
    }
}

impl TabView for HeadlessTabView {
    fn set_selected(&self, selected: bool) {
        self.selected.store(selected, Ordering::SeqCst);
    }
}

/// Keeps console lines in memory in arrival order.
pub struct BufferedConsole {
    lines: Mutex<Vec<ConsoleLine>>,
    len: watch::Sender<usize>,
}

impl BufferedConsole {
    pub fn new() -> Self {
        let (len, _) = watch::channel(0);
        Self {
            lines: Mutex::new(Vec::new()),
            len,
        }
    }

    pub fn lines(&self) -> Vec<ConsoleLine> {
        self.lock().clone()
    }

    /// Resolves once at least `count` lines are buffered.
    pub async fn wait_for_lines(&self, count: usize) {
        let mut len = self.len.subscribe();
        let _ = len.wait_for(|len| *len >= count).await;
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConsoleLine>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferedConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleView for BufferedConsole {
    fn append(&self, line: ConsoleLine) {
        let mut lines = self.lock();
        lines.push(line);
        self.len.send_replace(lines.len());
    }

    fn clear(&self) {
        let mut lines = self.lock();
        lines.clear();
        self.len.send_replace(0);
    }
}

#[derive(Default)]
pub struct FlagControl {
    disabled: AtomicBool,
    hidden: AtomicBool,
    disable_requests: AtomicUsize,
}

impl FlagControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    /// How many times `set_disabled(true)` was requested.
    pub fn disable_requests(&self) -> usize {
        self.disable_requests.load(Ordering::SeqCst)
    }
}

impl ActionControl for FlagControl {
    fn set_disabled(&self, disabled: bool) {
        if disabled {
            self.disable_requests.fetch_add(1, Ordering::SeqCst);
        }
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn hide(&self) {
        self.hidden.store(true, Ordering::SeqCst);
    }
}

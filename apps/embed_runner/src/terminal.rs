//! Terminal-backed views for running an embed without a browser.

use std::sync::atomic::{AtomicBool, Ordering};

use embed_core::{ActionControl, ConsoleView, TabView};
use shared::domain::{ConsoleLine, ConsoleLineKind, TabKind};
use tracing::{debug, info};

pub struct TerminalTabView {
    kind: TabKind,
}

impl TerminalTabView {
    pub fn new(kind: TabKind) -> Self {
        Self { kind }
    }
}

impl TabView for TerminalTabView {
    fn set_selected(&self, selected: bool) {
        debug!(tab = %self.kind, selected, "view: tab selection changed");
    }
}

/// Prints message lines to stdout and error lines to stderr.
#[derive(Default)]
pub struct TerminalConsole;

impl ConsoleView for TerminalConsole {
    fn append(&self, line: ConsoleLine) {
        match line.kind {
            ConsoleLineKind::Message => println!("{}", line.text),
            ConsoleLineKind::Error => eprintln!("{}", line.text),
        }
    }

    fn clear(&self) {
        debug!("view: console cleared");
    }
}

pub struct TerminalControl {
    name: &'static str,
    disabled: AtomicBool,
}

impl TerminalControl {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            disabled: AtomicBool::new(false),
        }
    }
}

impl ActionControl for TerminalControl {
    fn set_disabled(&self, disabled: bool) {
        if self.disabled.swap(disabled, Ordering::SeqCst) != disabled {
            info!(control = self.name, disabled, "view: control state changed");
        }
    }

    fn hide(&self) {
        debug!(control = self.name, "view: control hidden");
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three tabs every embed exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabKind {
    Editor,
    Test,
    Console,
}

impl TabKind {
    pub const ALL: [TabKind; 3] = [TabKind::Editor, TabKind::Test, TabKind::Console];

    pub fn as_str(self) -> &'static str {
        match self {
            TabKind::Editor => "editor",
            TabKind::Test => "test",
            TabKind::Console => "console",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for TabKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleLineKind {
    Message,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleLine {
    pub text: String,
    pub kind: ConsoleLineKind,
}

impl ConsoleLine {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ConsoleLineKind::Message,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ConsoleLineKind::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ConsoleLineKind::Error
    }
}

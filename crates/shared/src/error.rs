use std::time::Duration;

use thiserror::Error;

/// Why a compile request produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileFailure {
    #[error("compile request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },
    #[error("compilation failed: {0}")]
    Rejected(String),
}

impl CompileFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CompileFailure::Timeout { .. })
    }
}

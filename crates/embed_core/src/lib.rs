//! Orchestration core of the embeddable editor: tab selection, debounced
//! reconciliation of source edits, and the compile/execute pipeline feeding the
//! console.

pub mod context;
pub mod document;
pub mod orchestrator;
pub mod pipeline;
pub mod reconciler;
pub mod sandbox;
pub mod tabs;
pub mod transport;
pub mod views;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{EmbedContext, DEFAULT_RECONCILE_DELAY};
pub use document::{DocumentChange, SourceDocument};
pub use orchestrator::{EmbedViews, Orchestrator, OrchestratorError, OrchestratorOptions};
pub use pipeline::{
    CompileService, ExecutionEnvironment, ExecutionEventStream, ExecutionPipeline, PipelineError,
    RunHandle, DEFAULT_COMPILE_TIMEOUT,
};
pub use reconciler::{ReconcileEvent, Reconciler};
pub use sandbox::ProcessExecutionEnvironment;
pub use tabs::{Tab, TabController, TabError};
pub use transport::HttpCompileService;
pub use views::{
    ActionControl, BufferedConsole, ConsoleView, FlagControl, HeadlessTabView, TabView,
};

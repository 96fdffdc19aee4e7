use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use shared::{
    domain::{ConsoleLine, TabKind},
    protocol::{build_full_source, ExecutionEvent},
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
    context::EmbedContext,
    pipeline::{ExecutionPipeline, PipelineError, RunHandle},
    tabs::{Tab, TabController, TabError},
    views::{ActionControl, ConsoleView, TabView},
};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Tab(#[from] TabError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("test runs are disabled after a successful submission")]
    TestRunsDisabled,
}

/// View capabilities the orchestrator drives.
#[derive(Clone)]
pub struct EmbedViews {
    pub editor_tab: Arc<dyn TabView>,
    pub test_tab: Arc<dyn TabView>,
    pub console_tab: Arc<dyn TabView>,
    pub console: Arc<dyn ConsoleView>,
    pub test_control: Arc<dyn ActionControl>,
}

impl EmbedViews {
    fn tab_view(&self, kind: TabKind) -> Arc<dyn TabView> {
        match kind {
            TabKind::Editor => Arc::clone(&self.editor_tab),
            TabKind::Test => Arc::clone(&self.test_tab),
            TabKind::Console => Arc::clone(&self.console_tab),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrchestratorOptions {
    /// Select the console tab whenever a run starts.
    pub focus_console_on_run: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            focus_console_on_run: true,
        }
    }
}

/// Wires tabs, the run action and the console around one [`ExecutionPipeline`].
///
/// Must be constructed inside a tokio runtime: it spawns the task that routes
/// pipeline events to the console.
pub struct Orchestrator {
    context: Arc<EmbedContext>,
    pipeline: Arc<ExecutionPipeline>,
    tabs: Mutex<TabController>,
    console: Arc<dyn ConsoleView>,
    tests_disabled: Arc<AtomicBool>,
    options: OrchestratorOptions,
    event_task: Option<JoinHandle<()>>,
    drain_signal: Option<oneshot::Sender<()>>,
}

impl Orchestrator {
    pub fn new(
        context: Arc<EmbedContext>,
        pipeline: Arc<ExecutionPipeline>,
        views: EmbedViews,
        options: OrchestratorOptions,
    ) -> Result<Self, OrchestratorError> {
        let mut tabs = TabController::new();
        for kind in TabKind::ALL {
            let views = views.clone();
            tabs.register_tab(Tab::new(kind.as_str(), move || {
                for other in TabKind::ALL {
                    views.tab_view(other).set_selected(other == kind);
                }
            }))?;
        }

        if context.test_method().value().trim().is_empty() {
            views.test_control.hide();
        }

        let tests_disabled = Arc::new(AtomicBool::new(false));
        let (drain_signal, drain) = oneshot::channel();
        let event_task = spawn_console_task(
            pipeline.subscribe_events(),
            drain,
            ConsoleRouter {
                console: Arc::clone(&views.console),
                test_control: Arc::clone(&views.test_control),
                tests_disabled: Arc::clone(&tests_disabled),
            },
        );

        Ok(Self {
            context,
            pipeline,
            tabs: Mutex::new(tabs),
            console: views.console,
            tests_disabled,
            options,
            event_task: Some(event_task),
            drain_signal: Some(drain_signal),
        })
    }

    pub fn context(&self) -> &Arc<EmbedContext> {
        &self.context
    }

    pub fn pipeline(&self) -> &Arc<ExecutionPipeline> {
        &self.pipeline
    }

    pub fn select_tab(&self, name: &str) -> Result<(), OrchestratorError> {
        self.lock_tabs().select_tab(name)?;
        Ok(())
    }

    pub fn selected_tab(&self) -> Option<String> {
        self.lock_tabs().selected().map(str::to_string)
    }

    /// Compiles and runs the current source together with the test method.
    ///
    /// A compile failure is logged, shown as an error line on the console, and
    /// returned; the orchestrator stays usable.
    pub async fn run(&self) -> Result<RunHandle, OrchestratorError> {
        let full_source = build_full_source(
            &self.context.source().value(),
            &self.context.test_method().value(),
        );

        if self.options.focus_console_on_run {
            self.select_tab(TabKind::Console.as_str())?;
        }

        match self.pipeline.run(&full_source).await {
            Ok(handle) => {
                info!(run_id = %handle.run_id(), "orchestrator: run started");
                Ok(handle)
            }
            Err(err) => {
                warn!("orchestrator: {err}");
                self.console.append(ConsoleLine::error(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Trigger behind the test-submit affordance.
    pub async fn submit_tests(&self) -> Result<RunHandle, OrchestratorError> {
        if self.tests_disabled() {
            return Err(OrchestratorError::TestRunsDisabled);
        }
        self.run().await
    }

    pub fn tests_disabled(&self) -> bool {
        self.tests_disabled.load(Ordering::SeqCst)
    }

    pub fn clear_console(&self) {
        self.console.clear();
    }

    /// Stops event routing after every event relayed so far has reached the
    /// console. Await a run's [`RunHandle::finished`] first to include all of it.
    pub async fn drain_console(&mut self) {
        if let Some(signal) = self.drain_signal.take() {
            let _ = signal.send(());
        }
        if let Some(task) = self.event_task.take() {
            if let Err(err) = task.await {
                warn!("orchestrator: console task ended abnormally: {err}");
            }
        }
    }

    fn lock_tabs(&self) -> MutexGuard<'_, TabController> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if let Some(task) = &self.event_task {
            task.abort();
        }
    }
}

struct ConsoleRouter {
    console: Arc<dyn ConsoleView>,
    test_control: Arc<dyn ActionControl>,
    tests_disabled: Arc<AtomicBool>,
}

impl ConsoleRouter {
    fn route(&self, event: ExecutionEvent) {
        match event {
            ExecutionEvent::Stdout(text) => self.console.append(ConsoleLine::message(text)),
            ExecutionEvent::Stderr(text) => self.console.append(ConsoleLine::error(text)),
            ExecutionEvent::TestResult { success, message } => {
                if success {
                    // Repeated successes re-apply the same disable.
                    self.tests_disabled.store(true, Ordering::SeqCst);
                    self.test_control.set_disabled(true);
                }
                self.console.append(ConsoleLine::message(message));
            }
        }
    }
}

fn spawn_console_task(
    mut events: mpsc::UnboundedReceiver<ExecutionEvent>,
    mut drain: oneshot::Receiver<()>,
    router: ConsoleRouter,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => router.route(event),
                    None => break,
                },
                _ = &mut drain => {
                    events.close();
                    while let Some(event) = events.recv().await {
                        router.route(event);
                    }
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
